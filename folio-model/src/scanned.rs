//! Transient aggregates assembled during one scan pass. Never persisted.

use std::collections::BTreeMap;

use crate::files::DiscoveredFile;
use crate::format::Format;
use crate::ids::LibraryId;
use crate::metadata::{EmbeddedMetadata, MetadataSet};
use crate::numbers::Numbering;
use crate::parsed::ParsedInfo;

/// Grouping key for series within one scan: library, normalized name and
/// format family.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeriesKey {
    pub library_id: LibraryId,
    pub normalized_name: String,
    pub format: Format,
}

/// Chapters are keyed by number; specials additionally by their own name
/// so several specials can share the loose-leaf volume.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChapterKey {
    pub number: Numbering,
    pub special: Option<String>,
}

impl ChapterKey {
    pub fn numbered(number: Numbering) -> Self {
        Self {
            number,
            special: None,
        }
    }
}

/// A discovered file together with everything learned about it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedFile {
    pub file: DiscoveredFile,
    pub parsed: ParsedInfo,
    pub metadata: Option<EmbeddedMetadata>,
    pub pages: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScannedChapter {
    pub key: ChapterKey,
    pub files: Vec<ScannedFile>,
    pub metadata: MetadataSet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScannedVolume {
    pub number: Numbering,
    pub chapters: BTreeMap<ChapterKey, ScannedChapter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScannedSeries {
    pub library_id: LibraryId,
    pub name: String,
    pub normalized_name: String,
    pub format: Format,
    pub volumes: BTreeMap<Numbering, ScannedVolume>,
    pub metadata: MetadataSet,
}

impl ScannedSeries {
    pub fn key(&self) -> SeriesKey {
        SeriesKey {
            library_id: self.library_id,
            normalized_name: self.normalized_name.clone(),
            format: self.format,
        }
    }

    pub fn files(&self) -> impl Iterator<Item = &ScannedFile> {
        self.volumes
            .values()
            .flat_map(|volume| volume.chapters.values())
            .flat_map(|chapter| chapter.files.iter())
    }

    pub fn file_count(&self) -> usize {
        self.files().count()
    }

    pub fn chapter_count(&self) -> usize {
        self.volumes.values().map(|volume| volume.chapters.len()).sum()
    }
}
