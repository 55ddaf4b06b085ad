//! Catalog entities as loaded from the persistence collaborator.

use std::path::PathBuf;

use crate::format::Format;
use crate::ids::{ChapterId, FileId, LibraryId, SeriesId, VolumeId};
use crate::metadata::{LockedFields, MetadataSet};
use crate::numbers::Numbering;
use crate::scanned::{ChapterKey, SeriesKey};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PersistedFile {
    pub id: FileId,
    pub path: PathBuf,
    pub size: u64,
    pub modified_ms: i64,
    pub weak_hash: Option<String>,
    pub pages: u32,
}

impl PersistedFile {
    pub fn identity_key(&self) -> Option<String> {
        self.weak_hash
            .as_ref()
            .map(|hash| format!("{}:{}", self.size, hash))
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PersistedChapter {
    pub id: ChapterId,
    pub number: Numbering,
    #[cfg_attr(feature = "serde", serde(default))]
    pub special: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub metadata: MetadataSet,
    #[cfg_attr(feature = "serde", serde(default))]
    pub locked_fields: LockedFields,
    pub files: Vec<PersistedFile>,
}

impl PersistedChapter {
    pub fn key(&self) -> ChapterKey {
        ChapterKey {
            number: self.number,
            special: self.special.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PersistedVolume {
    pub id: VolumeId,
    pub number: Numbering,
    pub chapters: Vec<PersistedChapter>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PersistedSeries {
    pub id: SeriesId,
    pub library_id: LibraryId,
    pub name: String,
    pub normalized_name: String,
    pub format: Format,
    #[cfg_attr(feature = "serde", serde(default))]
    pub metadata: MetadataSet,
    #[cfg_attr(feature = "serde", serde(default))]
    pub locked_fields: LockedFields,
    pub volumes: Vec<PersistedVolume>,
}

impl PersistedSeries {
    pub fn key(&self) -> SeriesKey {
        SeriesKey {
            library_id: self.library_id,
            normalized_name: self.normalized_name.clone(),
            format: self.format,
        }
    }

    pub fn files(&self) -> impl Iterator<Item = &PersistedFile> {
        self.volumes
            .iter()
            .flat_map(|volume| volume.chapters.iter())
            .flat_map(|chapter| chapter.files.iter())
    }
}
