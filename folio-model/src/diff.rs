//! Immutable change set handed to the catalog store for one library.

use std::path::PathBuf;

use crate::format::Format;
use crate::ids::{ChapterId, FileId, LibraryId, SeriesId, VolumeId};
use crate::metadata::{FieldValue, MetadataField, MetadataSet};
use crate::numbers::Numbering;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewSeries {
    pub id: SeriesId,
    pub library_id: LibraryId,
    pub name: String,
    pub normalized_name: String,
    pub format: Format,
    pub metadata: MetadataSet,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewVolume {
    pub id: VolumeId,
    pub series_id: SeriesId,
    pub number: Numbering,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewChapter {
    pub id: ChapterId,
    pub volume_id: VolumeId,
    pub number: Numbering,
    pub special: Option<String>,
    pub metadata: MetadataSet,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewFile {
    pub id: FileId,
    pub chapter_id: ChapterId,
    pub path: PathBuf,
    pub size: u64,
    pub modified_ms: i64,
    pub weak_hash: Option<String>,
    pub pages: u32,
}

/// Creations are emitted parents first so a store can apply them in order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CreateOp {
    Series(NewSeries),
    Volume(NewVolume),
    Chapter(NewChapter),
    File(NewFile),
}

impl CreateOp {
    pub fn target(&self) -> EntityRef {
        match self {
            CreateOp::Series(series) => EntityRef::Series(series.id),
            CreateOp::Volume(volume) => EntityRef::Volume(volume.id),
            CreateOp::Chapter(chapter) => EntityRef::Chapter(chapter.id),
            CreateOp::File(file) => EntityRef::File(file.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldChange {
    pub field: MetadataField,
    pub previous: Option<FieldValue>,
    pub value: FieldValue,
}

/// A persisted file whose content changed in place or that moved to a new
/// path and/or chapter. Identity is preserved either way.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileUpdate {
    pub file_id: FileId,
    pub chapter_id: ChapterId,
    pub path: PathBuf,
    pub size: u64,
    pub modified_ms: i64,
    pub weak_hash: Option<String>,
    pub pages: u32,
    pub moved: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UpdateOp {
    RenameSeries {
        series_id: SeriesId,
        previous: String,
        name: String,
        normalized_name: String,
    },
    SeriesMetadata {
        series_id: SeriesId,
        changes: Vec<FieldChange>,
    },
    ChapterMetadata {
        chapter_id: ChapterId,
        changes: Vec<FieldChange>,
    },
    File(FileUpdate),
}

impl UpdateOp {
    pub fn target(&self) -> EntityRef {
        match self {
            UpdateOp::RenameSeries { series_id, .. }
            | UpdateOp::SeriesMetadata { series_id, .. } => {
                EntityRef::Series(*series_id)
            }
            UpdateOp::ChapterMetadata { chapter_id, .. } => {
                EntityRef::Chapter(*chapter_id)
            }
            UpdateOp::File(update) => EntityRef::File(update.file_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityRef {
    Series(SeriesId),
    Volume(VolumeId),
    Chapter(ChapterId),
    File(FileId),
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityRef::Series(id) => write!(f, "series {id}"),
            EntityRef::Volume(id) => write!(f, "volume {id}"),
            EntityRef::Chapter(id) => write!(f, "chapter {id}"),
            EntityRef::File(id) => write!(f, "file {id}"),
        }
    }
}

/// Result of reconciling one library.
///
/// Every changed discovered file appears in exactly one of the created or
/// updated file lists; unchanged files appear in neither and are only
/// counted. `to_remove` names the top-most entity that disappeared, so a
/// removed volume implies its chapters and files.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LibraryDiff {
    pub library_id: LibraryId,
    pub to_create: Vec<CreateOp>,
    pub to_update: Vec<UpdateOp>,
    pub to_remove: Vec<EntityRef>,
    /// Entities left empty because every one of their files moved elsewhere
    /// in this pass. Stores may prune them; they are not removals.
    pub rehomed: Vec<EntityRef>,
    pub unchanged_files: usize,
}

impl LibraryDiff {
    pub fn new(library_id: LibraryId) -> Self {
        Self {
            library_id,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty()
            && self.to_update.is_empty()
            && self.to_remove.is_empty()
            && self.rehomed.is_empty()
    }

    pub fn created_files(&self) -> impl Iterator<Item = &NewFile> {
        self.to_create.iter().filter_map(|op| match op {
            CreateOp::File(file) => Some(file),
            _ => None,
        })
    }

    pub fn updated_files(&self) -> impl Iterator<Item = &FileUpdate> {
        self.to_update.iter().filter_map(|op| match op {
            UpdateOp::File(update) => Some(update),
            _ => None,
        })
    }

    pub fn operation_count(&self) -> usize {
        self.to_create.len()
            + self.to_update.len()
            + self.to_remove.len()
            + self.rehomed.len()
    }
}

/// Operation the store could not apply; the rest of the diff still lands.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FailedOperation {
    pub target: EntityRef,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommitResult {
    pub applied: usize,
    pub failed: Vec<FailedOperation>,
}
