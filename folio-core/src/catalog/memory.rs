use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use folio_model::{
    ChapterId, CommitResult, CreateOp, EntityRef, FailedOperation, FieldChange, FileId,
    LibraryDiff, LibraryId, MetadataSet, PersistedChapter, PersistedFile, PersistedSeries,
    PersistedVolume, SeriesId, UpdateOp, VolumeId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::CatalogStore;
use crate::error::{Result, ScanError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    pub library_id: LibraryId,
    pub series: Vec<PersistedSeries>,
}

/// On-disk form of an [`InMemoryCatalog`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub libraries: Vec<LibrarySnapshot>,
}

/// Catalog kept in process memory, optionally persisted as JSON between
/// runs.
#[derive(Debug)]
pub struct InMemoryCatalog {
    libraries: RwLock<HashMap<LibraryId, Vec<PersistedSeries>>>,
    commit_locks: Mutex<HashMap<LibraryId, Arc<tokio::sync::Mutex<()>>>>,
    available: AtomicBool,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self {
            libraries: RwLock::new(HashMap::new()),
            commit_locks: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let catalog = Self::new();
        for library in snapshot.libraries {
            catalog.replace_library(library.library_id, library.series);
        }
        catalog
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        let libraries = self.read_libraries();
        let mut snapshot = CatalogSnapshot {
            libraries: libraries
                .iter()
                .map(|(library_id, series)| LibrarySnapshot {
                    library_id: *library_id,
                    series: series.clone(),
                })
                .collect(),
        };
        snapshot.libraries.sort_by_key(|library| library.library_id);
        snapshot
    }

    /// Load a snapshot written by [`InMemoryCatalog::save_json`]. A missing
    /// file is an empty catalog.
    pub fn load_json(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = fs::read(path)?;
        let snapshot: CatalogSnapshot = serde_json::from_slice(&raw)?;
        info!(
            target: "scan::orchestrator",
            path = %path.display(),
            libraries = snapshot.libraries.len(),
            "catalog loaded"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_vec_pretty(&self.snapshot())?;
        fs::write(path, raw)?;
        Ok(())
    }

    pub fn replace_library(&self, library_id: LibraryId, series: Vec<PersistedSeries>) {
        self.write_libraries().insert(library_id, series);
    }

    /// Current series of one library.
    pub fn series(&self, library_id: LibraryId) -> Vec<PersistedSeries> {
        self.read_libraries()
            .get(&library_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Simulate the store going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ScanError::CatalogUnavailable("in-memory catalog is offline".to_string()))
        }
    }

    fn commit_lock(&self, library_id: LibraryId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.commit_locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(library_id).or_default().clone()
    }

    fn read_libraries(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<LibraryId, Vec<PersistedSeries>>> {
        match self.libraries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_libraries(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<LibraryId, Vec<PersistedSeries>>> {
        match self.libraries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn load_existing_series(&self, library_id: LibraryId) -> Result<Vec<PersistedSeries>> {
        self.ensure_available()?;
        Ok(self.series(library_id))
    }

    async fn commit(&self, diff: &LibraryDiff) -> Result<CommitResult> {
        self.ensure_available()?;
        let lock = self.commit_lock(diff.library_id);
        let _guard = lock.lock().await;

        let mut working = self.series(diff.library_id);
        let result = apply_diff(&mut working, diff);
        self.replace_library(diff.library_id, working);

        if result.failed.is_empty() {
            debug!(
                target: "scan::orchestrator",
                library_id = %diff.library_id,
                applied = result.applied,
                "diff committed"
            );
        } else {
            warn!(
                target: "scan::orchestrator",
                library_id = %diff.library_id,
                applied = result.applied,
                failed = result.failed.len(),
                "diff committed with failures"
            );
        }
        Ok(result)
    }
}

type OpResult = std::result::Result<(), String>;

/// Creates, then updates, then pruning of rehomed entities, then removals.
fn apply_diff(library: &mut Vec<PersistedSeries>, diff: &LibraryDiff) -> CommitResult {
    let mut result = CommitResult::default();
    let mut record = |target: EntityRef, outcome: OpResult| match outcome {
        Ok(()) => result.applied += 1,
        Err(reason) => result.failed.push(FailedOperation { target, reason }),
    };

    for op in &diff.to_create {
        record(op.target(), apply_create(library, diff.library_id, op));
    }
    for op in &diff.to_update {
        record(op.target(), apply_update(library, op));
    }
    for entity in &diff.rehomed {
        record(*entity, prune_rehomed(library, *entity));
    }
    for entity in &diff.to_remove {
        let outcome = if remove_entity(library, *entity) {
            Ok(())
        } else {
            Err("not found".to_string())
        };
        record(*entity, outcome);
    }
    result
}

fn apply_create(
    library: &mut Vec<PersistedSeries>,
    library_id: LibraryId,
    op: &CreateOp,
) -> OpResult {
    match op {
        CreateOp::Series(new) => {
            if new.library_id != library_id {
                return Err("series belongs to another library".to_string());
            }
            if library.iter().any(|series| series.id == new.id) {
                return Err("already exists".to_string());
            }
            library.push(PersistedSeries {
                id: new.id,
                library_id: new.library_id,
                name: new.name.clone(),
                normalized_name: new.normalized_name.clone(),
                format: new.format,
                metadata: new.metadata.clone(),
                locked_fields: Default::default(),
                volumes: Vec::new(),
            });
        }
        CreateOp::Volume(new) => {
            let series = series_mut(library, new.series_id).ok_or("series not found")?;
            series.volumes.push(PersistedVolume {
                id: new.id,
                number: new.number,
                chapters: Vec::new(),
            });
        }
        CreateOp::Chapter(new) => {
            let volume = volume_mut(library, new.volume_id).ok_or("volume not found")?;
            volume.chapters.push(PersistedChapter {
                id: new.id,
                number: new.number,
                special: new.special.clone(),
                metadata: new.metadata.clone(),
                locked_fields: Default::default(),
                files: Vec::new(),
            });
        }
        CreateOp::File(new) => {
            let chapter = chapter_mut(library, new.chapter_id).ok_or("chapter not found")?;
            chapter.files.push(PersistedFile {
                id: new.id,
                path: new.path.clone(),
                size: new.size,
                modified_ms: new.modified_ms,
                weak_hash: new.weak_hash.clone(),
                pages: new.pages,
            });
        }
    }
    Ok(())
}

fn apply_update(library: &mut [PersistedSeries], op: &UpdateOp) -> OpResult {
    match op {
        UpdateOp::RenameSeries {
            series_id,
            name,
            normalized_name,
            ..
        } => {
            let series = series_mut(library, *series_id).ok_or("series not found")?;
            series.name = name.clone();
            series.normalized_name = normalized_name.clone();
        }
        UpdateOp::SeriesMetadata { series_id, changes } => {
            let series = series_mut(library, *series_id).ok_or("series not found")?;
            apply_changes(&mut series.metadata, changes);
        }
        UpdateOp::ChapterMetadata {
            chapter_id,
            changes,
        } => {
            let chapter = chapter_mut(library, *chapter_id).ok_or("chapter not found")?;
            apply_changes(&mut chapter.metadata, changes);
        }
        UpdateOp::File(update) => {
            if chapter_mut(library, update.chapter_id).is_none() {
                return Err("target chapter not found".to_string());
            }
            take_file(library, update.file_id).ok_or("file not found")?;
            let chapter = chapter_mut(library, update.chapter_id).ok_or("chapter not found")?;
            chapter.files.push(PersistedFile {
                id: update.file_id,
                path: update.path.clone(),
                size: update.size,
                modified_ms: update.modified_ms,
                weak_hash: update.weak_hash.clone(),
                pages: update.pages,
            });
        }
    }
    Ok(())
}

fn apply_changes(metadata: &mut MetadataSet, changes: &[FieldChange]) {
    for change in changes {
        metadata.insert(change.field, change.value.clone());
    }
}

/// Rehomed entities are dropped only once nothing lives below them.
fn prune_rehomed(library: &mut Vec<PersistedSeries>, entity: EntityRef) -> OpResult {
    let files = match entity {
        EntityRef::Series(id) => library
            .iter()
            .find(|series| series.id == id)
            .map(|series| series.files().count()),
        EntityRef::Volume(id) => library
            .iter()
            .flat_map(|series| series.volumes.iter())
            .find(|volume| volume.id == id)
            .map(|volume| volume.chapters.iter().map(|chapter| chapter.files.len()).sum()),
        EntityRef::Chapter(id) => library
            .iter()
            .flat_map(|series| series.volumes.iter())
            .flat_map(|volume| volume.chapters.iter())
            .find(|chapter| chapter.id == id)
            .map(|chapter| chapter.files.len()),
        EntityRef::File(_) => return Err("files cannot be rehomed".to_string()),
    };
    match files {
        None => Err("not found".to_string()),
        Some(0) => {
            remove_entity(library, entity);
            Ok(())
        }
        Some(count) => Err(format!("still holds {count} files")),
    }
}

fn remove_entity(library: &mut Vec<PersistedSeries>, entity: EntityRef) -> bool {
    match entity {
        EntityRef::Series(id) => {
            let before = library.len();
            library.retain(|series| series.id != id);
            library.len() != before
        }
        EntityRef::Volume(id) => library.iter_mut().any(|series| {
            let before = series.volumes.len();
            series.volumes.retain(|volume| volume.id != id);
            series.volumes.len() != before
        }),
        EntityRef::Chapter(id) => library
            .iter_mut()
            .flat_map(|series| series.volumes.iter_mut())
            .any(|volume| {
                let before = volume.chapters.len();
                volume.chapters.retain(|chapter| chapter.id != id);
                volume.chapters.len() != before
            }),
        EntityRef::File(id) => take_file(library, id).is_some(),
    }
}

fn series_mut(library: &mut [PersistedSeries], id: SeriesId) -> Option<&mut PersistedSeries> {
    library.iter_mut().find(|series| series.id == id)
}

fn volume_mut(library: &mut [PersistedSeries], id: VolumeId) -> Option<&mut PersistedVolume> {
    library
        .iter_mut()
        .flat_map(|series| series.volumes.iter_mut())
        .find(|volume| volume.id == id)
}

fn chapter_mut(library: &mut [PersistedSeries], id: ChapterId) -> Option<&mut PersistedChapter> {
    library
        .iter_mut()
        .flat_map(|series| series.volumes.iter_mut())
        .flat_map(|volume| volume.chapters.iter_mut())
        .find(|chapter| chapter.id == id)
}

fn take_file(library: &mut [PersistedSeries], id: FileId) -> Option<PersistedFile> {
    library
        .iter_mut()
        .flat_map(|series| series.volumes.iter_mut())
        .flat_map(|volume| volume.chapters.iter_mut())
        .find_map(|chapter| {
            let position = chapter.files.iter().position(|file| file.id == id)?;
            Some(chapter.files.remove(position))
        })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use folio_model::{Format, NewChapter, NewFile, NewSeries, NewVolume, Numbering};

    use super::*;

    fn seeded_diff(library_id: LibraryId) -> (LibraryDiff, ChapterId) {
        let series_id = SeriesId::new();
        let volume_id = VolumeId::new();
        let chapter_id = ChapterId::new();
        let mut diff = LibraryDiff::new(library_id);
        diff.to_create = vec![
            CreateOp::Series(NewSeries {
                id: series_id,
                library_id,
                name: "Alpha".into(),
                normalized_name: "alpha".into(),
                format: Format::Archive,
                metadata: MetadataSet::new(),
            }),
            CreateOp::Volume(NewVolume {
                id: volume_id,
                series_id,
                number: Numbering::number(1.0),
            }),
            CreateOp::Chapter(NewChapter {
                id: chapter_id,
                volume_id,
                number: Numbering::LooseLeaf,
                special: None,
                metadata: MetadataSet::new(),
            }),
            CreateOp::File(NewFile {
                id: FileId::new(),
                chapter_id,
                path: PathBuf::from("/lib/Alpha/Alpha v01.cbz"),
                size: 1,
                modified_ms: 1,
                weak_hash: None,
                pages: 1,
            }),
        ];
        (diff, chapter_id)
    }

    #[tokio::test]
    async fn partial_failures_do_not_reject_the_diff() {
        let catalog = InMemoryCatalog::new();
        let library_id = LibraryId::new();
        let (mut diff, _) = seeded_diff(library_id);
        let orphan = FileId::new();
        diff.to_create.push(CreateOp::File(NewFile {
            id: orphan,
            chapter_id: ChapterId::new(),
            path: PathBuf::from("/lib/elsewhere.cbz"),
            size: 1,
            modified_ms: 1,
            weak_hash: None,
            pages: 1,
        }));

        let result = catalog.commit(&diff).await.unwrap();
        assert_eq!(result.applied, 4);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].target, EntityRef::File(orphan));
        assert_eq!(catalog.series(library_id)[0].files().count(), 1);
    }

    #[tokio::test]
    async fn removals_cascade_and_rehomed_entities_need_to_be_empty() {
        let catalog = InMemoryCatalog::new();
        let library_id = LibraryId::new();
        let (diff, chapter_id) = seeded_diff(library_id);
        catalog.commit(&diff).await.unwrap();

        let mut rehome = LibraryDiff::new(library_id);
        rehome.rehomed.push(EntityRef::Chapter(chapter_id));
        let result = catalog.commit(&rehome).await.unwrap();
        assert_eq!(result.failed.len(), 1);

        let series_id = catalog.series(library_id)[0].id;
        let mut remove = LibraryDiff::new(library_id);
        remove.to_remove.push(EntityRef::Series(series_id));
        catalog.commit(&remove).await.unwrap();
        assert!(catalog.series(library_id).is_empty());
    }

    #[tokio::test]
    async fn offline_store_is_an_error() {
        let catalog = InMemoryCatalog::new();
        catalog.set_available(false);
        assert!(matches!(
            catalog.load_existing_series(LibraryId::new()).await,
            Err(ScanError::CatalogUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/catalog.json");
        let catalog = InMemoryCatalog::new();
        let library_id = LibraryId::new();
        catalog.commit(&seeded_diff(library_id).0).await.unwrap();
        catalog.save_json(&path).unwrap();

        let loaded = InMemoryCatalog::load_json(&path).unwrap();
        assert_eq!(loaded.series(library_id), catalog.series(library_id));
        assert!(InMemoryCatalog::load_json(&dir.path().join("missing.json"))
            .unwrap()
            .series(library_id)
            .is_empty());
    }
}
