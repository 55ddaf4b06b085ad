//! Turns matched series pairs into create/update/remove operations.

use std::collections::HashSet;

use folio_config::MetadataPolicy;
use folio_model::{
    ChapterId, CreateOp, EntityRef, FileId, FileUpdate, LibraryDiff, MetadataField, NewChapter,
    NewFile, NewSeries, NewVolume, PersistedChapter, PersistedFile, PersistedSeries,
    PersistedVolume, ScanCounts, ScanWarning, ScannedFile, ScannedSeries, SeriesCounts,
    SeriesId, UpdateOp, VolumeId,
};
use tracing::debug;

use super::index::{FileIndex, FileLocation};
use super::matching::SeriesMatch;
use super::metadata::{FieldDiff, diff_fields, field_label, writable};

/// Progress report for one reconciled series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesOutcome {
    pub name: String,
    pub series_id: SeriesId,
    pub matched: SeriesMatch,
    pub counts: SeriesCounts,
    /// Operations this series added to the diff.
    pub operations: usize,
}

/// Mutable state accumulated across every series of one library.
#[derive(Debug)]
pub(crate) struct Ledger {
    pub diff: LibraryDiff,
    pub counts: ScanCounts,
    pub warnings: Vec<ScanWarning>,
    consumed: HashSet<FileId>,
    landed_chapters: HashSet<ChapterId>,
    landed_volumes: HashSet<VolumeId>,
    /// Persisted series (by position) with at least one change.
    touched: HashSet<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fate {
    Alive,
    Gone,
    Rehomed,
}

impl Ledger {
    pub fn new(diff: LibraryDiff) -> Self {
        Self {
            diff,
            counts: ScanCounts::default(),
            warnings: Vec::new(),
            consumed: HashSet::new(),
            landed_chapters: HashSet::new(),
            landed_volumes: HashSet::new(),
            touched: HashSet::new(),
        }
    }

    fn operation_count(&self) -> usize {
        self.diff.to_create.len() + self.diff.to_update.len()
    }

    pub fn apply_series(
        &mut self,
        scanned: &ScannedSeries,
        matched: SeriesMatch,
        persisted: &[PersistedSeries],
        index: &FileIndex,
        policy: &MetadataPolicy,
    ) -> SeriesOutcome {
        let before = self.operation_count();
        let owner = matched.persisted();
        let current = owner.map(|position| &persisted[position]);

        let series_id = match current {
            Some(current) => {
                self.update_series_header(current, scanned, policy);
                current.id
            }
            None => {
                let id = SeriesId::new();
                self.diff.to_create.push(CreateOp::Series(NewSeries {
                    id,
                    library_id: scanned.library_id,
                    name: scanned.name.clone(),
                    normalized_name: scanned.normalized_name.clone(),
                    format: scanned.format,
                    metadata: writable(&scanned.metadata, policy),
                }));
                self.counts.series_created += 1;
                id
            }
        };

        for volume in scanned.volumes.values() {
            let current_volume: Option<&PersistedVolume> = current.and_then(|series| {
                series
                    .volumes
                    .iter()
                    .find(|candidate| candidate.number == volume.number)
            });
            let volume_id = match current_volume {
                Some(existing) => existing.id,
                None => {
                    let id = VolumeId::new();
                    self.diff.to_create.push(CreateOp::Volume(NewVolume {
                        id,
                        series_id,
                        number: volume.number,
                    }));
                    self.counts.volumes_created += 1;
                    id
                }
            };
            self.landed_volumes.insert(volume_id);

            for chapter in volume.chapters.values() {
                let current_chapter: Option<&PersistedChapter> = current_volume.and_then(|volume| {
                    volume
                        .chapters
                        .iter()
                        .find(|candidate| candidate.key() == chapter.key)
                });
                let chapter_id = match current_chapter {
                    Some(existing) => {
                        let diff = diff_fields(
                            &existing.metadata,
                            &existing.locked_fields,
                            &chapter.metadata,
                            policy,
                        );
                        self.note_locks(&scanned.name, &format!("chapter {}", chapter.key.number), &diff);
                        if !diff.changes.is_empty() {
                            self.diff.to_update.push(UpdateOp::ChapterMetadata {
                                chapter_id: existing.id,
                                changes: diff.changes,
                            });
                        }
                        existing.id
                    }
                    None => {
                        let id = ChapterId::new();
                        self.diff.to_create.push(CreateOp::Chapter(NewChapter {
                            id,
                            volume_id,
                            number: chapter.key.number,
                            special: chapter.key.special.clone(),
                            metadata: writable(&chapter.metadata, policy),
                        }));
                        self.counts.chapters_created += 1;
                        id
                    }
                };
                self.landed_chapters.insert(chapter_id);

                for file in &chapter.files {
                    self.place_file(file, chapter_id, owner, index);
                }
            }
        }

        let operations = self.operation_count() - before;
        if let Some(position) = owner
            && operations > 0
        {
            self.touched.insert(position);
        }

        SeriesOutcome {
            name: scanned.name.clone(),
            series_id,
            matched,
            counts: SeriesCounts {
                volumes: scanned.volumes.len(),
                chapters: scanned.chapter_count(),
                files: scanned.file_count(),
            },
            operations,
        }
    }

    fn update_series_header(
        &mut self,
        current: &PersistedSeries,
        scanned: &ScannedSeries,
        policy: &MetadataPolicy,
    ) {
        if current.name != scanned.name {
            let locked = current.locked_fields.contains(&MetadataField::Name);
            if policy.may_write(MetadataField::Name, locked) {
                debug!(
                    target: "scan::reconcile",
                    series_id = %current.id,
                    from = %current.name,
                    to = %scanned.name,
                    "series renamed"
                );
                self.diff.to_update.push(UpdateOp::RenameSeries {
                    series_id: current.id,
                    previous: current.name.clone(),
                    name: scanned.name.clone(),
                    normalized_name: scanned.normalized_name.clone(),
                });
            } else if locked && policy.enabled_fields.contains(&MetadataField::Name) {
                self.warnings.push(ScanWarning::series(
                    current.name.clone(),
                    format!("name is locked; scanned name {:?} not applied", scanned.name),
                ));
            }
        }

        let diff = diff_fields(&current.metadata, &current.locked_fields, &scanned.metadata, policy);
        self.note_locks(&current.name, "series", &diff);
        if !diff.changes.is_empty() {
            self.diff.to_update.push(UpdateOp::SeriesMetadata {
                series_id: current.id,
                changes: diff.changes,
            });
        }
    }

    fn note_locks(&mut self, series: &str, scope: &str, diff: &FieldDiff) {
        if diff.held_by_lock.is_empty() {
            return;
        }
        let fields: Vec<&str> = diff.held_by_lock.iter().copied().map(field_label).collect();
        self.warnings.push(ScanWarning::series(
            series,
            format!("{scope}: locked {} kept; sidecar value not applied", fields.join(", ")),
        ));
    }

    fn place_file(
        &mut self,
        file: &ScannedFile,
        chapter_id: ChapterId,
        owner: Option<usize>,
        index: &FileIndex,
    ) {
        self.counts.files_scanned += 1;
        let path = &file.file.path;

        if let Some(location) = index.at_path(path)
            && self.consumed.insert(location.file.id)
        {
            let same_chapter = location.chapter_id == chapter_id;
            if same_chapter && same_content(&location.file, file) {
                self.counts.files_unchanged += 1;
                self.diff.unchanged_files += 1;
                return;
            }
            self.update_file(location, file, chapter_id, !same_chapter, owner);
            return;
        }

        if let Some(key) = file.file.fingerprint.identity_key()
            && let Some(location) = index
                .missing_with_identity(&key)
                .find(|location| !self.consumed.contains(&location.file.id))
        {
            self.consumed.insert(location.file.id);
            debug!(
                target: "scan::reconcile",
                from = %location.file.path.display(),
                to = %path.display(),
                "file moved"
            );
            self.update_file(location, file, chapter_id, true, owner);
            return;
        }

        self.diff.to_create.push(CreateOp::File(NewFile {
            id: FileId::new(),
            chapter_id,
            path: path.clone(),
            size: file.file.size,
            modified_ms: file.file.modified_ms,
            weak_hash: file.file.fingerprint.weak_hash.clone(),
            pages: file.pages,
        }));
        self.counts.files_created += 1;
    }

    fn update_file(
        &mut self,
        location: &FileLocation,
        file: &ScannedFile,
        chapter_id: ChapterId,
        moved: bool,
        owner: Option<usize>,
    ) {
        if owner != Some(location.series) {
            self.touched.insert(location.series);
        }
        self.diff.to_update.push(UpdateOp::File(FileUpdate {
            file_id: location.file.id,
            chapter_id,
            path: file.file.path.clone(),
            size: file.file.size,
            modified_ms: file.file.modified_ms,
            weak_hash: file.file.fingerprint.weak_hash.clone(),
            pages: file.pages,
            moved,
        }));
        self.counts.files_updated += 1;
    }

    /// Decide what happens to catalog entities no scanned file landed in.
    /// Only the top-most entity of a removed subtree is listed.
    pub fn collect_removals(
        &mut self,
        persisted: &[PersistedSeries],
        matched: &HashSet<usize>,
        index: &FileIndex,
    ) {
        let mut dropped = HashSet::new();
        for (position, series) in persisted.iter().enumerate() {
            match self.series_fate(series, matched.contains(&position), index) {
                Fate::Gone => {
                    self.diff.to_remove.push(EntityRef::Series(series.id));
                    self.counts.series_removed += 1;
                    for volume in &series.volumes {
                        self.count_removed_volume(volume, index);
                    }
                    dropped.insert(position);
                }
                Fate::Rehomed => {
                    self.diff.rehomed.push(EntityRef::Series(series.id));
                    dropped.insert(position);
                }
                Fate::Alive => {
                    if self.prune_volumes(series, index) {
                        self.touched.insert(position);
                    }
                }
            }
        }
        self.counts.series_updated = self.touched.difference(&dropped).count();
    }

    /// Returns true when anything below `series` was removed or rehomed.
    fn prune_volumes(&mut self, series: &PersistedSeries, index: &FileIndex) -> bool {
        let mut changed = false;
        for volume in &series.volumes {
            match self.volume_fate(volume, index) {
                Fate::Gone => {
                    self.diff.to_remove.push(EntityRef::Volume(volume.id));
                    self.count_removed_volume(volume, index);
                    changed = true;
                }
                Fate::Rehomed => {
                    self.diff.rehomed.push(EntityRef::Volume(volume.id));
                    changed = true;
                }
                Fate::Alive => {
                    for chapter in &volume.chapters {
                        match self.chapter_fate(chapter, index) {
                            Fate::Gone => {
                                self.diff.to_remove.push(EntityRef::Chapter(chapter.id));
                                self.count_removed_chapter(chapter, index);
                                changed = true;
                            }
                            Fate::Rehomed => {
                                self.diff.rehomed.push(EntityRef::Chapter(chapter.id));
                                changed = true;
                            }
                            Fate::Alive => {
                                for file in &chapter.files {
                                    if self.is_gone(file, index) {
                                        self.diff.to_remove.push(EntityRef::File(file.id));
                                        self.counts.files_removed += 1;
                                        changed = true;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        changed
    }

    fn count_removed_volume(&mut self, volume: &PersistedVolume, index: &FileIndex) {
        self.counts.volumes_removed += 1;
        for chapter in &volume.chapters {
            self.count_removed_chapter(chapter, index);
        }
    }

    fn count_removed_chapter(&mut self, chapter: &PersistedChapter, index: &FileIndex) {
        let gone = chapter
            .files
            .iter()
            .filter(|file| self.is_gone(file, index))
            .count();
        self.counts.chapters_removed += 1;
        self.counts.files_removed += gone;
    }

    fn is_gone(&self, file: &PersistedFile, index: &FileIndex) -> bool {
        !self.consumed.contains(&file.id) && !index.is_excluded(&file.path)
    }

    fn is_held(&self, file: &PersistedFile, index: &FileIndex) -> bool {
        !self.consumed.contains(&file.id) && index.is_excluded(&file.path)
    }

    fn chapter_fate(&self, chapter: &PersistedChapter, index: &FileIndex) -> Fate {
        if self.landed_chapters.contains(&chapter.id)
            || chapter.files.iter().any(|file| self.is_held(file, index))
        {
            Fate::Alive
        } else if chapter.files.is_empty()
            || chapter.files.iter().any(|file| self.is_gone(file, index))
        {
            Fate::Gone
        } else {
            Fate::Rehomed
        }
    }

    fn volume_fate(&self, volume: &PersistedVolume, index: &FileIndex) -> Fate {
        if self.landed_volumes.contains(&volume.id) {
            return Fate::Alive;
        }
        rollup(
            volume
                .chapters
                .iter()
                .map(|chapter| self.chapter_fate(chapter, index)),
        )
    }

    fn series_fate(&self, series: &PersistedSeries, matched: bool, index: &FileIndex) -> Fate {
        if matched {
            return Fate::Alive;
        }
        rollup(
            series
                .volumes
                .iter()
                .map(|volume| self.volume_fate(volume, index)),
        )
    }
}

/// Alive if any child lives; gone if any child is gone or there are no
/// children; rehomed only when every child was rehomed.
fn rollup(children: impl Iterator<Item = Fate>) -> Fate {
    let mut fate = None;
    for child in children {
        fate = match (fate, child) {
            (_, Fate::Alive) => return Fate::Alive,
            (Some(Fate::Gone), _) | (_, Fate::Gone) => Some(Fate::Gone),
            (_, Fate::Rehomed) => Some(Fate::Rehomed),
        };
    }
    fate.unwrap_or(Fate::Gone)
}

fn same_content(persisted: &PersistedFile, scanned: &ScannedFile) -> bool {
    persisted.size == scanned.file.size
        && persisted.modified_ms == scanned.file.modified_ms
        && persisted.weak_hash == scanned.file.fingerprint.weak_hash
        && persisted.pages == scanned.pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollup_prefers_life_then_removal() {
        assert_eq!(rollup([Fate::Gone, Fate::Alive].into_iter()), Fate::Alive);
        assert_eq!(rollup([Fate::Rehomed, Fate::Gone].into_iter()), Fate::Gone);
        assert_eq!(rollup([Fate::Rehomed, Fate::Rehomed].into_iter()), Fate::Rehomed);
        assert_eq!(rollup(std::iter::empty()), Fate::Gone);
    }
}
