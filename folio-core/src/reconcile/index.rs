use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use folio_model::{ChapterId, FileId, PersistedFile, PersistedSeries, ScannedSeries};

/// Where a persisted file currently lives.
#[derive(Debug, Clone)]
pub(crate) struct FileLocation {
    pub series: usize,
    pub chapter_id: ChapterId,
    pub file: PersistedFile,
}

/// Library-wide lookups over the catalog and the discovered paths.
#[derive(Debug, Default)]
pub(crate) struct FileIndex {
    pub files: HashMap<FileId, FileLocation>,
    by_path: HashMap<PathBuf, FileId>,
    by_identity: HashMap<String, Vec<FileId>>,
    discovered: HashSet<PathBuf>,
    excluded: Vec<PathBuf>,
}

impl FileIndex {
    pub fn build(
        persisted: &[PersistedSeries],
        scanned: &[ScannedSeries],
        excluded: Vec<PathBuf>,
    ) -> Self {
        let mut index = FileIndex {
            excluded,
            ..FileIndex::default()
        };
        for (position, series) in persisted.iter().enumerate() {
            for volume in &series.volumes {
                for chapter in &volume.chapters {
                    for file in &chapter.files {
                        index.by_path.entry(file.path.clone()).or_insert(file.id);
                        if let Some(key) = file.identity_key() {
                            index.by_identity.entry(key).or_default().push(file.id);
                        }
                        index.files.insert(
                            file.id,
                            FileLocation {
                                series: position,
                                chapter_id: chapter.id,
                                file: file.clone(),
                            },
                        );
                    }
                }
            }
        }
        index.discovered = scanned
            .iter()
            .flat_map(|series| series.files())
            .map(|file| file.file.path.clone())
            .collect();
        index
    }

    pub fn at_path(&self, path: &Path) -> Option<&FileLocation> {
        self.by_path.get(path).and_then(|id| self.files.get(id))
    }

    /// Persisted files with this identity whose recorded path was not seen
    /// in this pass, i.e. candidates for a rename or move.
    pub fn missing_with_identity<'a>(
        &'a self,
        key: &str,
    ) -> impl Iterator<Item = &'a FileLocation> {
        self.by_identity
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.files.get(id))
            .filter(move |location| !self.discovered.contains(&location.file.path))
    }

    /// A file-level error hid this path (or a directory above it).
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.excluded
            .iter()
            .any(|excluded| path == excluded || path.starts_with(excluded))
    }
}
