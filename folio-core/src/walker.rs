//! Lazy, natural-order traversal of one library root.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use folio_config::{LibraryConfig, ScannerConfig};
use folio_model::{DiscoveredFile, Format};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

use crate::classifier::{Classification, PathClassifier};
use crate::error::{Result, ScanError};
use crate::fingerprint;
use crate::natural::natural_cmp_os;

#[derive(Debug, Clone, Copy)]
pub struct WalkOptions {
    pub max_depth: usize,
    pub follow_symlinks: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_depth: 32,
            follow_symlinks: true,
        }
    }
}

/// One item produced by a walk.
#[derive(Debug, Clone, PartialEq)]
pub enum WalkEntry {
    File { file: DiscoveredFile, format: Format },
    Sidecar(PathBuf),
    /// An entry below the root that could not be read. Treated as a
    /// file-level problem; whatever lives under it is not considered gone.
    Unreadable { path: PathBuf, reason: String },
}

#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    root: PathBuf,
    excludes: GlobSet,
    options: WalkOptions,
}

pub fn build_globset(patterns: &[String]) -> std::result::Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if pattern.trim().is_empty() {
            continue;
        }
        // Backslashes are normalized to match `matches_excludes`.
        let normalized = pattern.trim().replace('\\', "/");
        builder.add(Glob::new(&normalized)?);
    }
    builder.build()
}

fn matches_excludes(relative: &Path, set: &GlobSet) -> bool {
    if set.is_empty() {
        return false;
    }
    let normalized = relative.to_string_lossy().replace('\\', "/");
    set.is_match(&normalized)
}

impl DirectoryWalker {
    pub fn new(
        root: impl Into<PathBuf>,
        exclude_patterns: &[String],
        options: WalkOptions,
    ) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            excludes: build_globset(exclude_patterns)?,
            options,
        })
    }

    /// One walker per configured root of `library`.
    pub fn for_library(library: &LibraryConfig, config: &ScannerConfig) -> Result<Vec<Self>> {
        let options = WalkOptions {
            max_depth: config.max_depth_for(library),
            follow_symlinks: config.follow_symlinks,
        };
        let excludes = build_globset(&library.exclude_patterns)?;
        Ok(library
            .roots
            .iter()
            .map(|root| Self {
                root: root.clone(),
                excludes: excludes.clone(),
                options,
            })
            .collect())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fail when the root itself cannot be listed. A missing root must
    /// never look like an empty library.
    pub fn ensure_root(&self) -> Result<()> {
        let inaccessible = |reason: String| ScanError::RootInaccessible {
            path: self.root.clone(),
            reason,
        };
        let metadata = fs::metadata(&self.root).map_err(|err| inaccessible(err.to_string()))?;
        if !metadata.is_dir() {
            return Err(inaccessible("not a directory".to_string()));
        }
        fs::read_dir(&self.root).map_err(|err| inaccessible(err.to_string()))?;
        Ok(())
    }

    pub fn walk(&self) -> Walk {
        let root = self.root.clone();
        let excludes = self.excludes.clone();
        let filter = move |entry: &DirEntry| {
            if entry.depth() == 0 {
                return true;
            }
            if entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(PathClassifier::is_ignored_directory)
            {
                return false;
            }
            let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            !matches_excludes(relative, &excludes)
        };

        let inner = WalkDir::new(&self.root)
            .follow_links(self.options.follow_symlinks)
            .max_depth(self.options.max_depth)
            .sort_by(|a, b| natural_cmp_os(a.file_name(), b.file_name()))
            .into_iter()
            .filter_entry(Box::new(filter) as EntryFilter);

        Walk {
            root: self.root.clone(),
            inner,
            visited: HashSet::new(),
            follow_symlinks: self.options.follow_symlinks,
        }
    }
}

type EntryFilter = Box<dyn FnMut(&DirEntry) -> bool + Send>;

/// Iterator over a root. Nothing is read ahead of the consumer.
pub struct Walk {
    root: PathBuf,
    inner: walkdir::FilterEntry<walkdir::IntoIter, EntryFilter>,
    visited: HashSet<PathBuf>,
    follow_symlinks: bool,
}

impl std::fmt::Debug for Walk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walk")
            .field("root", &self.root)
            .field("visited", &self.visited.len())
            .finish()
    }
}

impl Walk {
    fn enter_directory(&mut self, entry: &DirEntry) -> bool {
        if !self.follow_symlinks {
            return true;
        }
        match fs::canonicalize(entry.path()) {
            Ok(real) => self.visited.insert(real),
            Err(_) => true,
        }
    }
}

impl Iterator for Walk {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<WalkEntry> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    if let Some(ancestor) = err.loop_ancestor() {
                        debug!(
                            target: "scan::walk",
                            path = %path.display(),
                            ancestor = %ancestor.display(),
                            "symlink cycle skipped"
                        );
                        continue;
                    }
                    warn!(target: "scan::walk", path = %path.display(), error = %err, "unreadable entry");
                    return Some(WalkEntry::Unreadable {
                        path,
                        reason: err.to_string(),
                    });
                }
            };

            if entry.file_type().is_dir() {
                if !self.enter_directory(&entry) {
                    debug!(
                        target: "scan::walk",
                        path = %entry.path().display(),
                        "directory already visited through another link"
                    );
                    self.inner.skip_current_dir();
                }
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let format = match PathClassifier::classify(path) {
                Classification::Supported(format) => format,
                Classification::SidecarMetadata => {
                    return Some(WalkEntry::Sidecar(path.to_path_buf()));
                }
                Classification::Ignored(reason) => {
                    trace!(target: "scan::walk", path = %path.display(), ?reason, "ignored");
                    continue;
                }
            };

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    return Some(WalkEntry::Unreadable {
                        path: path.to_path_buf(),
                        reason: err.to_string(),
                    });
                }
            };
            if metadata.len() == 0 {
                trace!(target: "scan::walk", path = %path.display(), "zero-byte file ignored");
                continue;
            }

            // Content is sampled later, under the archive permit and timeout.
            let fingerprint = fingerprint::from_metadata(&metadata);
            let file = DiscoveredFile {
                path: path.to_path_buf(),
                root: self.root.clone(),
                size: fingerprint.size,
                modified_ms: fingerprint.modified_ms,
                fingerprint,
            };
            return Some(WalkEntry::File { file, format });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"data").unwrap();
    }

    fn walked(walker: &DirectoryWalker) -> Vec<String> {
        walker
            .walk()
            .filter_map(|entry| match entry {
                WalkEntry::File { file, .. } => Some(
                    file.relative_path().to_string_lossy().replace('\\', "/"),
                ),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn visits_in_natural_order_and_skips_noise() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for name in ["S/v10.cbz", "S/v2.cbz", "S/v1.cbz", "S/.hidden.cbz", "S/notes.txt"] {
            touch(root, name);
        }
        touch(root, "@eaDir/S/v1.cbz");
        touch(root, ".trash/v1.cbz");
        fs::write(root.join("S/empty.cbz"), b"").unwrap();

        let walker = DirectoryWalker::new(root, &[], WalkOptions::default()).unwrap();
        assert_eq!(walked(&walker), vec!["S/v1.cbz", "S/v2.cbz", "S/v10.cbz"]);
    }

    #[test]
    fn walking_reads_metadata_only() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "S/v1.cbz");
        let walker = DirectoryWalker::new(dir.path(), &[], WalkOptions::default()).unwrap();
        let files: Vec<_> = walker
            .walk()
            .filter_map(|entry| match entry {
                WalkEntry::File { file, .. } => Some(file),
                _ => None,
            })
            .collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size, 4);
        assert_eq!(files[0].fingerprint.weak_hash, None);
    }

    #[test]
    fn honours_excludes_and_depth() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "A/Extras/x.cbz");
        touch(root, "A/a1.cbz");
        touch(root, "A/deep/er/a2.cbz");

        let walker = DirectoryWalker::new(
            root,
            &["**/Extras".to_string()],
            WalkOptions {
                max_depth: 2,
                follow_symlinks: true,
            },
        )
        .unwrap();
        assert_eq!(walked(&walker), vec!["A/a1.cbz"]);
    }

    #[test]
    fn sidecars_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Set/ComicInfo.xml");
        let walker = DirectoryWalker::new(dir.path(), &[], WalkOptions::default()).unwrap();
        let entries: Vec<_> = walker.walk().collect();
        assert!(matches!(&entries[..], [WalkEntry::Sidecar(path)] if path.ends_with("ComicInfo.xml")));
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let walker =
            DirectoryWalker::new(dir.path().join("gone"), &[], WalkOptions::default()).unwrap();
        assert!(matches!(
            walker.ensure_root(),
            Err(ScanError::RootInaccessible { .. })
        ));
    }

    #[test]
    fn invalid_globs_are_rejected() {
        let err = DirectoryWalker::new("/tmp", &["[broken".to_string()], WalkOptions::default())
            .unwrap_err();
        assert!(matches!(err, ScanError::ExcludePattern(_)));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycles_terminate() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "A/a1.cbz");
        std::os::unix::fs::symlink(root.join("A"), root.join("A/loop")).unwrap();
        std::os::unix::fs::symlink(root.join("A"), root.join("again")).unwrap();

        let walker = DirectoryWalker::new(root, &[], WalkOptions::default()).unwrap();
        let files = walked(&walker);
        assert_eq!(files, vec!["A/a1.cbz"]);
    }
}
