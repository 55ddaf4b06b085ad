//! Per-library file pipeline: walk, parse, inspect.
//!
//! Walking runs on a blocking thread and feeds a bounded channel, so the
//! first files are parsed and opened while the tree is still being
//! enumerated. The walk itself only reads metadata. Every content read,
//! the fingerprint sample included, is bounded twice: by a semaphore shared
//! across every library of a run, and by a per-archive timeout.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use folio_model::{
    DiscoveredFile, Format, LibraryId, LibraryType, ScanEvent, ScanWarning, ScannedFile,
};
use futures::StreamExt;
use tokio::sync::{Semaphore, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::archive::{ArchiveError, ArchiveReader};
use crate::error::{Result, ScanError};
use crate::events::ScanEventSink;
use crate::fingerprint;
use crate::parser::FilenameParser;
use crate::walker::{DirectoryWalker, WalkEntry};

/// Everything one library's walk produced.
#[derive(Debug, Default)]
pub struct CollectedFiles {
    /// Files that parsed and opened cleanly, sorted by path.
    pub files: Vec<ScannedFile>,
    pub warnings: Vec<ScanWarning>,
    /// Paths excluded from this pass because of a file-level error. A
    /// persisted file at (or below) one of these paths is left untouched.
    pub excluded: Vec<PathBuf>,
    /// Walking stopped early because the scan was cancelled.
    pub cancelled: bool,
}

impl CollectedFiles {
    fn exclude(&mut self, path: PathBuf, reason: String) {
        self.warnings.push(ScanWarning::file(path.clone(), reason));
        self.excluded.push(path);
    }
}

enum Outcome {
    Scanned(ScannedFile),
    Failed { path: PathBuf, reason: String },
    Skipped,
}

/// Shared settings for one run's file workers.
#[derive(Debug, Clone)]
pub struct FilePipeline {
    parser: FilenameParser,
    reader: ArchiveReader,
    archive_permits: Arc<Semaphore>,
    archive_timeout: Duration,
    max_parallel_files: usize,
}

impl FilePipeline {
    pub fn new(
        parser: FilenameParser,
        reader: ArchiveReader,
        archive_permits: Arc<Semaphore>,
        archive_timeout: Duration,
        max_parallel_files: usize,
    ) -> Self {
        Self {
            parser,
            reader,
            archive_permits,
            archive_timeout,
            max_parallel_files: max_parallel_files.max(1),
        }
    }

    /// Walk every root of one library and inspect what was found.
    ///
    /// Returns an error only when enumeration itself broke down, since a
    /// partial tree must never be reconciled.
    pub async fn collect(
        &self,
        library_id: LibraryId,
        library_type: LibraryType,
        walkers: Vec<DirectoryWalker>,
        cancel: &CancellationToken,
        events: &dyn ScanEventSink,
    ) -> Result<CollectedFiles> {
        let (tx, rx) = mpsc::channel::<WalkEntry>(self.max_parallel_files * 4);
        let walk_cancel = cancel.clone();
        let walker_task = tokio::task::spawn_blocking(move || {
            for walker in walkers {
                for entry in walker.walk() {
                    if walk_cancel.is_cancelled() {
                        return;
                    }
                    if tx.blocking_send(entry).is_err() {
                        return;
                    }
                }
            }
        });

        let mut outcomes = ReceiverStream::new(rx)
            .map(|entry| self.handle_entry(entry, library_type))
            .buffer_unordered(self.max_parallel_files);

        let mut collected = CollectedFiles::default();
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Outcome::Scanned(file) => collected.files.push(file),
                Outcome::Failed { path, reason } => {
                    events.publish(ScanEvent::FileError {
                        library_id,
                        path: path.clone(),
                        reason: reason.clone(),
                    });
                    collected.exclude(path, reason);
                }
                Outcome::Skipped => {}
            }
        }

        walker_task
            .await
            .map_err(|err| ScanError::Internal(format!("directory walk aborted: {err}")))?;

        collected.cancelled = cancel.is_cancelled();
        collected
            .files
            .sort_by(|a, b| a.file.path.cmp(&b.file.path));
        collected.warnings.sort_by(|a, b| a.path.cmp(&b.path));
        collected.excluded.sort();
        Ok(collected)
    }

    async fn handle_entry(&self, entry: WalkEntry, library_type: LibraryType) -> Outcome {
        match entry {
            WalkEntry::File { file, format } => self.inspect_file(file, format, library_type).await,
            WalkEntry::Unreadable { path, reason } => Outcome::Failed {
                path,
                reason: format!("unreadable: {reason}"),
            },
            // Folder sidecars are read by the image backend on demand.
            WalkEntry::Sidecar(_) => Outcome::Skipped,
        }
    }

    async fn inspect_file(
        &self,
        mut file: DiscoveredFile,
        format: Format,
        library_type: LibraryType,
    ) -> Outcome {
        let parsed = self
            .parser
            .parse_in_root(&file.path, &file.root, library_type);

        let permit = match self.archive_permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return Outcome::Failed {
                    path: file.path,
                    reason: "archive permits closed".to_string(),
                };
            }
        };

        let reader = self.reader;
        let path = file.path.clone();
        let task = tokio::task::spawn_blocking(move || {
            // Held until the reads finish, even if the caller stops waiting.
            let _permit = permit;
            let weak_hash = match fingerprint::weak_hash(&path) {
                Ok(hash) => Some(hash),
                Err(err) => {
                    debug!(target: "scan::archive", path = %path.display(), error = %err, "could not sample file");
                    None
                }
            };
            reader
                .inspect(&path, format)
                .map(|inspection| (weak_hash, inspection))
        });

        let inspected = match tokio::time::timeout(self.archive_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(ArchiveError::Corrupt(format!("reader crashed: {join}"))),
            Err(_) => Err(ArchiveError::TimedOut(self.archive_timeout)),
        };

        match inspected {
            Ok((weak_hash, inspection)) => {
                file.fingerprint.weak_hash = weak_hash;
                debug!(
                    target: "scan::archive",
                    path = %file.path.display(),
                    pages = inspection.pages,
                    sidecar = inspection.metadata.is_some(),
                    "inspected"
                );
                let declared = inspection
                    .metadata
                    .as_ref()
                    .and_then(|metadata| metadata.page_count);
                let pages = match (inspection.pages, declared) {
                    (0, Some(declared)) => declared,
                    (counted, _) => counted,
                };
                Outcome::Scanned(ScannedFile {
                    pages,
                    metadata: inspection.metadata,
                    parsed,
                    file,
                })
            }
            Err(err) => {
                warn!(target: "scan::archive", path = %file.path.display(), error = %err, "file excluded from scan");
                Outcome::Failed {
                    path: file.path,
                    reason: err.to_string(),
                }
            }
        }
    }
}
