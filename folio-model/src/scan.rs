use std::path::PathBuf;

use crate::chrono::{DateTime, Utc};
use crate::ids::LibraryId;

/// Terminal state of one library's scan pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum LibraryScanStatus {
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum WarningScope {
    File,
    Series,
    Library,
}

/// A recovered problem. Explains why a would-be change did not happen.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanWarning {
    pub scope: WarningScope,
    pub path: Option<PathBuf>,
    pub series: Option<String>,
    pub reason: String,
}

impl ScanWarning {
    pub fn file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            scope: WarningScope::File,
            path: Some(path.into()),
            series: None,
            reason: reason.into(),
        }
    }

    pub fn series(series: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            scope: WarningScope::Series,
            path: None,
            series: Some(series.into()),
            reason: reason.into(),
        }
    }

    pub fn library(reason: impl Into<String>) -> Self {
        Self {
            scope: WarningScope::Library,
            path: None,
            series: None,
            reason: reason.into(),
        }
    }
}

/// Cumulative counters for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanCounts {
    pub files_scanned: usize,
    pub files_unchanged: usize,
    pub files_created: usize,
    pub files_updated: usize,
    pub series_created: usize,
    pub series_updated: usize,
    pub series_removed: usize,
    pub volumes_created: usize,
    pub volumes_removed: usize,
    pub chapters_created: usize,
    pub chapters_removed: usize,
    pub files_removed: usize,
    pub errors: usize,
}

impl ScanCounts {
    pub fn merge(&mut self, other: &ScanCounts) {
        self.files_scanned += other.files_scanned;
        self.files_unchanged += other.files_unchanged;
        self.files_created += other.files_created;
        self.files_updated += other.files_updated;
        self.series_created += other.series_created;
        self.series_updated += other.series_updated;
        self.series_removed += other.series_removed;
        self.volumes_created += other.volumes_created;
        self.volumes_removed += other.volumes_removed;
        self.chapters_created += other.chapters_created;
        self.chapters_removed += other.chapters_removed;
        self.files_removed += other.files_removed;
        self.errors += other.errors;
    }
}

/// Size of one processed series, carried by progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeriesCounts {
    pub volumes: usize,
    pub chapters: usize,
    pub files: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LibraryScanResult {
    pub library_id: LibraryId,
    pub library_name: String,
    pub status: LibraryScanStatus,
    pub counts: ScanCounts,
    pub warnings: Vec<ScanWarning>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl LibraryScanResult {
    pub fn summary(&self) -> LibraryScanSummary {
        LibraryScanSummary {
            status: self.status,
            counts: self.counts,
            warning_count: self.warnings.len(),
            elapsed_ms: self.elapsed_ms,
        }
    }
}

/// Compact summary attached to `ScanCompleted` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LibraryScanSummary {
    pub status: LibraryScanStatus,
    pub counts: ScanCounts,
    pub warning_count: usize,
    pub elapsed_ms: u64,
}

/// Result of an orchestrated run across libraries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanSummary {
    pub libraries: Vec<LibraryScanResult>,
    pub totals: ScanCounts,
    pub cancelled: bool,
}

impl ScanSummary {
    pub fn push(&mut self, result: LibraryScanResult) {
        self.totals.merge(&result.counts);
        if result.status == LibraryScanStatus::Cancelled {
            self.cancelled = true;
        }
        self.libraries.push(result);
    }

    pub fn library(&self, id: LibraryId) -> Option<&LibraryScanResult> {
        self.libraries.iter().find(|result| result.library_id == id)
    }
}

/// Progress events published to the notification sink.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScanEvent {
    ScanStarted {
        library_id: LibraryId,
    },
    SeriesProcessed {
        library_id: LibraryId,
        series_name: String,
        counts: SeriesCounts,
    },
    ScanCompleted {
        library_id: LibraryId,
        summary: LibraryScanSummary,
    },
    FileError {
        library_id: LibraryId,
        path: PathBuf,
        reason: String,
    },
}

impl ScanEvent {
    pub fn library_id(&self) -> LibraryId {
        match self {
            ScanEvent::ScanStarted { library_id }
            | ScanEvent::SeriesProcessed { library_id, .. }
            | ScanEvent::ScanCompleted { library_id, .. }
            | ScanEvent::FileError { library_id, .. } => *library_id,
        }
    }
}
