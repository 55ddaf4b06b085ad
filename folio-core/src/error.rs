use std::path::PathBuf;

use folio_model::LibraryId;
use thiserror::Error;

/// Library- and process-level failures. File-level problems never surface
/// as a `ScanError`; they become warnings on the library result.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Library root inaccessible: {path}: {reason}")]
    RootInaccessible { path: PathBuf, reason: String },

    #[error("Invalid exclude pattern: {0}")]
    ExcludePattern(#[from] globset::Error),

    #[error("Catalog store unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Library {0} is already being scanned")]
    AlreadyScanning(LibraryId),

    #[error("Unknown library: {0}")]
    UnknownLibrary(LibraryId),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
