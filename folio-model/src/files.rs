use std::path::{Path, PathBuf};

/// Cheap, stable identity of a file's content used to recognise the same
/// file after a rename or move without re-reading it in full.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileFingerprint {
    pub size: u64,
    pub modified_ms: i64,
    /// Hex digest over the file's leading bytes. `None` when the file could
    /// not be sampled, in which case the fingerprint never matches.
    pub weak_hash: Option<String>,
}

impl FileFingerprint {
    /// Key used for rename/move detection. Deliberately excludes the
    /// modification time, which copies and some moves do not preserve.
    pub fn identity_key(&self) -> Option<String> {
        self.weak_hash
            .as_ref()
            .map(|hash| format!("{}:{}", self.size, hash))
    }
}

/// One file observed during a filesystem pass. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Library root the file was found under.
    pub root: PathBuf,
    pub size: u64,
    pub modified_ms: i64,
    pub fingerprint: FileFingerprint,
}

impl DiscoveredFile {
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    /// Path relative to the library root, falling back to the full path.
    pub fn relative_path(&self) -> &Path {
        self.path.strip_prefix(&self.root).unwrap_or(&self.path)
    }
}
