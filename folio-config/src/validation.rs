//! Guard rails applied to scanner settings before a scan may start.

use std::collections::HashSet;

use globset::Glob;
use thiserror::Error;

use crate::models::scanner::ScannerConfig;

/// Settings that would make a scan unsafe or impossible.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigGuardRailError {
    #[error("{field} must be greater than zero")]
    ZeroLimit { field: &'static str },

    #[error("library id {id} is used by more than one library")]
    DuplicateLibraryId { id: String },

    #[error("library {name:?} has no root folders")]
    NoRoots { name: String },

    #[error("library {name:?} has an invalid exclude pattern {pattern:?}: {reason}")]
    InvalidExclude {
        name: String,
        pattern: String,
        reason: String,
    },
}

/// Suspicious but usable settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    MissingRoot { library: String, root: String },
    TinyArchiveTimeout { timeout_ms: u64 },
    OpenArchivesBelowFileWorkers { open: usize, workers: usize },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingRoot { library, root } => write!(
                f,
                "library {library:?}: root {root} does not exist yet; its scan will fail until it does"
            ),
            ConfigWarning::TinyArchiveTimeout { timeout_ms } => write!(
                f,
                "archive_timeout_ms={timeout_ms} is very low; large archives on slow disks will be reported as errors"
            ),
            ConfigWarning::OpenArchivesBelowFileWorkers { open, workers } => write!(
                f,
                "max_open_archives={open} is below max_parallel_files={workers}; file workers will queue on archive permits"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigWarnings(pub Vec<ConfigWarning>);

impl ConfigWarnings {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.0.iter()
    }
}

impl ScannerConfig {
    /// Reject configurations the scanner cannot honour and collect warnings
    /// for the ones it can but probably should not.
    pub fn validate(&self) -> Result<ConfigWarnings, ConfigGuardRailError> {
        for (field, value) in [
            ("max_parallel_libraries", self.max_parallel_libraries),
            ("max_parallel_files", self.max_parallel_files),
            ("max_open_archives", self.max_open_archives),
            ("event_capacity", self.event_capacity),
        ] {
            if value == 0 {
                return Err(ConfigGuardRailError::ZeroLimit { field });
            }
        }
        if self.archive_timeout_ms == 0 {
            return Err(ConfigGuardRailError::ZeroLimit {
                field: "archive_timeout_ms",
            });
        }
        if self.parse_budget_ms == 0 {
            return Err(ConfigGuardRailError::ZeroLimit {
                field: "parse_budget_ms",
            });
        }

        let mut seen = HashSet::new();
        let mut warnings = Vec::new();
        for library in &self.libraries {
            if !seen.insert(library.id) {
                return Err(ConfigGuardRailError::DuplicateLibraryId {
                    id: library.id.to_string(),
                });
            }
            if library.roots.is_empty() {
                return Err(ConfigGuardRailError::NoRoots {
                    name: library.name.clone(),
                });
            }
            for pattern in &library.exclude_patterns {
                if let Err(err) = Glob::new(&pattern.trim().replace('\\', "/")) {
                    return Err(ConfigGuardRailError::InvalidExclude {
                        name: library.name.clone(),
                        pattern: pattern.clone(),
                        reason: err.to_string(),
                    });
                }
            }
            for root in &library.roots {
                if !root.exists() {
                    warnings.push(ConfigWarning::MissingRoot {
                        library: library.name.clone(),
                        root: root.display().to_string(),
                    });
                }
            }
        }

        if self.archive_timeout_ms < 1_000 {
            warnings.push(ConfigWarning::TinyArchiveTimeout {
                timeout_ms: self.archive_timeout_ms,
            });
        }
        if self.max_open_archives < self.max_parallel_files {
            warnings.push(ConfigWarning::OpenArchivesBelowFileWorkers {
                open: self.max_open_archives,
                workers: self.max_parallel_files,
            });
        }

        Ok(ConfigWarnings(warnings))
    }
}
