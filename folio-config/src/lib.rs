//! Shared configuration library for Folio.
//!
//! This crate owns the scanner settings: which libraries exist, where their
//! roots live, what to exclude, how much parallelism to allow and which
//! metadata fields a scan may write. Settings are read once at scan start;
//! nothing here is mutated while a scan runs.

pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, error::ConfigLoadError};
pub use models::library::LibraryConfig;
pub use models::metadata::MetadataPolicy;
pub use models::scanner::{ScannerConfig, ScannerConfigSource};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
