//! # Folio Core
//!
//! Scanning and reconciliation engine for comic, manga and book libraries.
//!
//! A scan walks each library root, classifies what it finds, parses
//! filenames into series/volume/chapter hints, opens containers for their
//! page counts and embedded metadata, assembles the results into series and
//! diffs them against the catalog. The catalog itself lives behind
//! [`CatalogStore`]; this crate only produces a [`folio_model::LibraryDiff`]
//! and asks the store to commit it.
//!
//! ## Layout
//!
//! - [`walker`] and [`classifier`]: enumerate library roots and decide what
//!   each path is.
//! - [`parser`]: filename pattern cascade and series name normalization.
//! - [`archive`]: CBZ/ZIP, CBR/RAR, EPUB, PDF and loose image backends.
//! - [`pipeline`] and [`assembler`]: per-file inspection and grouping.
//! - [`reconcile`]: matching and diffing against the persisted catalog.
//! - [`orchestrator`]: runs libraries concurrently and reports progress.
//!
//! ## Feature Flags
//!
//! - `rar`: CBR/RAR support through the bundled unrar library.
//! - `pdf`: PDF page counting and document info.

pub mod archive;
pub mod assembler;
pub mod catalog;
pub mod classifier;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod natural;
pub mod orchestrator;
pub mod parser;
pub mod pipeline;
pub mod reconcile;
pub mod settings;
pub mod walker;

pub use archive::{ArchiveError, ArchiveLimits, ArchiveReader};
pub use assembler::{Assembly, SeriesAssembler};
pub use catalog::{CatalogSnapshot, CatalogStore, InMemoryCatalog, LibrarySnapshot};
pub use classifier::{Classification, IgnoreReason, PathClassifier};
pub use error::{Result, ScanError};
pub use events::{InProcScanEventBus, NullEventSink, RecordingEventSink, ScanEventSink};
pub use orchestrator::ScanOrchestrator;
pub use parser::FilenameParser;
pub use reconcile::{ReconcileStage, Reconciliation, ReconciliationEngine};
pub use settings::{SettingsProvider, SharedSettings};
pub use walker::DirectoryWalker;
