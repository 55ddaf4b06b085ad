//! Core data model definitions shared across Folio crates.
//!
//! Everything in here is plain data: what the scanner observed on disk
//! ([`DiscoveredFile`], [`ParsedInfo`], [`EmbeddedMetadata`]), the transient
//! aggregates it assembles ([`ScannedSeries`]), the catalog view handed over
//! by the persistence collaborator ([`PersistedSeries`]) and the diff that
//! flows back to it ([`LibraryDiff`]).
#![allow(missing_docs)]

pub use ::chrono;

pub mod catalog;
pub mod diff;
pub mod error;
pub mod files;
pub mod format;
pub mod ids;
pub mod library;
pub mod metadata;
pub mod numbers;
pub mod parsed;
pub mod scan;
pub mod scanned;

// Intentionally curated re-exports for downstream consumers.
pub use catalog::{
    PersistedChapter, PersistedFile, PersistedSeries, PersistedVolume,
};
pub use diff::{
    CommitResult, CreateOp, EntityRef, FailedOperation, FieldChange,
    FileUpdate, LibraryDiff, NewChapter, NewFile, NewSeries, NewVolume,
    UpdateOp,
};
pub use error::{ModelError, Result as ModelResult};
pub use files::{DiscoveredFile, FileFingerprint};
pub use format::Format;
pub use ids::{ChapterId, FileId, LibraryId, SeriesId, VolumeId};
pub use library::LibraryType;
pub use metadata::{
    AgeRating, EmbeddedMetadata, FieldValue, LockedFields, MetadataField,
    MetadataSet, Person, PersonRole,
};
pub use numbers::Numbering;
pub use parsed::ParsedInfo;
pub use scan::{
    LibraryScanResult, LibraryScanStatus, LibraryScanSummary, ScanCounts,
    ScanEvent, ScanSummary, ScanWarning, SeriesCounts, WarningScope,
};
pub use scanned::{
    ChapterKey, ScannedChapter, ScannedFile, ScannedSeries, ScannedVolume,
    SeriesKey,
};
