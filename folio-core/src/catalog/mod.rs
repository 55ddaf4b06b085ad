//! Catalog store port and an in-memory adapter.
//!
//! The scanner reads the persisted view of a library once per pass and hands
//! back one [`LibraryDiff`]. Stores apply a diff atomically per library and
//! report individual operations they could not apply instead of rejecting
//! the whole diff.

mod memory;

use async_trait::async_trait;
use folio_model::{CommitResult, LibraryDiff, LibraryId, PersistedSeries};

use crate::error::Result;

pub use memory::{CatalogSnapshot, InMemoryCatalog, LibrarySnapshot};

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Every persisted series of `library_id`, with volumes, chapters and
    /// files. An unreachable store is an error, never an empty list.
    async fn load_existing_series(&self, library_id: LibraryId) -> Result<Vec<PersistedSeries>>;

    /// Apply `diff`. At most one commit per library runs at a time.
    async fn commit(&self, diff: &LibraryDiff) -> Result<CommitResult>;
}
