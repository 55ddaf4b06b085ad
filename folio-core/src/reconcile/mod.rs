//! Reconciliation of one library's scanned state against its catalog.
//!
//! The engine is a small state machine:
//!
//! ```text
//! Idle -> LoadingCatalog -> Matching -> Diffing -> Committing -> Completed
//!   \__________\_______________\__________\___________\______-> Failed
//! ```
//!
//! Per-file and per-series problems become warnings; only an unrecoverable
//! condition (the catalog store going away) moves a pass to `Failed`. The
//! engine never touches the catalog itself. It produces a [`LibraryDiff`]
//! the store applies.

mod diff;
mod index;
mod matching;
mod metadata;

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use folio_config::MetadataPolicy;
use folio_model::{
    LibraryDiff, LibraryId, PersistedSeries, ScanCounts, ScanWarning, ScannedSeries,
};
use tracing::{debug, info};

use crate::error::{Result, ScanError};
use diff::Ledger;
use index::FileIndex;

pub use diff::SeriesOutcome;
pub use matching::SeriesMatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileStage {
    Idle,
    LoadingCatalog,
    Matching,
    Diffing,
    Committing,
    Completed,
    Failed,
}

impl ReconcileStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, ReconcileStage::Completed | ReconcileStage::Failed)
    }

    fn can_advance_to(self, next: ReconcileStage) -> bool {
        use ReconcileStage::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, LoadingCatalog)
            | (LoadingCatalog, Matching)
            | (Matching, Diffing)
            | (Diffing, Committing)
            | (Committing, Completed) => true,
            _ => false,
        }
    }
}

/// Everything a finished diffing stage hands to the committer.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub diff: LibraryDiff,
    pub counts: ScanCounts,
    pub warnings: Vec<ScanWarning>,
}

#[derive(Debug)]
struct Plan {
    persisted: Vec<PersistedSeries>,
    pending: VecDeque<(ScannedSeries, SeriesMatch)>,
    matched: HashSet<usize>,
    index: FileIndex,
    ledger: Ledger,
}

#[derive(Debug)]
pub struct ReconciliationEngine {
    library_id: LibraryId,
    policy: MetadataPolicy,
    stage: ReconcileStage,
    plan: Option<Plan>,
}

impl ReconciliationEngine {
    pub fn new(library_id: LibraryId, policy: MetadataPolicy) -> Self {
        Self {
            library_id,
            policy,
            stage: ReconcileStage::Idle,
            plan: None,
        }
    }

    pub fn stage(&self) -> ReconcileStage {
        self.stage
    }

    pub fn advance(&mut self, next: ReconcileStage) -> Result<()> {
        if !self.stage.can_advance_to(next) {
            return Err(ScanError::Internal(format!(
                "reconciliation cannot move from {:?} to {:?}",
                self.stage, next
            )));
        }
        debug!(
            target: "scan::reconcile",
            library_id = %self.library_id,
            from = ?self.stage,
            to = ?next,
            "stage"
        );
        self.stage = next;
        Ok(())
    }

    pub fn fail(&mut self) {
        if !self.stage.is_terminal() {
            self.stage = ReconcileStage::Failed;
            self.plan = None;
        }
    }

    /// Match scanned series to the loaded catalog and enter `Diffing`.
    ///
    /// `excluded` lists paths hidden by file-level errors this pass; catalog
    /// files at or below them are kept as they are.
    pub fn begin(
        &mut self,
        persisted: Vec<PersistedSeries>,
        scanned: Vec<ScannedSeries>,
        excluded: Vec<PathBuf>,
    ) -> Result<()> {
        self.advance(ReconcileStage::Matching)?;

        let mut persisted: Vec<PersistedSeries> = persisted
            .into_iter()
            .filter(|series| series.library_id == self.library_id)
            .collect();
        persisted.sort_by(|a, b| {
            (&a.normalized_name, a.format, a.id).cmp(&(&b.normalized_name, b.format, b.id))
        });
        let scanned: Vec<ScannedSeries> = scanned
            .into_iter()
            .filter(|series| series.library_id == self.library_id)
            .collect();

        let index = FileIndex::build(&persisted, &scanned, excluded);
        let matches = matching::match_series(&persisted, &scanned, &index);
        let matched = matches.iter().filter_map(|found| found.persisted()).collect();
        info!(
            target: "scan::reconcile",
            library_id = %self.library_id,
            scanned = scanned.len(),
            persisted = persisted.len(),
            "matching complete"
        );

        self.plan = Some(Plan {
            persisted,
            pending: scanned.into_iter().zip(matches).collect(),
            matched,
            index,
            ledger: Ledger::new(LibraryDiff::new(self.library_id)),
        });
        self.advance(ReconcileStage::Diffing)
    }

    /// Series still waiting to be diffed.
    pub fn remaining(&self) -> usize {
        self.plan.as_ref().map_or(0, |plan| plan.pending.len())
    }

    /// Diff the next scanned series. Returns `None` once all are done or
    /// when the engine is not diffing.
    pub fn next_series(&mut self) -> Option<SeriesOutcome> {
        if self.stage != ReconcileStage::Diffing {
            return None;
        }
        let plan = self.plan.as_mut()?;
        let (scanned, matched) = plan.pending.pop_front()?;
        let outcome = plan.ledger.apply_series(
            &scanned,
            matched,
            &plan.persisted,
            &plan.index,
            &self.policy,
        );
        debug!(
            target: "scan::reconcile",
            series = %outcome.name,
            operations = outcome.operations,
            "series diffed"
        );
        Some(outcome)
    }

    /// Diff whatever is left, settle removals and hand over the result.
    /// The engine stays in `Diffing` until the caller advances it.
    pub fn finish(&mut self) -> Result<Reconciliation> {
        if self.stage != ReconcileStage::Diffing {
            return Err(ScanError::Internal(format!(
                "cannot finish reconciliation in stage {:?}",
                self.stage
            )));
        }
        while self.next_series().is_some() {}
        let mut plan = self
            .plan
            .take()
            .ok_or_else(|| ScanError::Internal("reconciliation plan missing".to_string()))?;
        plan.ledger
            .collect_removals(&plan.persisted, &plan.matched, &plan.index);

        let Ledger {
            diff,
            counts,
            warnings,
            ..
        } = plan.ledger;
        info!(
            target: "scan::reconcile",
            library_id = %self.library_id,
            creates = diff.to_create.len(),
            updates = diff.to_update.len(),
            removes = diff.to_remove.len(),
            rehomed = diff.rehomed.len(),
            unchanged = diff.unchanged_files,
            "diff ready"
        );
        Ok(Reconciliation {
            diff,
            counts,
            warnings,
        })
    }

    /// Run matching and diffing in one go, without a store.
    pub fn reconcile(
        library_id: LibraryId,
        policy: MetadataPolicy,
        persisted: Vec<PersistedSeries>,
        scanned: Vec<ScannedSeries>,
        excluded: Vec<PathBuf>,
    ) -> Result<Reconciliation> {
        let mut engine = Self::new(library_id, policy);
        engine.advance(ReconcileStage::LoadingCatalog)?;
        engine.begin(persisted, scanned, excluded)?;
        engine.finish()
    }
}
