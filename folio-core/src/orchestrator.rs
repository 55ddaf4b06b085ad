//! Top-level coordinator: runs libraries through walk, assembly,
//! reconciliation and commit, and reports progress.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use folio_config::{LibraryConfig, ScannerConfig};
use folio_model::{
    LibraryId, LibraryScanResult, LibraryScanStatus, ScanCounts, ScanEvent, ScanSummary,
    ScanWarning, WarningScope,
};
use futures::StreamExt;
use futures::stream;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::archive::{ArchiveLimits, ArchiveReader};
use crate::assembler::SeriesAssembler;
use crate::catalog::CatalogStore;
use crate::error::{Result, ScanError};
use crate::events::ScanEventSink;
use crate::parser::FilenameParser;
use crate::pipeline::FilePipeline;
use crate::reconcile::{ReconcileStage, ReconciliationEngine};
use crate::settings::SettingsProvider;
use crate::walker::DirectoryWalker;

/// Libraries currently being scanned by this orchestrator.
#[derive(Debug, Default)]
struct ActiveScans {
    libraries: Mutex<HashSet<LibraryId>>,
}

impl ActiveScans {
    fn try_claim(self: &Arc<Self>, library_id: LibraryId) -> Option<ActiveScanGuard> {
        let mut libraries = match self.libraries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        libraries.insert(library_id).then(|| ActiveScanGuard {
            scans: Arc::clone(self),
            library_id,
        })
    }

    fn contains(&self, library_id: LibraryId) -> bool {
        match self.libraries.lock() {
            Ok(guard) => guard.contains(&library_id),
            Err(poisoned) => poisoned.into_inner().contains(&library_id),
        }
    }
}

/// Releases the library when the scan ends, however it ends.
#[derive(Debug)]
struct ActiveScanGuard {
    scans: Arc<ActiveScans>,
    library_id: LibraryId,
}

impl Drop for ActiveScanGuard {
    fn drop(&mut self) {
        let mut libraries = match self.scans.libraries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        libraries.remove(&self.library_id);
    }
}

/// Shared per-run state.
struct RunContext {
    config: ScannerConfig,
    pipeline: FilePipeline,
    cancel: CancellationToken,
}

/// Why a library pass stopped before completing.
enum Interrupt {
    Cancelled(String),
    Failed(ScanError),
}

impl From<ScanError> for Interrupt {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::Cancelled(reason) => Interrupt::Cancelled(reason),
            other => Interrupt::Failed(other),
        }
    }
}

/// Running tally for one library.
struct LibraryRun {
    library: LibraryConfig,
    started_at: chrono::DateTime<Utc>,
    clock: Instant,
    counts: ScanCounts,
    warnings: Vec<ScanWarning>,
}

impl LibraryRun {
    fn new(library: LibraryConfig) -> Self {
        Self {
            library,
            started_at: Utc::now(),
            clock: Instant::now(),
            counts: ScanCounts::default(),
            warnings: Vec::new(),
        }
    }

    fn into_result(mut self, status: LibraryScanStatus) -> LibraryScanResult {
        self.counts.errors = self
            .warnings
            .iter()
            .filter(|warning| warning.scope != WarningScope::Library)
            .count();
        LibraryScanResult {
            library_id: self.library.id,
            library_name: self.library.name,
            status,
            counts: self.counts,
            warnings: self.warnings,
            started_at: self.started_at,
            completed_at: Utc::now(),
            elapsed_ms: u64::try_from(self.clock.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Runs scans for the configured libraries.
///
/// A library is never scanned by two passes at once; a second request while
/// one is running comes back `Cancelled` with a library warning.
pub struct ScanOrchestrator {
    settings: Arc<dyn SettingsProvider>,
    catalog: Arc<dyn CatalogStore>,
    events: Arc<dyn ScanEventSink>,
    active: Arc<ActiveScans>,
    cancel: Mutex<CancellationToken>,
    dry_run: bool,
}

impl std::fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("active", &self.active)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl ScanOrchestrator {
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        catalog: Arc<dyn CatalogStore>,
        events: Arc<dyn ScanEventSink>,
    ) -> Self {
        Self {
            settings,
            catalog,
            events,
            active: Arc::new(ActiveScans::default()),
            cancel: Mutex::new(CancellationToken::new()),
            dry_run: false,
        }
    }

    /// Compute diffs without committing them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Token observed by scans started from now on.
    pub fn cancellation_token(&self) -> CancellationToken {
        match self.cancel.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Stop every running scan at its next library or series boundary.
    /// Scans started afterwards run normally.
    pub fn cancel(&self) {
        let mut current = match self.cancel.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        current.cancel();
        *current = CancellationToken::new();
        info!(target: "scan::orchestrator", "cancellation requested");
    }

    pub fn is_scanning(&self, library_id: LibraryId) -> bool {
        self.active.contains(library_id)
    }

    /// Scan every enabled library.
    pub async fn scan_all(&self) -> ScanSummary {
        let config = self.settings.snapshot();
        let libraries: Vec<LibraryConfig> = config.enabled_libraries().cloned().collect();
        self.run(config, libraries).await
    }

    /// Scan the listed libraries. Unknown ids are an error; disabled
    /// libraries listed explicitly are scanned anyway.
    pub async fn scan_libraries(&self, ids: &[LibraryId]) -> Result<ScanSummary> {
        let config = self.settings.snapshot();
        let libraries = ids
            .iter()
            .map(|id| config.library(*id).cloned().ok_or(ScanError::UnknownLibrary(*id)))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.run(config, libraries).await)
    }

    pub async fn scan_library(&self, library_id: LibraryId) -> Result<LibraryScanResult> {
        let summary = self.scan_libraries(&[library_id]).await?;
        summary
            .libraries
            .into_iter()
            .next()
            .ok_or_else(|| ScanError::Internal("library result missing".to_string()))
    }

    async fn run(&self, config: ScannerConfig, libraries: Vec<LibraryConfig>) -> ScanSummary {
        let limit = config.max_parallel_libraries.max(1);
        let context = RunContext {
            pipeline: FilePipeline::new(
                FilenameParser::new(config.parse_budget()),
                ArchiveReader::new(ArchiveLimits::default()),
                Arc::new(Semaphore::new(config.max_open_archives.max(1))),
                config.archive_timeout(),
                config.max_parallel_files,
            ),
            cancel: self.cancellation_token(),
            config,
        };
        info!(
            target: "scan::orchestrator",
            libraries = libraries.len(),
            parallel = limit,
            dry_run = self.dry_run,
            "scan run started"
        );

        let results: Vec<LibraryScanResult> = stream::iter(libraries)
            .map(|library| self.scan_one(&context, library))
            .buffered(limit)
            .collect()
            .await;

        let mut summary = ScanSummary::default();
        for result in results {
            summary.push(result);
        }
        info!(
            target: "scan::orchestrator",
            libraries = summary.libraries.len(),
            files = summary.totals.files_scanned,
            series_created = summary.totals.series_created,
            series_updated = summary.totals.series_updated,
            series_removed = summary.totals.series_removed,
            errors = summary.totals.errors,
            cancelled = summary.cancelled,
            "scan run finished"
        );
        summary
    }

    async fn scan_one(&self, context: &RunContext, library: LibraryConfig) -> LibraryScanResult {
        let library_id = library.id;
        let mut run = LibraryRun::new(library);

        let Some(_guard) = self.active.try_claim(library_id) else {
            warn!(target: "scan::orchestrator", library_id = %library_id, "library already being scanned");
            run.warnings.push(ScanWarning::library(
                ScanError::AlreadyScanning(library_id).to_string(),
            ));
            return run.into_result(LibraryScanStatus::Cancelled);
        };

        self.events.publish(ScanEvent::ScanStarted { library_id });
        info!(
            target: "scan::orchestrator",
            library_id = %library_id,
            library = %run.library.name,
            "library scan started"
        );

        let status = match self.drive(context, &mut run).await {
            Ok(()) => LibraryScanStatus::Completed,
            Err(Interrupt::Cancelled(reason)) => {
                info!(target: "scan::orchestrator", library_id = %library_id, %reason, "library scan cancelled");
                run.warnings.push(ScanWarning::library(format!("scan cancelled: {reason}")));
                LibraryScanStatus::Cancelled
            }
            Err(Interrupt::Failed(err)) => {
                error!(target: "scan::orchestrator", library_id = %library_id, error = %err, "library scan failed");
                run.warnings.push(ScanWarning::library(err.to_string()));
                LibraryScanStatus::Failed
            }
        };

        let result = run.into_result(status);
        self.events.publish(ScanEvent::ScanCompleted {
            library_id,
            summary: result.summary(),
        });
        info!(
            target: "scan::orchestrator",
            library_id = %library_id,
            status = ?result.status,
            files = result.counts.files_scanned,
            warnings = result.warnings.len(),
            elapsed_ms = result.elapsed_ms,
            "library scan finished"
        );
        result
    }

    async fn drive(
        &self,
        context: &RunContext,
        run: &mut LibraryRun,
    ) -> std::result::Result<(), Interrupt> {
        let library_id = run.library.id;
        let cancelled = |stage: &str| Interrupt::Cancelled(format!("before {stage}"));
        if context.cancel.is_cancelled() {
            return Err(cancelled("walking"));
        }

        let walkers = DirectoryWalker::for_library(&run.library, &context.config)?;
        for walker in &walkers {
            walker.ensure_root()?;
        }

        let collected = context
            .pipeline
            .collect(
                library_id,
                run.library.library_type,
                walkers,
                &context.cancel,
                self.events.as_ref(),
            )
            .await?;
        if collected.cancelled {
            return Err(cancelled("reconciliation"));
        }
        run.warnings.extend(collected.warnings);

        let assembly = SeriesAssembler::assemble(library_id, collected.files);
        run.warnings.extend(assembly.warnings);
        let mut excluded = collected.excluded;
        excluded.extend(assembly.excluded);

        let mut engine = ReconciliationEngine::new(library_id, context.config.metadata.clone());
        engine.advance(ReconcileStage::LoadingCatalog)?;
        let persisted = match self.catalog.load_existing_series(library_id).await {
            Ok(persisted) => persisted,
            Err(err) => {
                engine.fail();
                return Err(err.into());
            }
        };
        engine.begin(persisted, assembly.series, excluded)?;

        loop {
            if context.cancel.is_cancelled() {
                return Err(Interrupt::Cancelled(format!(
                    "{} series not reconciled",
                    engine.remaining()
                )));
            }
            let Some(outcome) = engine.next_series() else {
                break;
            };
            self.events.publish(ScanEvent::SeriesProcessed {
                library_id,
                series_name: outcome.name,
                counts: outcome.counts,
            });
        }

        let reconciliation = engine.finish()?;
        run.counts = reconciliation.counts;
        run.warnings.extend(reconciliation.warnings);
        engine.advance(ReconcileStage::Committing)?;

        if self.dry_run {
            info!(
                target: "scan::orchestrator",
                library_id = %library_id,
                operations = reconciliation.diff.operation_count(),
                "dry run; diff not committed"
            );
        } else if !reconciliation.diff.is_empty() {
            let committed = match self.catalog.commit(&reconciliation.diff).await {
                Ok(committed) => committed,
                Err(err) => {
                    engine.fail();
                    return Err(err.into());
                }
            };
            for failure in committed.failed {
                run.warnings.push(ScanWarning::library(format!(
                    "commit: {} not applied: {}",
                    failure.target, failure.reason
                )));
            }
        }

        engine.advance(ReconcileStage::Completed)?;
        Ok(())
    }
}
