//! Command-line front end: load settings and a JSON catalog, scan, report.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use folio_config::{ConfigLoader, ScannerConfig};
use folio_core::{InMemoryCatalog, InProcScanEventBus, ScanOrchestrator, SharedSettings};
use folio_model::{LibraryId, LibraryScanStatus, ScanEvent, ScanSummary};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "folio-scan", version, about = "Scan comic, manga and book libraries")]
struct Args {
    /// Scanner settings (TOML or JSON). Falls back to $FOLIO_SCAN_CONFIG_PATH,
    /// $FOLIO_SCAN_CONFIG_JSON and ./folio.toml.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Catalog snapshot to reconcile against and update.
    #[arg(long, value_name = "FILE", default_value = "folio-catalog.json")]
    catalog: PathBuf,

    /// Library to scan, by id or name. Repeatable; defaults to all enabled
    /// libraries.
    #[arg(short, long = "library", value_name = "LIBRARY")]
    libraries: Vec<String>,

    /// Compute the diff without touching the catalog.
    #[arg(long)]
    dry_run: bool,

    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio_core=info,config=info,scan=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::new().with_path(path),
        None => ConfigLoader::new(),
    };
    let loaded = loader.load().context("failed to load scanner settings")?;
    let selected = resolve_libraries(&loaded.config, &args.libraries)?;
    let event_capacity = loaded.config.event_capacity;

    let catalog = Arc::new(
        InMemoryCatalog::load_json(&args.catalog)
            .with_context(|| format!("failed to read catalog {}", args.catalog.display()))?,
    );
    let bus = Arc::new(InProcScanEventBus::new(event_capacity));
    let mut receiver = bus.subscribe();
    let progress = tokio::spawn(async move {
        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(target: "scan", skipped, "progress events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match event {
                ScanEvent::SeriesProcessed {
                    series_name, counts, ..
                } => debug!(
                    target: "scan",
                    series = %series_name,
                    files = counts.files,
                    "series processed"
                ),
                ScanEvent::FileError { path, reason, .. } => {
                    warn!(target: "scan", path = %path.display(), %reason, "file skipped")
                }
                _ => {}
            }
        }
    });

    let orchestrator = Arc::new(
        ScanOrchestrator::new(
            Arc::new(SharedSettings::new(loaded.config)),
            catalog.clone(),
            bus.clone(),
        )
        .with_dry_run(args.dry_run),
    );

    let ctrl_c = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(target: "scan", "interrupt received, cancelling");
                orchestrator.cancel();
            }
        })
    };

    let summary = match selected {
        Some(ids) => orchestrator.scan_libraries(&ids).await?,
        None => orchestrator.scan_all().await,
    };
    ctrl_c.abort();
    progress.abort();

    if !args.dry_run {
        catalog
            .save_json(&args.catalog)
            .with_context(|| format!("failed to write catalog {}", args.catalog.display()))?;
        info!(target: "scan", path = %args.catalog.display(), "catalog saved");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if summary
        .libraries
        .iter()
        .any(|library| library.status == LibraryScanStatus::Failed)
    {
        std::process::exit(2);
    }
    Ok(())
}

/// Map `--library` values to ids. `None` means every enabled library.
fn resolve_libraries(
    config: &ScannerConfig,
    requested: &[String],
) -> anyhow::Result<Option<Vec<LibraryId>>> {
    if requested.is_empty() {
        return Ok(None);
    }
    let mut ids = Vec::with_capacity(requested.len());
    for value in requested {
        let found = value
            .parse::<LibraryId>()
            .ok()
            .and_then(|id| config.library(id))
            .or_else(|| {
                config
                    .libraries
                    .iter()
                    .find(|library| library.name.eq_ignore_ascii_case(value))
            });
        match found {
            Some(library) => ids.push(library.id),
            None => bail!("no library matches '{value}'"),
        }
    }
    Ok(Some(ids))
}

fn print_summary(summary: &ScanSummary) {
    for library in &summary.libraries {
        let counts = &library.counts;
        println!(
            "{} [{:?}] files {} (new {}, updated {}, unchanged {}, removed {}) series +{} ~{} -{} warnings {} in {} ms",
            library.library_name,
            library.status,
            counts.files_scanned,
            counts.files_created,
            counts.files_updated,
            counts.files_unchanged,
            counts.files_removed,
            counts.series_created,
            counts.series_updated,
            counts.series_removed,
            library.warnings.len(),
            library.elapsed_ms,
        );
        for warning in &library.warnings {
            match &warning.path {
                Some(path) => println!("  warning: {}: {}", path.display(), warning.reason),
                None => match &warning.series {
                    Some(series) => println!("  warning: {series}: {}", warning.reason),
                    None => println!("  warning: {}", warning.reason),
                },
            }
        }
    }
    if summary.cancelled {
        println!("scan cancelled");
    }
}
