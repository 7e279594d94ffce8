//! One monitoring pass: discover, checksum, validate, reconcile, report.
//!
//! Stages run strictly in order and each consumes the complete result of the
//! previous one. [`run_guarded`] wraps the pass with the execution guard and
//! the catalog connection.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::{CatalogError, CatalogStore};
use crate::checksum::{self, ChecksumSummary};
use crate::clock::Clock;
use crate::config::{ConfigError, MonitorConfig};
use crate::discovery::{self, DiscoveryOptions};
use crate::guard::{ExecutionGuard, GuardError};
use crate::reconcile::{self, ReconcileSummary};
use crate::report::{ProgressEvent, Reporter};
use crate::validator::{self, ValidateCommand, ValidationSummary};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Guard(#[from] GuardError),
    #[error("Catalog {path}: {source}")]
    Open {
        path: PathBuf,
        source: CatalogError,
    },
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: &'static str,
        source: CatalogError,
    },
}

impl MonitorError {
    /// True when another live instance holds the guard.
    pub fn is_already_running(&self) -> bool {
        matches!(self, MonitorError::Guard(GuardError::AlreadyRunning { .. }))
    }
}

/// Fixed sequence of pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discover,
    Checksum,
    Validate,
    Reconcile,
    Report,
}

impl Stage {
    /// Execution order.
    pub const ALL: [Stage; 5] = [
        Stage::Discover,
        Stage::Checksum,
        Stage::Validate,
        Stage::Reconcile,
        Stage::Report,
    ];

    /// Short name used in progress events.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Discover => "discover",
            Stage::Checksum => "checksum",
            Stage::Validate => "validate",
            Stage::Reconcile => "reconcile",
            Stage::Report => "report",
        }
    }

    /// Human readable status label.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Discover => "Generating list of files",
            Stage::Checksum => "Checksumming files",
            Stage::Validate => "Processing files",
            Stage::Reconcile => "Cleaning database",
            Stage::Report => "Writing output",
        }
    }

    /// Status line `"(i/n) label"` for this stage.
    pub fn status_line(self) -> String {
        let position = Stage::ALL
            .iter()
            .position(|stage| *stage == self)
            .map_or(0, |index| index + 1);
        format!("({position}/{}) {}", Stage::ALL.len(), self.label())
    }

    fn execute(self, run: &mut Run<'_>) -> Result<(), CatalogError> {
        match self {
            Stage::Discover => {
                let options = DiscoveryOptions {
                    extensions: &run.config.media.extensions,
                    include_hidden: run.config.media.include_hidden,
                };
                run.discovered = discovery::discover(&run.config.media.locations, &options);
                let count = run.discovered.len();
                run.summary.discovered = count;
                run.reporter
                    .progress(&ProgressEvent::new(self.name(), count, count));
                info!(count, "Discovered media files");
            }
            Stage::Checksum => {
                run.summary.checksum = checksum::refresh_all(
                    run.store,
                    &run.discovered,
                    run.clock,
                    run.config.media.checksum_ttl(),
                    run.reporter,
                );
                info!(summary = ?run.summary.checksum, "Checksum pass finished");
            }
            Stage::Validate => {
                let command = ValidateCommand::from_settings(&run.config.validator);
                run.summary.validation =
                    validator::validate_pending(run.store, &command, run.clock, run.reporter)?;
                info!(summary = ?run.summary.validation, "Validation pass finished");
            }
            Stage::Reconcile => {
                run.summary.reconcile = reconcile::remove_missing(run.store, run.reporter)?;
                info!(summary = ?run.summary.reconcile, "Reconcile pass finished");
            }
            Stage::Report => {
                let invalid = run.store.invalid_filenames()?;
                run.reporter.invalid_count(invalid.len());
                run.reporter.invalid_files(&invalid);
                run.reporter
                    .progress(&ProgressEvent::new(self.name(), invalid.len(), invalid.len()));
                run.summary.invalid_files = invalid;
            }
        }
        Ok(())
    }
}

/// What a run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub checksum: ChecksumSummary,
    pub validation: ValidationSummary,
    pub reconcile: ReconcileSummary,
    /// Sorted invalid files as reported at the end of the run.
    pub invalid_files: Vec<String>,
}

struct Run<'a> {
    store: &'a CatalogStore,
    config: &'a MonitorConfig,
    clock: &'a dyn Clock,
    reporter: &'a mut dyn Reporter,
    discovered: Vec<String>,
    summary: RunSummary,
}

/// Run every stage against an open catalog.
pub fn run_pipeline(
    store: &CatalogStore,
    config: &MonitorConfig,
    clock: &dyn Clock,
    reporter: &mut dyn Reporter,
) -> Result<RunSummary, MonitorError> {
    let mut run = Run {
        store,
        config,
        clock,
        reporter,
        discovered: Vec::new(),
        summary: RunSummary::default(),
    };
    for stage in Stage::ALL {
        run.reporter.status(&stage.status_line());
        stage
            .execute(&mut run)
            .map_err(|source| MonitorError::Stage {
                stage: stage.name(),
                source,
            })?;
    }
    Ok(run.summary)
}

/// Acquire the guard, open the catalog, run the pipeline, release the guard.
///
/// The guard is released on every path once acquired; a failed release is
/// logged and does not change the result.
pub fn run_guarded(
    config: &MonitorConfig,
    clock: &dyn Clock,
    reporter: &mut dyn Reporter,
) -> Result<RunSummary, MonitorError> {
    let guard = ExecutionGuard::acquire(config.lock_path()?)?;
    let result = open_and_run(config, clock, reporter);
    if let Err(err) = guard.release() {
        warn!("Failed to release run lock: {err}");
    }
    if let Ok(summary) = &result {
        info!(
            discovered = summary.discovered,
            invalid = summary.invalid_files.len(),
            "Run finished"
        );
    }
    result
}

fn open_and_run(
    config: &MonitorConfig,
    clock: &dyn Clock,
    reporter: &mut dyn Reporter,
) -> Result<RunSummary, MonitorError> {
    let path = config.database_path()?;
    let store = CatalogStore::open(&path, &config.catalog.table)
        .map_err(|source| MonitorError::Open { path, source })?;
    run_pipeline(&store, config, clock, reporter)
}
