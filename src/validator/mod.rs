//! External validation of pending files.
//!
//! Pending records are processed oldest checksum first. A file is validated
//! between two digests so a verdict is never recorded for content that
//! changed while the validator was reading it.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, CatalogStore};
use crate::clock::Clock;
use crate::digest::DigestError;
use crate::report::{ProgressEvent, Reporter};

mod command;
mod sandwich;

pub use command::{ValidateCommand, combine_output, shell_quote};
pub use sandwich::{SandwichOutcome, validate_between_digests};

/// Per-file validation failures. The record stays pending.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("Failed to start validator `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("Failed to wait for validator `{command}`: {source}")]
    Wait {
        command: String,
        source: std::io::Error,
    },
    #[error("Validator `{command}` exceeded {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error(transparent)]
    Digest(#[from] DigestError),
}

/// Any output at all means the validator found a problem.
pub fn is_valid_output(output: &str) -> bool {
    output.trim().is_empty()
}

/// Counters for one validation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ValidationSummary {
    pub valid: usize,
    pub invalid: usize,
    /// Content changed mid-validation; left pending.
    pub changed: usize,
    /// File vanished before validation; left pending.
    pub missing: usize,
    pub failed: usize,
}

/// Validate every pending record.
///
/// Per-file problems, including a failed catalog update, are logged and
/// counted in `failed`. Only the pending query itself aborts the pass.
pub fn validate_pending(
    store: &CatalogStore,
    command: &ValidateCommand,
    clock: &dyn Clock,
    reporter: &mut dyn Reporter,
) -> Result<ValidationSummary, CatalogError> {
    let pending = store.pending_validation()?;
    let total = pending.len();
    info!(count = total, "Validating pending files");
    let mut summary = ValidationSummary::default();

    for (index, filename) in pending.iter().enumerate() {
        if let Err(err) = validate_one(store, command, clock, reporter, filename, &mut summary) {
            summary.failed += 1;
            warn!(file = %filename, error = %err, "Failed to record validation result");
        }
        reporter.progress(&ProgressEvent::new("validate", index + 1, total));
    }
    Ok(summary)
}

fn validate_one(
    store: &CatalogStore,
    command: &ValidateCommand,
    clock: &dyn Clock,
    reporter: &mut dyn Reporter,
    filename: &str,
    summary: &mut ValidationSummary,
) -> Result<(), CatalogError> {
    if !Path::new(filename).exists() {
        summary.missing += 1;
        debug!(file = filename, "Skipping validation; file no longer exists");
        return Ok(());
    }
    match validate_between_digests(filename, command) {
        SandwichOutcome::Confirmed { output } => {
            let valid = is_valid_output(&output);
            store.set_validity(filename, valid, clock.now())?;
            if valid {
                summary.valid += 1;
            } else {
                summary.invalid += 1;
                warn!(file = filename, output = %output, "File is invalid");
                reporter.invalid_count(store.stats()?.invalid as usize);
            }
        }
        SandwichOutcome::Changed { before, after } => {
            summary.changed += 1;
            warn!(
                file = filename,
                before = %before,
                after = %after,
                "File changed during validation; will retry next run"
            );
        }
        SandwichOutcome::Error(err) => {
            summary.failed += 1;
            warn!(file = filename, error = %err, "Validation failed");
        }
    }
    Ok(())
}
