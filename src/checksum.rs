//! Staleness detection and checksum refresh.
//!
//! A file is re-hashed when its modification time moved, when its checksum
//! reached the configured age, or when the record never got a checksum.
//! Every refresh queues the file for validation again, even when the new
//! digest equals the old one.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::{CatalogError, CatalogStore, MediaRecord};
use crate::clock::Clock;
use crate::digest::{self, DigestError};
use crate::report::{ProgressEvent, Reporter};

/// Why an existing record gets a new checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// The file's modification time differs from the stored one.
    Modified,
    /// The stored checksum reached the configured age.
    Expired,
    /// The record has no checksum or no checksum timestamp.
    Incomplete,
}

/// Result of processing one discovered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// First sighting; a new record was inserted.
    Created,
    /// The record got a new checksum and is pending validation again.
    Refreshed(RefreshReason),
    /// Nothing changed; the record was left alone.
    Unchanged,
}

/// Failures while refreshing a single file.
#[derive(Debug, Error)]
pub enum ChecksumError {
    #[error(transparent)]
    Digest(#[from] DigestError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Counters for one checksum pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumSummary {
    pub created: usize,
    pub refreshed: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl ChecksumSummary {
    fn record(&mut self, outcome: RefreshOutcome) {
        match outcome {
            RefreshOutcome::Created => self.created += 1,
            RefreshOutcome::Refreshed(_) => self.refreshed += 1,
            RefreshOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Decide what to do with a file given its record and current mtime.
pub fn plan_refresh(
    record: Option<&MediaRecord>,
    modified_ns: i64,
    now: i64,
    ttl: Duration,
) -> RefreshOutcome {
    let Some(record) = record else {
        return RefreshOutcome::Created;
    };
    let Some(checksummed_on) = record.checksummed_on.filter(|_| record.checksum.is_some())
    else {
        return RefreshOutcome::Refreshed(RefreshReason::Incomplete);
    };
    if record.last_modified_on != modified_ns {
        return RefreshOutcome::Refreshed(RefreshReason::Modified);
    }
    let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    if now.saturating_sub(checksummed_on) >= ttl_secs {
        return RefreshOutcome::Refreshed(RefreshReason::Expired);
    }
    RefreshOutcome::Unchanged
}

/// Refresh one file's checksum if it is stale.
pub fn refresh_file(
    store: &CatalogStore,
    filename: &str,
    now: i64,
    ttl: Duration,
) -> Result<RefreshOutcome, ChecksumError> {
    let path = Path::new(filename);
    let modified_ns = digest::modified_ns(path)?;
    let record = store.get(filename)?;
    let outcome = plan_refresh(record.as_ref(), modified_ns, now, ttl);
    if outcome == RefreshOutcome::Unchanged {
        return Ok(outcome);
    }
    let checksum = digest::compute_digest(path)?;
    store.upsert_checksum(filename, &checksum, now, modified_ns)?;
    debug!(file = filename, ?outcome, "Checksum stored");
    Ok(outcome)
}

/// Run the checksum pass over every discovered file.
///
/// Failures are per file: they are logged, counted and the pass moves on.
pub fn refresh_all(
    store: &CatalogStore,
    files: &[String],
    clock: &dyn Clock,
    ttl: Duration,
    reporter: &mut dyn Reporter,
) -> ChecksumSummary {
    let mut summary = ChecksumSummary::default();
    let total = files.len();
    for (index, filename) in files.iter().enumerate() {
        match refresh_file(store, filename, clock.now(), ttl) {
            Ok(outcome) => summary.record(outcome),
            Err(ChecksumError::Digest(err)) => {
                summary.failed += 1;
                warn!(file = %filename, error = %err, "Skipping file; checksum failed");
            }
            Err(ChecksumError::Catalog(err)) => {
                summary.failed += 1;
                warn!(file = %filename, error = %err, "Skipping file; catalog update failed");
            }
        }
        reporter.progress(&ProgressEvent::new("checksum", index + 1, total));
    }
    summary
}
