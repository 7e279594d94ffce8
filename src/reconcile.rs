//! Drop catalog records whose files are gone.

use std::path::Path;

use tracing::{info, warn};

use crate::catalog::{CatalogError, CatalogStore};
use crate::report::{ProgressEvent, Reporter};

/// Counters for one reconcile pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub removed: usize,
    pub failed: usize,
}

/// Delete the record of every tracked file that no longer exists.
///
/// A delete that fails or does not take effect is logged, counted and
/// skipped. Running this twice in a row removes nothing the second time.
pub fn remove_missing(
    store: &CatalogStore,
    reporter: &mut dyn Reporter,
) -> Result<ReconcileSummary, CatalogError> {
    let filenames = store.filenames()?;
    let total = filenames.len();
    let mut summary = ReconcileSummary::default();
    for (index, filename) in filenames.iter().enumerate() {
        if !Path::new(filename).exists() {
            match store.delete(filename) {
                Ok(_) => {
                    summary.removed += 1;
                    info!(file = %filename, "Removed record of missing file");
                }
                Err(err) => {
                    summary.failed += 1;
                    warn!(file = %filename, error = %err, "Failed to remove record");
                }
            }
        }
        reporter.progress(&ProgressEvent::new("reconcile", index + 1, total));
    }
    Ok(summary)
}
