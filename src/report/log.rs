use tracing::{debug, info, warn};

use super::{ProgressEvent, Reporter};

/// Reports through `tracing`; always installed.
#[derive(Debug, Default)]
pub struct LogReporter {
    last_percent: Option<(&'static str, u8)>,
}

impl LogReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for LogReporter {
    fn status(&mut self, status: &str) {
        info!("{status}");
    }

    fn progress(&mut self, event: &ProgressEvent) {
        let percent = event.percent();
        if self.last_percent == Some((event.stage, percent)) {
            return;
        }
        self.last_percent = Some((event.stage, percent));
        debug!(
            stage = event.stage,
            index = event.index,
            total = event.total,
            percent,
            "Progress"
        );
    }

    fn invalid_count(&mut self, count: usize) {
        info!(count, "Invalid file count changed");
    }

    fn invalid_files(&mut self, files: &[String]) {
        if files.is_empty() {
            info!("No invalid files");
            return;
        }
        warn!(count = files.len(), "Invalid files found");
        for file in files {
            warn!(file = %file, "Invalid");
        }
    }
}
