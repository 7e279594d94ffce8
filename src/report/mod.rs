//! Reporting boundary for run status, progress and invalid files.
//!
//! Reporters are notified synchronously from the pipeline. Delivery problems
//! are the reporter's own business and never fail a run.

mod html;
mod log;
mod webhook;

pub use html::HtmlReportWriter;
pub use log::LogReporter;
pub use webhook::WebhookReporter;

/// One step of progress within a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Stage name, e.g. `checksum`.
    pub stage: &'static str,
    /// 1-based position of the item just handled.
    pub index: usize,
    /// Items in the stage; zero for an empty stage.
    pub total: usize,
}

impl ProgressEvent {
    /// Event for item `index` of `total` in `stage`.
    pub fn new(stage: &'static str, index: usize, total: usize) -> Self {
        Self {
            stage,
            index,
            total,
        }
    }

    /// Whole percent done, clamped to 0..=100. An empty stage is complete.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let index = self.index.min(self.total);
        ((index as u128 * 100) / self.total as u128) as u8
    }
}

/// Receives run notifications.
pub trait Reporter {
    /// Stage status line such as `(2/5) Checksumming files`.
    fn status(&mut self, status: &str);

    /// Item processed within a stage.
    fn progress(&mut self, event: &ProgressEvent);

    /// Current number of invalid files. Sent each time a file turns invalid
    /// and once more with the final tally.
    fn invalid_count(&mut self, count: usize);

    /// Final sorted list of invalid files.
    fn invalid_files(&mut self, files: &[String]);
}

/// Fan-out to several reporters in registration order.
#[derive(Default)]
pub struct Reporters {
    inner: Vec<Box<dyn Reporter>>,
}

impl Reporters {
    /// Fan-out with no reporters yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reporter after the existing ones.
    pub fn push(&mut self, reporter: Box<dyn Reporter>) {
        self.inner.push(reporter);
    }

    /// Number of registered reporters.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Reporter for Reporters {
    fn status(&mut self, status: &str) {
        for reporter in &mut self.inner {
            reporter.status(status);
        }
    }

    fn progress(&mut self, event: &ProgressEvent) {
        for reporter in &mut self.inner {
            reporter.progress(event);
        }
    }

    fn invalid_count(&mut self, count: usize) {
        for reporter in &mut self.inner {
            reporter.invalid_count(count);
        }
    }

    fn invalid_files(&mut self, files: &[String]) {
        for reporter in &mut self.inner {
            reporter.invalid_files(files);
        }
    }
}

/// Reporter that keeps every notification in memory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordingReporter {
    pub statuses: Vec<String>,
    pub progress: Vec<ProgressEvent>,
    pub invalid_counts: Vec<usize>,
    pub invalid_files: Option<Vec<String>>,
}

impl Reporter for RecordingReporter {
    fn status(&mut self, status: &str) {
        self.statuses.push(status.to_string());
    }

    fn progress(&mut self, event: &ProgressEvent) {
        self.progress.push(*event);
    }

    fn invalid_count(&mut self, count: usize) {
        self.invalid_counts.push(count);
    }

    fn invalid_files(&mut self, files: &[String]) {
        self.invalid_files = Some(files.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn percent_rounds_down_and_handles_empty_stage() {
        assert_eq!(ProgressEvent::new("checksum", 1, 3).percent(), 33);
        assert_eq!(ProgressEvent::new("checksum", 3, 3).percent(), 100);
        assert_eq!(ProgressEvent::new("checksum", 0, 0).percent(), 100);
        assert_eq!(ProgressEvent::new("checksum", 9, 3).percent(), 100);
    }

    struct Shared(Arc<Mutex<RecordingReporter>>);

    impl Reporter for Shared {
        fn status(&mut self, status: &str) {
            self.0.lock().unwrap().status(status);
        }
        fn progress(&mut self, event: &ProgressEvent) {
            self.0.lock().unwrap().progress(event);
        }
        fn invalid_count(&mut self, count: usize) {
            self.0.lock().unwrap().invalid_count(count);
        }
        fn invalid_files(&mut self, files: &[String]) {
            self.0.lock().unwrap().invalid_files(files);
        }
    }

    #[test]
    fn fan_out_reaches_every_reporter() {
        let first = Arc::new(Mutex::new(RecordingReporter::default()));
        let second = Arc::new(Mutex::new(RecordingReporter::default()));
        let mut reporters = Reporters::new();
        reporters.push(Box::new(Shared(first.clone())));
        reporters.push(Box::new(Shared(second.clone())));
        assert_eq!(reporters.len(), 2);

        reporters.status("(1/5) Generating list of files");
        reporters.progress(&ProgressEvent::new("validate", 1, 2));
        reporters.invalid_count(1);
        reporters.invalid_files(&["/m/a.mkv".to_string()]);

        for recorder in [first, second] {
            let recorder = recorder.lock().unwrap();
            assert_eq!(recorder.statuses, vec!["(1/5) Generating list of files"]);
            assert_eq!(recorder.progress.len(), 1);
            assert_eq!(recorder.invalid_counts, vec![1]);
            assert_eq!(
                recorder.invalid_files.as_deref(),
                Some(&["/m/a.mkv".to_string()][..])
            );
        }
    }
}
