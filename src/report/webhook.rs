use std::collections::HashMap;

use serde_json::{Value, json};
use tracing::warn;

use super::{ProgressEvent, Reporter};
use crate::http_client::{self, RetryConfig};

/// Posts notifications as JSON to a configured URL.
///
/// Every message carries an `event` field: `status`, `progress`,
/// `invalid_count` or `invalid_files`. Progress is only sent when a stage's
/// whole percent changes.
#[derive(Debug)]
pub struct WebhookReporter {
    url: String,
    retry: RetryConfig,
    last_percent: HashMap<&'static str, u8>,
    failures: usize,
}

impl WebhookReporter {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            retry: RetryConfig::default(),
            last_percent: HashMap::new(),
            failures: 0,
        }
    }

    /// Number of deliveries that failed so far.
    pub fn failures(&self) -> usize {
        self.failures
    }

    #[cfg(test)]
    fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn send(&mut self, body: Value, retry: RetryConfig) {
        if let Err(err) = http_client::post_json(&self.url, &body, retry) {
            self.failures += 1;
            warn!(url = %self.url, error = %err, "Webhook delivery failed");
        }
    }
}

impl Reporter for WebhookReporter {
    fn status(&mut self, status: &str) {
        self.send(json!({ "event": "status", "status": status }), self.retry);
    }

    fn progress(&mut self, event: &ProgressEvent) {
        let percent = event.percent();
        if self.last_percent.get(event.stage) == Some(&percent) {
            return;
        }
        self.last_percent.insert(event.stage, percent);
        // Progress is superseded by the next update, so one attempt is enough.
        let single = RetryConfig {
            max_attempts: 1,
            ..self.retry
        };
        self.send(
            json!({
                "event": "progress",
                "stage": event.stage,
                "index": event.index,
                "total": event.total,
                "percent": percent,
            }),
            single,
        );
    }

    fn invalid_count(&mut self, count: usize) {
        self.send(json!({ "event": "invalid_count", "count": count }), self.retry);
    }

    fn invalid_files(&mut self, files: &[String]) {
        self.send(
            json!({ "event": "invalid_files", "count": files.len(), "files": files }),
            self.retry,
        );
    }
}
