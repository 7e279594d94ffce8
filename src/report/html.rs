use std::fs;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{info, warn};

use super::{ProgressEvent, Reporter};

/// Writes the invalid file list as an HTML table.
#[derive(Debug)]
pub struct HtmlReportWriter {
    path: PathBuf,
}

impl HtmlReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, files: &[String]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, render(files, OffsetDateTime::now_utc()))
    }
}

impl Reporter for HtmlReportWriter {
    fn status(&mut self, _status: &str) {}

    fn progress(&mut self, _event: &ProgressEvent) {}

    fn invalid_count(&mut self, _count: usize) {}

    fn invalid_files(&mut self, files: &[String]) {
        match self.write(files) {
            Ok(()) => info!(path = %self.path.display(), count = files.len(), "Wrote invalid file report"),
            Err(err) => warn!(path = %self.path.display(), error = %err, "Failed to write invalid file report"),
        }
    }
}

/// Render the report document.
pub(crate) fn render(files: &[String], generated_at: OffsetDateTime) -> String {
    let stamp = generated_at
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second] UTC"
        ))
        .unwrap_or_default();
    let mut out = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Invalid media files</title>\n</head>\n<body>\n",
    );
    out.push_str(&format!(
        "<p>{} invalid file(s) as of {stamp}.</p>\n",
        files.len()
    ));
    out.push_str("<table border=\"1\">\n<tr><th>File</th></tr>\n");
    for file in files {
        out.push_str(&format!("<tr><td>{}</td></tr>\n", escape(file)));
    }
    out.push_str("</table>\n</body>\n</html>\n");
    out
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn escape_handles_markup_characters() {
        assert_eq!(
            escape("/m/Tom & Jerry <1>\"x\"'.mkv"),
            "/m/Tom &amp; Jerry &lt;1&gt;&quot;x&quot;&#39;.mkv"
        );
    }

    #[test]
    fn render_lists_each_file_once() {
        let html = render(
            &["/m/a.mkv".to_string(), "/m/b&c.mkv".to_string()],
            OffsetDateTime::UNIX_EPOCH,
        );
        assert!(html.contains("2 invalid file(s) as of 1970-01-01 00:00:00 UTC."));
        assert!(html.contains("<tr><td>/m/a.mkv</td></tr>"));
        assert!(html.contains("<tr><td>/m/b&amp;c.mkv</td></tr>"));
    }

    #[test]
    fn writer_creates_report_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports").join("invalid.html");
        let mut writer = HtmlReportWriter::new(&path);
        writer.invalid_files(&["/m/a.mkv".to_string()]);
        let html = fs::read_to_string(writer.path()).unwrap();
        assert!(html.contains("/m/a.mkv"));
    }
}
