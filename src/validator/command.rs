use std::io::{self, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use super::ValidateError;
use crate::config::ValidatorSettings;
use crate::config::defaults::FILENAME_PLACEHOLDER;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Templated external validator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateCommand {
    template: String,
    timeout: Option<Duration>,
}

impl ValidateCommand {
    pub fn new(template: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            template: template.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &ValidatorSettings) -> Self {
        Self::new(settings.command.clone(), settings.timeout())
    }

    /// Shell command line for `filename`.
    pub fn render(&self, filename: &str) -> String {
        self.template
            .replace(FILENAME_PLACEHOLDER, &shell_quote(filename))
    }

    /// Run the validator and return its combined, trimmed output.
    ///
    /// The exit status does not decide validity; a silent validator means a
    /// valid file. Only the shell's own "could not run" statuses are errors.
    pub fn run(&self, filename: &str) -> Result<String, ValidateError> {
        let line = self.render(filename);
        debug!(command = %line, "Running validator");
        let mut command = shell_command(&line);
        command.stdin(Stdio::null());
        let (status, stdout, stderr) = match self.timeout {
            None => {
                let output = command.output().map_err(|source| ValidateError::Spawn {
                    command: line.clone(),
                    source,
                })?;
                (output.status, output.stdout, output.stderr)
            }
            Some(timeout) => run_with_timeout(command, &line, timeout)?,
        };
        if let Some(source) = launch_failure(status, &stderr) {
            return Err(ValidateError::Spawn {
                command: line,
                source,
            });
        }
        Ok(combine_output(&stdout, &stderr))
    }
}

/// Trim each stream, join stdout then stderr, and trim the result.
pub fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    format!("{}{}", stdout.trim(), stderr.trim()).trim().to_string()
}

#[cfg(not(windows))]
fn shell_command(line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(line);
    command
}

#[cfg(windows)]
fn shell_command(line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(line);
    command
}

/// Map the shell's exit statuses for an unstartable command to an error.
#[cfg(not(windows))]
fn launch_failure(status: ExitStatus, stderr: &[u8]) -> Option<io::Error> {
    let kind = match status.code() {
        Some(127) => io::ErrorKind::NotFound,
        Some(126) => io::ErrorKind::PermissionDenied,
        _ => return None,
    };
    Some(io::Error::new(kind, combine_output(b"", stderr)))
}

#[cfg(windows)]
fn launch_failure(status: ExitStatus, stderr: &[u8]) -> Option<io::Error> {
    // cmd.exe: "is not recognized as an internal or external command"
    (status.code() == Some(9009))
        .then(|| io::Error::new(io::ErrorKind::NotFound, combine_output(b"", stderr)))
}

/// Quote `value` for the platform shell. Plain words pass through unchanged.
#[cfg(not(windows))]
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "-_.:/%+=,@".contains(ch))
    {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\"'\"'"))
    }
}

#[cfg(windows)]
pub fn shell_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn run_with_timeout(
    mut command: Command,
    line: &str,
    timeout: Duration,
) -> Result<(ExitStatus, Vec<u8>, Vec<u8>), ValidateError> {
    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ValidateError::Spawn {
            command: line.to_string(),
            source,
        })?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                // Readers are left detached; a grandchild may still hold the pipes.
                return Err(ValidateError::Timeout {
                    command: line.to_string(),
                    timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ValidateError::Wait {
                    command: line.to_string(),
                    source,
                });
            }
        }
    };
    Ok((status, join(stdout), join(stderr)))
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    let mut pipe = pipe?;
    Some(thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    }))
}

fn join(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}
