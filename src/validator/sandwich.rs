use std::path::Path;

use super::ValidateError;
use super::command::ValidateCommand;
use crate::digest;

/// Result of validating a file between two digests.
#[derive(Debug)]
pub enum SandwichOutcome {
    /// Content was stable across the run; carries the validator output.
    Confirmed { output: String },
    /// Content changed while the validator was running.
    Changed { before: String, after: String },
    Error(ValidateError),
}

/// Digest, validate, digest again.
///
/// A verdict is only trustworthy when both digests agree.
pub fn validate_between_digests(filename: &str, command: &ValidateCommand) -> SandwichOutcome {
    let path = Path::new(filename);
    let before = match digest::compute_digest(path) {
        Ok(digest) => digest,
        Err(err) => return SandwichOutcome::Error(err.into()),
    };
    let output = match command.run(filename) {
        Ok(output) => output,
        Err(err) => return SandwichOutcome::Error(err),
    };
    let after = match digest::compute_digest(path) {
        Ok(digest) => digest,
        Err(err) => return SandwichOutcome::Error(err.into()),
    };
    if before != after {
        return SandwichOutcome::Changed { before, after };
    }
    SandwichOutcome::Confirmed { output }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn stable_file_is_confirmed_with_output() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.mkv");
        fs::write(&file, b"frames").unwrap();
        let command = ValidateCommand::new("echo 'Invalid data found' 1>&2; : {filename}", None);
        match validate_between_digests(file.to_str().unwrap(), &command) {
            SandwichOutcome::Confirmed { output } => assert_eq!(output, "Invalid data found"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn modification_during_validation_is_detected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.mkv");
        fs::write(&file, b"frames").unwrap();
        let command = ValidateCommand::new("echo more >> {filename}", None);
        assert!(matches!(
            validate_between_digests(file.to_str().unwrap(), &command),
            SandwichOutcome::Changed { .. }
        ));
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("missing.mkv");
        let command = ValidateCommand::new("true {filename}", None);
        assert!(matches!(
            validate_between_digests(file.to_str().unwrap(), &command),
            SandwichOutcome::Error(ValidateError::Digest(_))
        ));
    }
}
