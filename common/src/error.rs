//! Error taxonomy for a copy run
//!
//! Fatal conditions abort before any file is touched. Per-file I/O problems are not errors
//! at this level: they travel as [`FileError`] values inside [`crate::copy::CopyOutcome`]
//! and only surface here, aggregated, as [`Error::PartialFailure`] once every task ran.

use crate::report::Summary;

/// A single file that could not be copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    pub path: std::path::PathBuf,
    pub kind: std::io::ErrorKind,
    pub message: String,
}

impl FileError {
    #[must_use]
    pub fn new(path: &std::path::Path, error: &std::io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or missing command line operands.
    #[error("{0}")]
    Usage(String),
    /// The patterns resolved to zero files.
    #[error("Cannot copy `{patterns}`: no files found")]
    NoMatch { patterns: String },
    /// A literal (non-glob) source does not exist.
    #[error("Cannot copy `{path}`: the file doesn't exist")]
    SourceNotFound { path: String },
    #[error("invalid glob pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    /// Some files failed to copy, every task was attempted.
    #[error("{}", render_failures(.failures, .summary))]
    PartialFailure {
        failures: Vec<FileError>,
        summary: Summary,
    },
    #[error("{0:#}")]
    Runtime(#[from] anyhow::Error),
}

fn render_failures(failures: &[FileError], summary: &Summary) -> String {
    let attempted = summary.files_copied + summary.files_skipped + summary.files_failed;
    let mut text = format!(
        "Cannot copy {} of {} files:",
        failures.len(),
        attempted
    );
    for failure in failures {
        text.push_str("\n  ");
        text.push_str(&failure.to_string());
    }
    text
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_messages_name_their_subject() {
        let err = Error::SourceNotFound {
            path: "/tmp/nonexistentfile".to_string(),
        };
        assert!(err.to_string().contains("nonexistentfile"));
        let err = Error::NoMatch {
            patterns: "src/*.png".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot copy `src/*.png`: no files found");
    }

    #[test]
    fn partial_failure_lists_every_path() {
        let failures = vec![
            FileError::new(
                std::path::Path::new("/src/a.txt"),
                &std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            ),
            FileError::new(
                std::path::Path::new("/src/b.txt"),
                &std::io::Error::from(std::io::ErrorKind::NotFound),
            ),
        ];
        let summary = Summary {
            files_copied: 3,
            files_failed: 2,
            ..Default::default()
        };
        let err = Error::PartialFailure { failures, summary };
        let text = err.to_string();
        assert!(text.starts_with("Cannot copy 2 of 5 files:"));
        assert!(text.contains("/src/a.txt"));
        assert!(text.contains("/src/b.txt"));
    }
}
