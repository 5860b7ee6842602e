//! Aggregation of per-file outcomes into the result of a run

use crate::copy::CopyOutcome;
use crate::error::{Error, FileError, Result};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub bytes_copied: u64,
    pub files_copied: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
}

impl Summary {
    #[must_use]
    pub fn of(outcome: &CopyOutcome) -> Self {
        match outcome {
            CopyOutcome::Success { bytes, .. } => Self {
                bytes_copied: *bytes,
                files_copied: 1,
                ..Default::default()
            },
            CopyOutcome::Skipped { .. } => Self {
                files_skipped: 1,
                ..Default::default()
            },
            CopyOutcome::Failed { .. } => Self {
                files_failed: 1,
                ..Default::default()
            },
        }
    }
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            bytes_copied: self.bytes_copied + other.bytes_copied,
            files_copied: self.files_copied + other.files_copied,
            files_skipped: self.files_skipped + other.files_skipped,
            files_failed: self.files_failed + other.files_failed,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "bytes copied: {}\n\
            files copied: {}\n\
            files skipped: {}\n\
            files failed: {}\n",
            bytesize::ByteSize(self.bytes_copied),
            self.files_copied,
            self.files_skipped,
            self.files_failed,
        )
    }
}

/// Every outcome of a run, in completion order.
#[derive(Debug, Default)]
pub struct Report {
    outcomes: Vec<CopyOutcome>,
}

impl Report {
    #[must_use]
    pub fn new(outcomes: Vec<CopyOutcome>) -> Self {
        Self { outcomes }
    }
    #[must_use]
    pub fn outcomes(&self) -> &[CopyOutcome] {
        &self.outcomes
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
    #[must_use]
    pub fn summary(&self) -> Summary {
        self.outcomes
            .iter()
            .map(Summary::of)
            .fold(Summary::default(), |acc, s| acc + s)
    }
    pub fn failures(&self) -> impl Iterator<Item = &FileError> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            CopyOutcome::Failed { error, .. } => Some(error),
            _ => None,
        })
    }
    /// A run succeeds when every file was either copied or skipped.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
    /// Turn the report into the run's result, failures sorted by path.
    pub fn into_result(self) -> Result<Summary> {
        let summary = self.summary();
        if self.is_success() {
            return Ok(summary);
        }
        let mut failures: Vec<FileError> = self.failures().cloned().collect();
        failures.sort_by(|a, b| a.path.cmp(&b.path));
        Err(Error::PartialFailure { failures, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::SkipReason;
    use crate::plan::CopyTask;

    fn task(name: &str) -> CopyTask {
        CopyTask {
            source: std::path::PathBuf::from("/src").join(name),
            destination: std::path::PathBuf::from("/dst").join(name),
        }
    }

    fn failed(name: &str) -> CopyOutcome {
        let task = task(name);
        let error = FileError::new(
            &task.source,
            &std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        CopyOutcome::Failed { task, error }
    }

    #[test]
    fn skips_count_as_success() {
        let report = Report::new(vec![
            CopyOutcome::Success {
                task: task("a"),
                bytes: 10,
            },
            CopyOutcome::Skipped {
                task: task("b"),
                reason: SkipReason::AlreadyExists,
            },
        ]);
        assert!(report.is_success());
        let summary = report.into_result().unwrap();
        assert_eq!(
            summary,
            Summary {
                bytes_copied: 10,
                files_copied: 1,
                files_skipped: 1,
                files_failed: 0,
            }
        );
    }

    #[test]
    fn failures_become_partial_failure() {
        let report = Report::new(vec![
            failed("z"),
            CopyOutcome::Success {
                task: task("a"),
                bytes: 1,
            },
            failed("m"),
        ]);
        assert_eq!(report.len(), 3);
        assert!(!report.is_success());
        match report.into_result() {
            Err(Error::PartialFailure { failures, summary }) => {
                let paths: Vec<_> = failures.iter().map(|f| f.path.clone()).collect();
                assert_eq!(
                    paths,
                    vec![
                        std::path::PathBuf::from("/src/m"),
                        std::path::PathBuf::from("/src/z")
                    ]
                );
                assert_eq!(summary.files_failed, 2);
                assert_eq!(summary.files_copied, 1);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn summary_display() {
        let summary = Summary {
            bytes_copied: 2048,
            files_copied: 2,
            files_skipped: 1,
            files_failed: 0,
        };
        let text = summary.to_string();
        assert!(text.contains("files copied: 2"));
        assert!(text.contains("files skipped: 1"));
        assert!(text.contains("files failed: 0"));
    }
}
