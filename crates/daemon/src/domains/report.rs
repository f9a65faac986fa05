use slog::{error, Logger};

use crate::Error;

/// A unit of work that was skipped, and why
#[derive(Debug, Clone, PartialEq)]
pub struct SyncFailure {
    pub subject: String,
    pub error: Error,
}

/// Outcome of a best-effort pass: what was written and what was skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    pub created: usize,
    pub updated: usize,
    pub failures: Vec<SyncFailure>,
}

impl Tally {
    /// Log the failure and keep going.
    pub fn record_failure(&mut self, logger: &Logger, subject: impl Into<String>, err: Error) {
        let subject = subject.into();
        error!(logger, "{}: {}", subject, err);
        self.failures.push(SyncFailure {
            subject,
            error: err,
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl std::fmt::Display for Tally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} failed",
            self.created,
            self.updated,
            self.failures.len()
        )
    }
}
