use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::path::PathBuf;
use which::which;

use crate::errors::{BackupError, Result};

/// Fixed-width `YYYY-MM-DD_HH-MM-SS` (UTC); sorts lexicographically and is safe in paths and keys.
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Identifies one run. Generated once at start and reused for the workspace and the remote prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RunTimestamp(String);

impl RunTimestamp {
    /// Current UTC time. Wall-clock local time repeats an hour when DST ends.
    pub fn now() -> Self {
        Self::at(&Utc::now())
    }

    pub fn at<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        RunTimestamp(instant.format(RUN_TIMESTAMP_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Finds the database client executable in the system PATH (or validates an explicit path).
pub fn find_client_executable(client: &str) -> Result<PathBuf> {
    which(client).map_err(|e| BackupError::Config(format!(
        "{} executable not found in PATH ({}). Please ensure PostgreSQL client tools are installed and in your PATH.",
        client, e
    )))
}
