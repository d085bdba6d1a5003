//! Error taxonomy for the pipeline.
//!
//! Three failure classes with different blast radii: remote-access failures
//! can abort the whole run, malformed daily files are skipped, and a series
//! too short to fit is simply charted without a trend line.

use thiserror::Error;

/// Failure talking to the data host.
#[derive(Debug, Error)]
pub enum RemoteAccessError {
    #[error("authentication rejected by {host}")]
    AuthFailed { host: String },

    #[error("host unreachable: {host}: {reason}")]
    HostUnreachable { host: String, reason: String },

    /// The host is fine but has no file for this day.
    #[error("no daily file for {date}")]
    FileAbsent { date: String },

    /// Transfer kept failing after retries were exhausted.
    #[error("transfer failed for {date}: {reason}")]
    Transfer { date: String, reason: String },
}

impl RemoteAccessError {
    /// Fatal errors abort the run; the rest skip a single day.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RemoteAccessError::AuthFailed { .. } | RemoteAccessError::HostUnreachable { .. }
        )
    }
}

/// A daily file whose JSON shape does not match the measurement schema.
#[derive(Debug, Error)]
#[error("malformed daily file {day}: {reason}")]
pub struct MalformedDataError {
    pub day: String,
    pub reason: String,
}

impl MalformedDataError {
    pub fn new(day: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { day: day.into(), reason: reason.into() }
    }
}

/// A series with too few points to fit a line through.
#[derive(Debug, Error)]
#[error("need at least 2 points for a trend fit, got {points}")]
pub struct InsufficientDataError {
    pub points: usize,
}
