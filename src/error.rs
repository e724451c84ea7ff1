//! Error taxonomy for the schedule pipeline.
//!
//! Every variant here aborts a run. Data-quality problems that only reduce
//! coverage (orphan stop times, unknown services) are counted and logged by
//! the builder instead.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("feed unavailable from '{source_ref}': {reason}")]
    FeedUnavailable { source_ref: String, reason: String },
    #[error("required resource '{0}.txt' not found in feed bundle")]
    MissingResource(String),
    #[error("service '{service_id}' has malformed {field} '{value}' (expected YYYYMMDD)")]
    InvalidDateFormat {
        service_id: String,
        field: &'static str,
        value: String,
    },
    #[error("{resource}.txt line {line}: {reason}")]
    InvalidRow {
        resource: String,
        line: u64,
        reason: String,
    },
    #[error("invalid departure time '{0}' (expected HH:MM:SS)")]
    InvalidTime(String),
    #[error("another run holds the lock at {0}; if no build is running, the file is stale and can be removed")]
    LockHeld(PathBuf),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

impl PipelineError {
    pub fn unavailable(source_ref: &str, reason: impl std::fmt::Display) -> Self {
        PipelineError::FeedUnavailable {
            source_ref: source_ref.to_string(),
            reason: reason.to_string(),
        }
    }
}
