use thiserror::Error;

use crate::database::models::TargetId;

/// Errors surfaced to callers of the monitoring core.
///
/// Network-level probe failures never show up here: they are recorded as
/// `down` results instead.
#[derive(Debug, Error)]
pub enum WatchdogError {
    #[error("Unsupported check type: {0}")]
    UnsupportedCheckType(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Target {0} not found")]
    TargetNotFound(TargetId),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

pub type Result<T, E = WatchdogError> = std::result::Result<T, E>;
