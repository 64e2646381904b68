use crate::models::AnchorRef;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while triggering or executing a matching run
///
/// Only `Validation` and `AnchorBusy` ever reach a trigger caller; everything
/// else surfaces through the anchor's terminal status or, for qualitative
/// scorer failures, as a reason string on the affected result.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(AnchorRef),

    #[error("Qualitative scorer timed out after {}ms", .0.as_millis())]
    UpstreamTimeout(Duration),

    #[error("Qualitative scorer failed: {0}")]
    Upstream(String),

    #[error("Data gateway error: {0}")]
    Gateway(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("A matching run is already in progress for {0}")]
    AnchorBusy(AnchorRef),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Matching service is shutting down")]
    ShuttingDown,
}

impl MatchError {
    /// Whether a run that hit this error should be retried at the persistence layer
    pub fn is_retryable(&self) -> bool {
        matches!(self, MatchError::Persistence(_))
    }
}

impl From<validator::ValidationErrors> for MatchError {
    fn from(value: validator::ValidationErrors) -> Self {
        MatchError::Validation(value.to_string())
    }
}
