use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to match a job against all active candidates
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MatchJobRequest {
    #[validate(length(min = 1, max = 128), custom(function = "validate_anchor_id"))]
    #[serde(alias = "jobId", rename = "job_id")]
    pub job_id: String,
    #[serde(default)]
    #[serde(alias = "overwrite", rename = "overwrite_existing_matches")]
    pub overwrite_existing_matches: bool,
}

/// Request to match a candidate against all open jobs
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MatchUserRequest {
    #[validate(length(min = 1, max = 128), custom(function = "validate_anchor_id"))]
    #[serde(alias = "userId", rename = "user_id")]
    pub user_id: String,
    #[serde(default)]
    #[serde(alias = "overwrite", rename = "overwrite_existing_matches")]
    pub overwrite_existing_matches: bool,
}

/// Anchor ids must be non-blank and free of whitespace and control characters
pub fn validate_anchor_id(id: &str) -> Result<(), validator::ValidationError> {
    if id.trim().is_empty() || id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(validator::ValidationError::new("malformed_anchor_id"));
    }
    Ok(())
}
