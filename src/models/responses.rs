use serde::{Deserialize, Serialize};
use crate::models::domain::{AnchorKind, MatchStatus};

/// Immediate acknowledgment of a trigger call; results are never returned here
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchAccepted {
    pub status: String,
    pub anchor_id: String,
    pub anchor_kind: AnchorKind,
    pub run_id: uuid::Uuid,
    pub message: String,
}

/// Current matching status of an anchor entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub anchor_id: String,
    pub anchor_kind: AnchorKind,
    pub matching_status: Option<MatchStatus>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
