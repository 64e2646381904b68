// Collaborator contracts consumed by the orchestrator.
//
// Implementations live next to this file (Postgres, OpenAI, Redis, in-memory);
// the orchestrator only ever sees these traits.

use crate::error::MatchError;
use crate::models::{
    AnchorRef, CandidateProfile, JobRequirement, MatchResult, MatchStatus, QualitativeAssessment,
};
use async_trait::async_trait;

/// Read access to jobs and candidates
#[async_trait]
pub trait DataGateway: Send + Sync {
    /// Fetch one job; `MatchError::NotFound` when absent
    async fn get_job(&self, id: &str) -> Result<JobRequirement, MatchError>;

    /// Fetch one candidate; `MatchError::NotFound` when absent
    async fn get_candidate(&self, id: &str) -> Result<CandidateProfile, MatchError>;

    async fn list_active_candidates(&self) -> Result<Vec<CandidateProfile>, MatchError>;

    async fn list_open_jobs(&self) -> Result<Vec<JobRequirement>, MatchError>;
}

/// Bounded qualitative fit score for a pair, with free-text rationale
///
/// Callers enforce the timeout; implementations may block for as long as the
/// upstream takes.
#[async_trait]
pub trait QualitativeScorer: Send + Sync {
    async fn score(
        &self,
        job: &JobRequirement,
        candidate: &CandidateProfile,
    ) -> Result<QualitativeAssessment, MatchError>;
}

/// Durable match results plus the status field of anchor entities
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Write one batch of results for an anchor, all-or-nothing.
    ///
    /// With `overwrite` every prior result of the anchor is replaced; without
    /// it, pairs that already have a result are skipped. Returns the number of
    /// rows inserted.
    async fn upsert_match_results(
        &self,
        anchor: &AnchorRef,
        results: &[MatchResult],
        overwrite: bool,
    ) -> Result<usize, MatchError>;

    async fn set_status(&self, anchor: &AnchorRef, status: MatchStatus) -> Result<(), MatchError>;

    async fn status(&self, anchor: &AnchorRef) -> Result<Option<MatchStatus>, MatchError>;

    /// Liveness of the backing storage
    async fn health_check(&self) -> Result<bool, MatchError> {
        Ok(true)
    }
}

/// Exclusive lease on an anchor for the duration of a run
#[async_trait]
pub trait RunLease: Send + Sync {
    /// Try to take the lease; `false` when another run holds it
    async fn acquire(&self, anchor: &AnchorRef, token: &str) -> Result<bool, MatchError>;

    /// Release the lease if `token` still owns it
    async fn release(&self, anchor: &AnchorRef, token: &str) -> Result<(), MatchError>;
}
