//! Talent Match - asynchronous job/candidate matching service
//!
//! A matching run is anchored on either a job or a candidate. It scores the
//! anchor against the whole opposite set with a deterministic model (skills,
//! experience, location, salary), blends in an optional qualitative score from
//! an LLM, keeps the best pairs and persists them.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{MatchOrchestrator, MatchSettings, RunExecutor, RunReport};
pub use error::MatchError;
pub use models::{
    AnchorKind, AnchorRef, CandidateProfile, JobRequirement, MatchResult, MatchRun, MatchStatus,
    PairScore,
};
