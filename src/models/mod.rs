// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    AnchorKind, AnchorRef, CandidateProfile, ComponentScores, JobRequirement, MatchResult,
    MatchRun, MatchStatus, PairScore, QualitativeAssessment, SalaryRange, ScoringWeights, SkillSet,
};
pub use requests::{MatchJobRequest, MatchUserRequest};
pub use responses::{ErrorResponse, HealthResponse, MatchAccepted, StatusResponse};
