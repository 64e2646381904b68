// Core algorithm exports
pub mod executor;
pub mod filters;
pub mod matcher;
pub mod scoring;

pub use executor::RunExecutor;
pub use filters::{compare_ranked, is_eligible_candidate, rank_pairs};
pub use matcher::{MatchOrchestrator, MatchSettings, RunReport};
pub use scoring::{combine_scores, finalize_pair, score_deterministic, QualitativeOutcome, ScoringParams};
