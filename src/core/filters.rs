use crate::models::{AnchorKind, CandidateProfile, PairScore};
use std::cmp::Ordering;

/// Check if a candidate may take part in matching at all
///
/// Inactive candidates are dropped before any scoring happens.
#[inline]
pub fn is_eligible_candidate(candidate: &CandidateProfile) -> bool {
    candidate.is_active && !candidate.id.trim().is_empty()
}

/// Ordering of the emitted list: final score descending, then the
/// counterpart id ascending so equal scores come out in a reproducible order
#[inline]
pub fn compare_ranked(a: &PairScore, b: &PairScore, anchor: AnchorKind) -> Ordering {
    b.final_score
        .partial_cmp(&a.final_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.counterpart_id(anchor).cmp(b.counterpart_id(anchor)))
}

/// Apply the score threshold, rank and truncate the surviving pairs
pub fn rank_pairs(
    pairs: Vec<PairScore>,
    anchor: AnchorKind,
    min_score_threshold: f64,
    max_results: usize,
) -> Vec<PairScore> {
    let mut ranked: Vec<PairScore> = pairs
        .into_iter()
        .filter(|pair| pair.final_score >= min_score_threshold)
        .collect();

    ranked.sort_by(|a, b| compare_ranked(a, b, anchor));
    ranked.truncate(max_results);

    ranked
}
