use crate::models::{
    CandidateProfile, ComponentScores, JobRequirement, PairScore, QualitativeAssessment,
    SalaryRange, ScoringWeights,
};

/// Share of the final score taken by the deterministic component when a
/// qualitative score is available
pub const DETERMINISTIC_BLEND: f64 = 0.7;
/// Share of the final score taken by the qualitative component
pub const QUALITATIVE_BLEND: f64 = 0.3;

/// Prefix of the reason recorded when a pair falls back to deterministic-only scoring
pub const DEGRADED_MARKER: &str = "qualitative scoring unavailable";
/// Reason recorded when qualitative scoring is switched off
pub const SKIPPED_MARKER: &str = "qualitative scoring skipped";

/// Tunable parameters of the deterministic model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    pub min_skill_match_ratio: f64,
    pub experience_tolerance_years: f64,
    pub min_score_threshold: f64,
    pub salary_buffer_ratio: f64,
    pub location_matching_enabled: bool,
    pub salary_matching_enabled: bool,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            min_skill_match_ratio: 0.3,
            experience_tolerance_years: 2.0,
            min_score_threshold: 0.5,
            salary_buffer_ratio: 0.10,
            location_matching_enabled: true,
            salary_matching_enabled: true,
        }
    }
}

/// Deterministic half of a pair score, before the qualitative overlay
#[derive(Debug, Clone, PartialEq)]
pub struct DeterministicScore {
    pub components: ComponentScores,
    pub deterministic: f64,
    pub reasons: Vec<String>,
}

/// What the qualitative pass produced for a pair
#[derive(Debug, Clone, PartialEq)]
pub enum QualitativeOutcome {
    Scored(QualitativeAssessment),
    Unavailable(String),
    Skipped,
}

/// Compute the deterministic score for one (job, candidate) pair
///
/// Returns `None` when the skill ratio falls below `min_skill_match_ratio`:
/// the pair is gated out and must not be evaluated any further.
///
/// Scoring formula:
/// deterministic = (
///     skill_score * 0.50 +         # |required ∩ candidate| / |required|
///     experience_score * 0.20 +    # linear falloff within the tolerance
///     location_score * 0.15 +      # remote, current or desired location
///     salary_score * 0.15          # expectation inside the buffered band
/// )
pub fn score_deterministic(
    job: &JobRequirement,
    candidate: &CandidateProfile,
    params: &ScoringParams,
) -> Option<DeterministicScore> {
    let (skill, matched) = skill_score(job, candidate);
    if skill < params.min_skill_match_ratio {
        return None;
    }

    let mut reasons = Vec::with_capacity(5);

    if job.required_skills.is_empty() {
        reasons.push("skills: job states no required skills".to_string());
    } else {
        reasons.push(format!(
            "skills: matched {}/{} required ({})",
            matched.len(),
            job.required_skills.len(),
            matched.join(", ")
        ));
    }

    let experience = experience_score(
        job.experience_years,
        candidate.total_experience_years,
        params.experience_tolerance_years,
    );
    reasons.push(format!(
        "experience: {:.1}y against {:.1}y required",
        candidate.total_experience_years, job.experience_years
    ));

    let location = if params.location_matching_enabled {
        let (score, reason) = location_score(job, candidate);
        reasons.push(reason.to_string());
        score
    } else {
        reasons.push("location: not evaluated".to_string());
        1.0
    };

    let salary = if params.salary_matching_enabled {
        let score = salary_score(
            job.salary_range.as_ref(),
            candidate.desired_salary,
            params.salary_buffer_ratio,
        );
        reasons.push(salary_reason(job.salary_range.as_ref(), candidate.desired_salary, score));
        score
    } else {
        reasons.push("salary: not evaluated".to_string());
        1.0
    };

    let components = ComponentScores {
        skill,
        experience,
        location,
        salary,
    };
    let deterministic = components
        .weighted(&ScoringWeights::STANDARD)
        .clamp(0.0, 1.0);

    Some(DeterministicScore {
        components,
        deterministic,
        reasons,
    })
}

/// Blend the deterministic score with an optional qualitative score
///
/// Without a qualitative score the deterministic score is used unchanged.
#[inline]
pub fn combine_scores(deterministic: f64, qualitative: Option<f64>) -> f64 {
    match qualitative {
        Some(q) => (DETERMINISTIC_BLEND * deterministic + QUALITATIVE_BLEND * q).clamp(0.0, 1.0),
        None => deterministic.clamp(0.0, 1.0),
    }
}

/// Attach the qualitative outcome to a deterministic score, producing the pair score
pub fn finalize_pair(
    job_id: &str,
    candidate_id: &str,
    deterministic: DeterministicScore,
    outcome: QualitativeOutcome,
) -> PairScore {
    let DeterministicScore {
        components,
        deterministic,
        mut reasons,
    } = deterministic;

    let qualitative = match outcome {
        QualitativeOutcome::Scored(assessment) if assessment.score.is_finite() => {
            let score = assessment.score.clamp(0.0, 1.0);
            let rationale = assessment.rationale.trim();
            if rationale.is_empty() {
                reasons.push(format!("qualitative fit {:.2}", score));
            } else {
                reasons.push(format!("qualitative fit {:.2}: {}", score, rationale));
            }
            Some(score)
        }
        QualitativeOutcome::Scored(_) => {
            reasons.push(format!("{}: non-numeric score", DEGRADED_MARKER));
            None
        }
        QualitativeOutcome::Unavailable(cause) => {
            reasons.push(format!("{}: {}", DEGRADED_MARKER, cause));
            None
        }
        QualitativeOutcome::Skipped => {
            reasons.push(SKIPPED_MARKER.to_string());
            None
        }
    };

    PairScore {
        candidate_id: candidate_id.to_string(),
        job_id: job_id.to_string(),
        components,
        deterministic,
        qualitative,
        final_score: combine_scores(deterministic, qualitative),
        reasons,
        qualitative_ok: qualitative.is_some(),
    }
}

/// Ratio of required skills the candidate holds, plus the matched skills
///
/// A job with no stated requirements excludes no one on this axis.
pub fn skill_score<'a>(
    job: &'a JobRequirement,
    candidate: &'a CandidateProfile,
) -> (f64, Vec<&'a str>) {
    if job.required_skills.is_empty() {
        return (1.0, Vec::new());
    }

    let matched: Vec<&str> = job
        .required_skills
        .intersection(&candidate.skills)
        .map(String::as_str)
        .collect();

    (matched.len() as f64 / job.required_skills.len() as f64, matched)
}

/// Experience score (0-1)
/// Falls off linearly with the distance from the required years
#[inline]
pub fn experience_score(required_years: f64, candidate_years: f64, tolerance_years: f64) -> f64 {
    let gap = (required_years - candidate_years).abs();
    if tolerance_years <= 0.0 {
        return if gap == 0.0 { 1.0 } else { 0.0 };
    }

    (1.0 - gap / tolerance_years).clamp(0.0, 1.0)
}

/// Location score (0 or 1) together with the reason for it
pub fn location_score(job: &JobRequirement, candidate: &CandidateProfile) -> (f64, &'static str) {
    if job.remote {
        return (1.0, "location: remote position");
    }

    let wanted = job.location.trim();
    if wanted.is_empty() {
        return (1.0, "location: job states no location");
    }

    if same_place(wanted, &candidate.current_location) {
        return (1.0, "location: candidate is based at the job location");
    }

    if candidate
        .desired_locations
        .iter()
        .any(|place| same_place(wanted, place))
    {
        return (1.0, "location: job location is among the candidate's desired locations");
    }

    (0.0, "location: no overlap with the job location")
}

#[inline]
fn same_place(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Salary score (0 or 1)
/// 1 when the candidate has no expectation, the job states no band, or the
/// expectation lies within the band widened by `buffer_ratio` on both ends
#[inline]
pub fn salary_score(range: Option<&SalaryRange>, desired: Option<f64>, buffer_ratio: f64) -> f64 {
    let (Some(range), Some(desired)) = (range, desired) else {
        return 1.0;
    };

    let lower = range.min * (1.0 - buffer_ratio);
    let upper = range.max.map_or(f64::INFINITY, |max| max * (1.0 + buffer_ratio));

    if desired >= lower && desired <= upper {
        1.0
    } else {
        0.0
    }
}

fn salary_reason(range: Option<&SalaryRange>, desired: Option<f64>, score: f64) -> String {
    match (range, desired) {
        (_, None) => "salary: candidate states no expectation".to_string(),
        (None, Some(_)) => "salary: job states no salary band".to_string(),
        (Some(range), Some(desired)) if score > 0.0 => {
            format!("salary: expectation {:.0} {} fits the offered band", desired, range.currency)
        }
        (Some(range), Some(desired)) => {
            format!("salary: expectation {:.0} {} outside the offered band", desired, range.currency)
        }
    }
}
