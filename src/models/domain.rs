use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Case-normalized, deduplicated set of skill names
///
/// Skills are trimmed and lowercased on the way in, so set operations
/// between a job and a candidate never depend on how either side spelled them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SkillSet(BTreeSet<String>);

impl SkillSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Skills present in both sets, in lexical order
    pub fn intersection<'a>(&'a self, other: &'a SkillSet) -> impl Iterator<Item = &'a String> + 'a {
        self.0.intersection(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

fn normalize_skill(skill: &str) -> String {
    skill.trim().to_lowercase()
}

impl<S: AsRef<str>> FromIterator<S> for SkillSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|s| normalize_skill(s.as_ref()))
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

impl From<Vec<String>> for SkillSet {
    fn from(value: Vec<String>) -> Self {
        value.into_iter().collect()
    }
}

impl From<SkillSet> for Vec<String> {
    fn from(value: SkillSet) -> Self {
        value.0.into_iter().collect()
    }
}

/// Salary band offered by a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    #[serde(default)]
    pub min: f64,
    /// Open-ended when absent
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Immutable view of an open job, as supplied by the data gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequirement {
    pub id: String,
    #[serde(rename = "requiredSkills", default)]
    pub required_skills: SkillSet,
    #[serde(rename = "experienceYears", default)]
    pub experience_years: f64,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub remote: bool,
    #[serde(rename = "salaryRange", default)]
    pub salary_range: Option<SalaryRange>,
    #[serde(rename = "jobType", default = "default_job_type")]
    pub job_type: String,
}

fn default_job_type() -> String {
    "full-time".to_string()
}

/// Candidate profile, as supplied by the data gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: String,
    #[serde(default)]
    pub skills: SkillSet,
    #[serde(rename = "totalExperienceYears", default)]
    pub total_experience_years: f64,
    #[serde(rename = "currentLocation", default)]
    pub current_location: String,
    #[serde(rename = "desiredLocations", default)]
    pub desired_locations: Vec<String>,
    #[serde(rename = "desiredSalary", default)]
    pub desired_salary: Option<f64>,
    #[serde(rename = "isActive", default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool { true }

/// Fixed weights of the four deterministic components
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub skill: f64,
    pub experience: f64,
    pub location: f64,
    pub salary: f64,
}

impl ScoringWeights {
    pub const STANDARD: ScoringWeights = ScoringWeights {
        skill: 0.50,
        experience: 0.20,
        location: 0.15,
        salary: 0.15,
    };

    pub fn sum(&self) -> f64 {
        self.skill + self.experience + self.location + self.salary
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Deterministic component scores for one pair, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub skill: f64,
    pub experience: f64,
    pub location: f64,
    pub salary: f64,
}

impl ComponentScores {
    pub fn weighted(&self, weights: &ScoringWeights) -> f64 {
        self.skill * weights.skill
            + self.experience * weights.experience
            + self.location * weights.location
            + self.salary * weights.salary
    }
}

/// Outcome of the qualitative scorer for a single pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitativeAssessment {
    pub score: f64,
    pub rationale: String,
}

/// Ephemeral score of one (job, candidate) pair that survived the skill gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairScore {
    #[serde(rename = "candidateId")]
    pub candidate_id: String,
    #[serde(rename = "jobId")]
    pub job_id: String,
    pub components: ComponentScores,
    pub deterministic: f64,
    pub qualitative: Option<f64>,
    #[serde(rename = "finalScore")]
    pub final_score: f64,
    pub reasons: Vec<String>,
    #[serde(rename = "qualitativeOk")]
    pub qualitative_ok: bool,
}

impl PairScore {
    /// Id of the entity on the opposite side of the anchor
    pub fn counterpart_id(&self, anchor: AnchorKind) -> &str {
        match anchor {
            AnchorKind::Job => &self.candidate_id,
            AnchorKind::Candidate => &self.job_id,
        }
    }
}

/// Persisted match between a job and a candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(rename = "candidateId")]
    pub candidate_id: String,
    pub score: f64,
    pub reasons: Vec<String>,
    pub degraded: bool,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl MatchResult {
    pub fn from_pair(pair: PairScore, created_at: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            job_id: pair.job_id,
            candidate_id: pair.candidate_id,
            score: pair.final_score,
            reasons: pair.reasons,
            degraded: !pair.qualitative_ok,
            created_at,
        }
    }
}

/// Which side of the match a run is anchored on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorKind {
    Job,
    Candidate,
}

impl AnchorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorKind::Job => "job",
            AnchorKind::Candidate => "candidate",
        }
    }
}

impl fmt::Display for AnchorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnchorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "job" => Ok(AnchorKind::Job),
            "candidate" | "user" => Ok(AnchorKind::Candidate),
            other => Err(format!("unknown anchor kind: {}", other)),
        }
    }
}

/// Anchor entity named by a trigger call
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnchorRef {
    pub kind: AnchorKind,
    pub id: String,
}

impl AnchorRef {
    pub fn job(id: impl Into<String>) -> Self {
        Self { kind: AnchorKind::Job, id: id.into() }
    }

    pub fn candidate(id: impl Into<String>) -> Self {
        Self { kind: AnchorKind::Candidate, id: id.into() }
    }
}

impl fmt::Display for AnchorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Matching status carried on the anchor entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Processing,
    Finished,
    Failed,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Processing => "processing",
            MatchStatus::Finished => "finished",
            MatchStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MatchStatus::Pending),
            "processing" => Ok(MatchStatus::Processing),
            "finished" => Ok(MatchStatus::Finished),
            "failed" => Ok(MatchStatus::Failed),
            other => Err(format!("unknown match status: {}", other)),
        }
    }
}

/// Transient state of one orchestration invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRun {
    #[serde(rename = "runId")]
    pub run_id: uuid::Uuid,
    pub anchor: AnchorRef,
    pub overwrite: bool,
    pub status: MatchStatus,
    #[serde(rename = "startedAt")]
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub error: Option<String>,
}

impl MatchRun {
    pub fn new(anchor: AnchorRef, overwrite: bool) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4(),
            anchor,
            overwrite,
            status: MatchStatus::Pending,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }
}
