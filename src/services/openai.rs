use crate::error::MatchError;
use crate::models::{CandidateProfile, JobRequirement, QualitativeAssessment};
use crate::services::traits::QualitativeScorer;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when interacting with the OpenAI API
#[derive(Debug, Error)]
pub enum OpenAiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Unauthorized: invalid API key")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl From<OpenAiError> for MatchError {
    fn from(value: OpenAiError) -> Self {
        MatchError::Upstream(value.to_string())
    }
}

const SYSTEM_PROMPT: &str = r#"You are an experienced recruiter comparing a candidate profile with a job opening.
Judge the overall fit beyond keyword overlap: seniority, transferable skills, career direction and practical constraints.
Respond with a single JSON object and nothing else:
{
  "overall_match_percentage": <number between 0 and 100>,
  "rationale": "<one or two sentences explaining the score>"
}
If information is missing or unclear, assume it does not match rather than overestimating."#;

/// Qualitative scorer backed by the OpenAI chat completions API
///
/// The model is asked for an `overall_match_percentage` (0-100) which is
/// mapped onto [0, 1].
pub struct OpenAiScorer {
    base_url: String,
    api_key: String,
    model: String,
    request_timeout: Duration,
    client: Client,
}

impl OpenAiScorer {
    /// Create a new scorer
    ///
    /// `request_timeout` bounds the HTTP call itself; the orchestrator applies
    /// its own per-pair timeout on top.
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        request_timeout: Duration,
    ) -> Result<Self, OpenAiError> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            base_url,
            api_key,
            model,
            request_timeout,
            client,
        })
    }

    /// Build the user prompt describing one pair
    pub fn build_prompt(job: &JobRequirement, candidate: &CandidateProfile) -> String {
        let join = |items: Vec<&String>| {
            if items.is_empty() {
                "none stated".to_string()
            } else {
                items.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ")
            }
        };

        let salary = match &job.salary_range {
            Some(range) => match range.max {
                Some(max) => format!("{:.0}-{:.0} {}", range.min, max, range.currency),
                None => format!("from {:.0} {}", range.min, range.currency),
            },
            None => "not stated".to_string(),
        };

        let desired_salary = candidate
            .desired_salary
            .map(|s| format!("{:.0}", s))
            .unwrap_or_else(|| "not stated".to_string());

        format!(
            "Job opening:\n\
             - Type: {}\n\
             - Required skills: {}\n\
             - Required experience: {:.1} years\n\
             - Location: {}{}\n\
             - Salary: {}\n\n\
             Candidate:\n\
             - Skills: {}\n\
             - Total experience: {:.1} years\n\
             - Current location: {}\n\
             - Desired locations: {}\n\
             - Desired salary: {}\n",
            job.job_type,
            join(job.required_skills.iter().collect()),
            job.experience_years,
            if job.location.is_empty() { "not stated" } else { job.location.as_str() },
            if job.remote { " (remote)" } else { "" },
            salary,
            join(candidate.skills.iter().collect()),
            candidate.total_experience_years,
            if candidate.current_location.is_empty() { "not stated" } else { candidate.current_location.as_str() },
            join(candidate.desired_locations.iter().collect()),
            desired_salary,
        )
    }

    /// Extract the assessment from the model's JSON content
    ///
    /// Accepts the percentage as a number or a numeric string.
    pub fn parse_assessment(content: &str) -> Result<QualitativeAssessment, OpenAiError> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| OpenAiError::InvalidResponse(format!("content is not JSON: {}", e)))?;

        let percentage = match value.get("overall_match_percentage") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
            _ => None,
        }
        .filter(|p| p.is_finite())
        .ok_or_else(|| {
            OpenAiError::InvalidResponse("missing or non-numeric overall_match_percentage".into())
        })?;

        let rationale = value
            .get("rationale")
            .and_then(|r| r.as_str())
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok(QualitativeAssessment {
            score: (percentage / 100.0).clamp(0.0, 1.0),
            rationale,
        })
    }

    async fn complete(&self, prompt: String) -> Result<QualitativeAssessment, OpenAiError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let payload = json!({
            "model": self.model,
            "temperature": 0.1,
            "max_tokens": 512,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(OpenAiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
            tracing::debug!("OpenAI call failed: {} - {}", status, body);
            return Err(OpenAiError::ApiError(format!("chat completion failed: {}", status)));
        }

        let json: Value = response.json().await?;

        let content = json
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| OpenAiError::InvalidResponse("Missing message content".into()))?;

        Self::parse_assessment(content)
    }
}

#[async_trait]
impl QualitativeScorer for OpenAiScorer {
    async fn score(
        &self,
        job: &JobRequirement,
        candidate: &CandidateProfile,
    ) -> Result<QualitativeAssessment, MatchError> {
        let assessment = match self.complete(Self::build_prompt(job, candidate)).await {
            Ok(assessment) => assessment,
            Err(OpenAiError::RequestError(e)) if e.is_timeout() => {
                return Err(MatchError::UpstreamTimeout(self.request_timeout));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            "Qualitative score for {}/{}: {:.2}",
            job.id,
            candidate.id,
            assessment.score
        );

        Ok(assessment)
    }
}
