use crate::error::MatchError;
use crate::models::{
    AnchorKind, AnchorRef, CandidateProfile, JobRequirement, MatchResult, MatchStatus,
    SalaryRange, SkillSet,
};
use crate::services::traits::{DataGateway, ResultStore};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<PostgresError> for MatchError {
    fn from(value: PostgresError) -> Self {
        MatchError::Persistence(value.to_string())
    }
}

fn gateway_error(e: sqlx::Error) -> MatchError {
    MatchError::Gateway(e.to_string())
}

fn store_error(e: sqlx::Error) -> MatchError {
    MatchError::Persistence(e.to_string())
}

const JOB_COLUMNS: &str = r#"
    id, required_skills, experience_years, location, remote,
    salary_min, salary_max, salary_currency, job_type
"#;

const CANDIDATE_COLUMNS: &str = r#"
    id, skills, total_experience_years, current_location,
    desired_locations, desired_salary, is_active
"#;

/// PostgreSQL-backed data gateway and result store
///
/// Jobs and candidates are read from the `jobs` and `candidates` tables;
/// match results live in `match_results`, and each anchor's matching status
/// is the `matching_status` column of its own row.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    fn job_from_row(row: &PgRow) -> Result<JobRequirement, sqlx::Error> {
        let salary_min: Option<f64> = row.try_get("salary_min")?;
        let salary_max: Option<f64> = row.try_get("salary_max")?;
        let currency: Option<String> = row.try_get("salary_currency")?;

        let salary_range = match (salary_min, salary_max) {
            (None, None) => None,
            (min, max) => Some(SalaryRange {
                min: min.unwrap_or(0.0),
                max,
                currency: currency.unwrap_or_else(|| "USD".to_string()),
            }),
        };

        let skills: Vec<String> = row.try_get("required_skills")?;

        Ok(JobRequirement {
            id: row.try_get("id")?,
            required_skills: SkillSet::from(skills),
            experience_years: row.try_get::<Option<f64>, _>("experience_years")?.unwrap_or(0.0),
            location: row.try_get::<Option<String>, _>("location")?.unwrap_or_default(),
            remote: row.try_get("remote")?,
            salary_range,
            job_type: row.try_get("job_type")?,
        })
    }

    fn candidate_from_row(row: &PgRow) -> Result<CandidateProfile, sqlx::Error> {
        let skills: Vec<String> = row.try_get("skills")?;

        Ok(CandidateProfile {
            id: row.try_get("id")?,
            skills: SkillSet::from(skills),
            total_experience_years: row
                .try_get::<Option<f64>, _>("total_experience_years")?
                .unwrap_or(0.0),
            current_location: row
                .try_get::<Option<String>, _>("current_location")?
                .unwrap_or_default(),
            desired_locations: row.try_get("desired_locations")?,
            desired_salary: row.try_get("desired_salary")?,
            is_active: row.try_get("is_active")?,
        })
    }

    fn anchor_table(kind: AnchorKind) -> &'static str {
        match kind {
            AnchorKind::Job => "jobs",
            AnchorKind::Candidate => "candidates",
        }
    }

    fn anchor_column(kind: AnchorKind) -> &'static str {
        match kind {
            AnchorKind::Job => "job_id",
            AnchorKind::Candidate => "candidate_id",
        }
    }
}

#[async_trait]
impl DataGateway for PostgresClient {
    async fn get_job(&self, id: &str) -> Result<JobRequirement, MatchError> {
        let query = format!("SELECT {} FROM jobs WHERE id = $1", JOB_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(gateway_error)?
            .ok_or_else(|| MatchError::NotFound(AnchorRef::job(id)))?;

        Self::job_from_row(&row).map_err(gateway_error)
    }

    async fn get_candidate(&self, id: &str) -> Result<CandidateProfile, MatchError> {
        let query = format!("SELECT {} FROM candidates WHERE id = $1", CANDIDATE_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(gateway_error)?
            .ok_or_else(|| MatchError::NotFound(AnchorRef::candidate(id)))?;

        Self::candidate_from_row(&row).map_err(gateway_error)
    }

    async fn list_active_candidates(&self) -> Result<Vec<CandidateProfile>, MatchError> {
        let query = format!(
            "SELECT {} FROM candidates WHERE is_active ORDER BY id",
            CANDIDATE_COLUMNS
        );

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(gateway_error)?;

        tracing::debug!("Loaded {} active candidates", rows.len());

        rows.iter()
            .map(Self::candidate_from_row)
            .collect::<Result<_, _>>()
            .map_err(gateway_error)
    }

    async fn list_open_jobs(&self) -> Result<Vec<JobRequirement>, MatchError> {
        let query = format!("SELECT {} FROM jobs WHERE is_open ORDER BY id", JOB_COLUMNS);

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(gateway_error)?;

        tracing::debug!("Loaded {} open jobs", rows.len());

        rows.iter()
            .map(Self::job_from_row)
            .collect::<Result<_, _>>()
            .map_err(gateway_error)
    }
}

#[async_trait]
impl ResultStore for PostgresClient {
    /// Writes the whole batch in one transaction.
    ///
    /// Uses ON CONFLICT DO NOTHING so pairs that already have a result are
    /// skipped when not overwriting.
    async fn upsert_match_results(
        &self,
        anchor: &AnchorRef,
        results: &[MatchResult],
        overwrite: bool,
    ) -> Result<usize, MatchError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        if overwrite {
            let delete = format!(
                "DELETE FROM match_results WHERE {} = $1",
                Self::anchor_column(anchor.kind)
            );
            let removed = sqlx::query(&delete)
                .bind(&anchor.id)
                .execute(&mut *tx)
                .await
                .map_err(store_error)?;

            tracing::debug!("Removed {} prior results for {}", removed.rows_affected(), anchor);
        }

        let insert = r#"
            INSERT INTO match_results
                (job_id, candidate_id, score, reasons, degraded, origin, created_at)
            VALUES ($1, $2, $3, $4, $5, 'internal', $6)
            ON CONFLICT (job_id, candidate_id) DO NOTHING
        "#;

        let mut inserted = 0usize;
        for result in results {
            let outcome = sqlx::query(insert)
                .bind(&result.job_id)
                .bind(&result.candidate_id)
                .bind(result.score)
                .bind(&result.reasons)
                .bind(result.degraded)
                .bind(result.created_at)
                .execute(&mut *tx)
                .await
                .map_err(store_error)?;
            inserted += outcome.rows_affected() as usize;
        }

        tx.commit().await.map_err(store_error)?;

        tracing::debug!("Inserted {} match results for {}", inserted, anchor);

        Ok(inserted)
    }

    async fn set_status(&self, anchor: &AnchorRef, status: MatchStatus) -> Result<(), MatchError> {
        let query = format!(
            "UPDATE {} SET matching_status = $2, matching_status_updated_at = NOW() WHERE id = $1",
            Self::anchor_table(anchor.kind)
        );

        let result = sqlx::query(&query)
            .bind(&anchor.id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        if result.rows_affected() == 0 {
            tracing::debug!("No row to carry status {} for {}", status, anchor);
        }

        Ok(())
    }

    async fn status(&self, anchor: &AnchorRef) -> Result<Option<MatchStatus>, MatchError> {
        let query = format!(
            "SELECT matching_status FROM {} WHERE id = $1",
            Self::anchor_table(anchor.kind)
        );

        let row = sqlx::query(&query)
            .bind(&anchor.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: Option<String> = row.try_get("matching_status").map_err(store_error)?;
        raw.map(|s| {
            s.parse::<MatchStatus>()
                .map_err(|e| PostgresError::InvalidData(e).into())
        })
        .transpose()
    }

    /// Health check for the database connection
    async fn health_check(&self) -> Result<bool, MatchError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(store_error)
    }
}
