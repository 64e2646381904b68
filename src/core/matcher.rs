use crate::core::{
    executor::RunExecutor,
    filters::{is_eligible_candidate, rank_pairs},
    scoring::{finalize_pair, score_deterministic, QualitativeOutcome, ScoringParams},
};
use crate::error::MatchError;
use crate::models::{
    requests::validate_anchor_id, AnchorKind, AnchorRef, CandidateProfile, JobRequirement,
    MatchResult, MatchRun, MatchStatus, PairScore,
};
use crate::services::{DataGateway, QualitativeScorer, ResultStore, RunLease};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Orchestrator-level settings resolved once from configuration
#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub params: ScoringParams,
    pub max_results: usize,
    pub fanout_concurrency: usize,
    pub qualitative_timeout: Duration,
    pub qualitative_enabled: bool,
    pub persist_attempts: u32,
    pub persist_backoff: Duration,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            params: ScoringParams::default(),
            max_results: 10,
            fanout_concurrency: 5,
            qualitative_timeout: Duration::from_secs(30),
            qualitative_enabled: true,
            persist_attempts: 3,
            persist_backoff: Duration::from_millis(200),
        }
    }
}

/// Outcome of one executed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: MatchRun,
    /// Ranked, thresholded and truncated pairs handed to the store
    pub ranked: Vec<PairScore>,
    /// Rows the store actually inserted
    pub inserted: usize,
    /// Comparison-set members considered
    pub evaluated: usize,
    /// Pairs excluded by the skill gate
    pub gated: usize,
    /// Pairs scored without the qualitative component
    pub degraded: usize,
}

struct Evaluation {
    ranked: Vec<PairScore>,
    evaluated: usize,
    gated: usize,
    degraded: usize,
}

/// Drives matching runs for a job or a candidate anchor
///
/// # Run stages
/// 1. Mark the anchor "processing"
/// 2. Fetch the anchor and the opposite set
/// 3. Score every pair with bounded concurrency (skill gate, then qualitative overlay)
/// 4. Threshold, rank, truncate
/// 5. Persist the batch and mark the anchor "finished" (or "failed")
#[derive(Clone)]
pub struct MatchOrchestrator {
    gateway: Arc<dyn DataGateway>,
    scorer: Arc<dyn QualitativeScorer>,
    store: Arc<dyn ResultStore>,
    lease: Arc<dyn RunLease>,
    executor: Arc<RunExecutor>,
    settings: Arc<MatchSettings>,
}

impl MatchOrchestrator {
    pub fn new(
        gateway: Arc<dyn DataGateway>,
        scorer: Arc<dyn QualitativeScorer>,
        store: Arc<dyn ResultStore>,
        lease: Arc<dyn RunLease>,
        executor: Arc<RunExecutor>,
        settings: MatchSettings,
    ) -> Self {
        Self {
            gateway,
            scorer,
            store,
            lease,
            executor,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    /// Start matching a job against every active candidate
    ///
    /// Returns as soon as the run is queued; the run itself executes on the
    /// background executor.
    pub async fn run_job_match(&self, job_id: &str, overwrite: bool) -> Result<MatchRun, MatchError> {
        self.trigger(AnchorRef::job(job_id), overwrite).await
    }

    /// Start matching a candidate against every open job
    pub async fn run_candidate_match(
        &self,
        candidate_id: &str,
        overwrite: bool,
    ) -> Result<MatchRun, MatchError> {
        self.trigger(AnchorRef::candidate(candidate_id), overwrite).await
    }

    /// Wait for every queued run to finish
    pub async fn wait_idle(&self) {
        self.executor.drain().await;
    }

    async fn trigger(&self, anchor: AnchorRef, overwrite: bool) -> Result<MatchRun, MatchError> {
        if validate_anchor_id(&anchor.id).is_err() {
            return Err(MatchError::Validation(format!(
                "malformed {} id: {:?}",
                anchor.kind, anchor.id
            )));
        }

        let run = MatchRun::new(anchor, overwrite);
        let token = run.run_id.to_string();

        if !self.lease.acquire(&run.anchor, &token).await? {
            return Err(MatchError::AnchorBusy(run.anchor));
        }

        // Queued runs report pending until a worker picks them up
        if let Err(e) = self.store.set_status(&run.anchor, MatchStatus::Pending).await {
            warn!("Could not mark {} as pending: {}", run.anchor, e);
        }

        let span = info_span!(
            "match_run",
            run_id = %run.run_id,
            anchor_kind = %run.anchor.kind,
            anchor_id = %run.anchor.id
        );
        let this = self.clone();
        let pending = run.clone();

        let submitted = self.executor.submit(
            async move {
                let anchor = pending.anchor.clone();
                this.execute(pending).await;
                if let Err(e) = this.lease.release(&anchor, &token).await {
                    warn!("Failed to release lease for {}: {}", anchor, e);
                }
            }
            .instrument(span),
        );

        if let Err(e) = submitted {
            if let Err(release_err) = self.lease.release(&run.anchor, &run.run_id.to_string()).await {
                warn!("Failed to release lease for {}: {}", run.anchor, release_err);
            }
            return Err(e);
        }

        info!("Accepted matching run {} for {}", run.run_id, run.anchor);
        Ok(run)
    }

    /// Execute a run to completion in the current task
    ///
    /// Never returns an error: every failure is folded into the run's
    /// terminal status, which is also written to the anchor.
    pub async fn execute(&self, mut run: MatchRun) -> RunReport {
        run.started_at = Some(chrono::Utc::now());
        run.status = MatchStatus::Processing;

        info!("Starting matching run for {} (overwrite: {})", run.anchor, run.overwrite);

        if let Err(e) = self
            .with_retry("set status", || self.store.set_status(&run.anchor, MatchStatus::Processing))
            .await
        {
            warn!("Could not mark {} as processing: {}", run.anchor, e);
        }

        let mut report = RunReport {
            run,
            ranked: Vec::new(),
            inserted: 0,
            evaluated: 0,
            gated: 0,
            degraded: 0,
        };

        let outcome = match self.evaluate(&report.run.anchor).await {
            Ok(evaluation) => {
                report.evaluated = evaluation.evaluated;
                report.gated = evaluation.gated;
                report.degraded = evaluation.degraded;
                report.ranked = evaluation.ranked;
                self.persist(&report.run, &report.ranked).await
            }
            Err(e) => Err(e),
        };

        let status = match outcome {
            Ok(inserted) => {
                report.inserted = inserted;
                MatchStatus::Finished
            }
            Err(e) => {
                error!("Matching run for {} failed: {}", report.run.anchor, e);
                report.run.error = Some(e.to_string());
                MatchStatus::Failed
            }
        };

        report.run.status = status;
        report.run.finished_at = Some(chrono::Utc::now());

        if let Err(e) = self
            .with_retry("set status", || self.store.set_status(&report.run.anchor, status))
            .await
        {
            error!("Could not mark {} as {}: {}", report.run.anchor, status, e);
        }

        info!(
            "Matching run for {} {}: evaluated={}, gated={}, degraded={}, ranked={}, inserted={}",
            report.run.anchor,
            status,
            report.evaluated,
            report.gated,
            report.degraded,
            report.ranked.len(),
            report.inserted
        );

        report
    }

    async fn evaluate(&self, anchor: &AnchorRef) -> Result<Evaluation, MatchError> {
        match anchor.kind {
            AnchorKind::Job => {
                let job = self.gateway.get_job(&anchor.id).await?;
                let candidates: Vec<CandidateProfile> = self
                    .gateway
                    .list_active_candidates()
                    .await?
                    .into_iter()
                    .filter(is_eligible_candidate)
                    .collect();

                debug!("Scoring job {} against {} candidates", job.id, candidates.len());

                let pairs = candidates.iter().map(|candidate| (&job, candidate));
                Ok(self.score_all(pairs, candidates.len(), anchor.kind).await)
            }
            AnchorKind::Candidate => {
                let candidate = self.gateway.get_candidate(&anchor.id).await?;
                if !is_eligible_candidate(&candidate) {
                    warn!("Candidate {} is inactive, nothing to match", candidate.id);
                    return Ok(Evaluation {
                        ranked: Vec::new(),
                        evaluated: 0,
                        gated: 0,
                        degraded: 0,
                    });
                }

                let jobs = self.gateway.list_open_jobs().await?;

                debug!("Scoring candidate {} against {} jobs", candidate.id, jobs.len());

                let pairs = jobs.iter().map(|job| (job, &candidate));
                Ok(self.score_all(pairs, jobs.len(), anchor.kind).await)
            }
        }
    }

    async fn score_all<'a, I>(&self, pairs: I, evaluated: usize, anchor: AnchorKind) -> Evaluation
    where
        I: Iterator<Item = (&'a JobRequirement, &'a CandidateProfile)>,
    {
        let futures: Vec<_> = pairs
            .map(|(job, candidate)| self.score_pair(job, candidate))
            .collect();

        let scored: Vec<Option<PairScore>> = stream::iter(futures)
            .buffer_unordered(self.settings.fanout_concurrency.max(1))
            .collect()
            .await;

        let survivors: Vec<PairScore> = scored.into_iter().flatten().collect();
        let gated = evaluated - survivors.len();
        let degraded = survivors.iter().filter(|pair| !pair.qualitative_ok).count();

        let ranked = rank_pairs(
            survivors,
            anchor,
            self.settings.params.min_score_threshold,
            self.settings.max_results,
        );

        Evaluation {
            ranked,
            evaluated,
            gated,
            degraded,
        }
    }

    /// Score a single pair; `None` when the skill gate excludes it
    async fn score_pair(&self, job: &JobRequirement, candidate: &CandidateProfile) -> Option<PairScore> {
        let Some(deterministic) = score_deterministic(job, candidate, &self.settings.params) else {
            debug!("Pair {}/{} excluded by the skill gate", job.id, candidate.id);
            return None;
        };

        let outcome = if self.settings.qualitative_enabled {
            self.qualitative(job, candidate).await
        } else {
            QualitativeOutcome::Skipped
        };

        Some(finalize_pair(&job.id, &candidate.id, deterministic, outcome))
    }

    async fn qualitative(&self, job: &JobRequirement, candidate: &CandidateProfile) -> QualitativeOutcome {
        let timeout = self.settings.qualitative_timeout;

        let error = match tokio::time::timeout(timeout, self.scorer.score(job, candidate)).await {
            Ok(Ok(assessment)) => return QualitativeOutcome::Scored(assessment),
            Ok(Err(e)) => e,
            Err(_) => MatchError::UpstreamTimeout(timeout),
        };

        warn!(
            "Degrading pair {}/{} to deterministic scoring: {}",
            job.id, candidate.id, error
        );
        QualitativeOutcome::Unavailable(error.to_string())
    }

    async fn persist(&self, run: &MatchRun, ranked: &[PairScore]) -> Result<usize, MatchError> {
        let created_at = chrono::Utc::now();
        let results: Vec<MatchResult> = ranked
            .iter()
            .cloned()
            .map(|pair| MatchResult::from_pair(pair, created_at))
            .collect();

        self.with_retry("persist results", || {
            self.store
                .upsert_match_results(&run.anchor, &results, run.overwrite)
        })
        .await
    }

    /// Retry retryable failures with exponential backoff, up to `persist_attempts` tries
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, MatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, MatchError>>,
    {
        let attempts = self.settings.persist_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = self.settings.persist_backoff * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        "{} attempt {}/{} failed, retrying after {}ms: {}",
                        what,
                        attempt,
                        attempts,
                        delay.as_millis(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
