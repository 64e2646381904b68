// Integration tests for matching runs against in-memory collaborators

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use talent_match::core::{scoring::DEGRADED_MARKER, MatchOrchestrator, MatchSettings, RunExecutor};
use talent_match::error::MatchError;
use talent_match::models::{
    AnchorRef, CandidateProfile, JobRequirement, MatchResult, MatchRun, MatchStatus,
    QualitativeAssessment, SalaryRange, SkillSet,
};
use talent_match::services::{
    DataGateway, InMemoryGateway, InMemoryStore, LocalLease, QualitativeScorer, ResultStore,
    RunLease,
};

/// Returns a fixed score, sleeping first for one chosen candidate
struct SlowScorer {
    score: f64,
    slow_candidate: Option<String>,
    delay: Duration,
}

#[async_trait]
impl QualitativeScorer for SlowScorer {
    async fn score(
        &self,
        _job: &JobRequirement,
        candidate: &CandidateProfile,
    ) -> Result<QualitativeAssessment, MatchError> {
        if self.slow_candidate.as_deref() == Some(candidate.id.as_str()) {
            tokio::time::sleep(self.delay).await;
        }
        Ok(QualitativeAssessment {
            score: self.score,
            rationale: "steady".to_string(),
        })
    }
}

fn fixed_scorer(score: f64) -> SlowScorer {
    SlowScorer {
        score,
        slow_candidate: None,
        delay: Duration::ZERO,
    }
}

/// Result store whose batch writes always fail
struct FailingStore {
    inner: InMemoryStore,
    attempts: AtomicUsize,
}

#[async_trait]
impl ResultStore for FailingStore {
    async fn upsert_match_results(
        &self,
        _anchor: &AnchorRef,
        _results: &[MatchResult],
        _overwrite: bool,
    ) -> Result<usize, MatchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MatchError::Persistence("connection reset".to_string()))
    }

    async fn set_status(&self, anchor: &AnchorRef, status: MatchStatus) -> Result<(), MatchError> {
        self.inner.set_status(anchor, status).await
    }

    async fn status(&self, anchor: &AnchorRef) -> Result<Option<MatchStatus>, MatchError> {
        self.inner.status(anchor).await
    }
}

/// Tracks how many score calls overlap at any moment
#[derive(Default)]
struct PeakScorer {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl QualitativeScorer for PeakScorer {
    async fn score(
        &self,
        _job: &JobRequirement,
        _candidate: &CandidateProfile,
    ) -> Result<QualitativeAssessment, MatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(20)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(QualitativeAssessment {
            score: 0.5,
            rationale: String::new(),
        })
    }
}

/// Gateway whose candidate listing is unreachable
struct UnreachableCandidates {
    inner: InMemoryGateway,
    list_calls: AtomicUsize,
}

#[async_trait]
impl DataGateway for UnreachableCandidates {
    async fn get_job(&self, id: &str) -> Result<JobRequirement, MatchError> {
        self.inner.get_job(id).await
    }

    async fn get_candidate(&self, id: &str) -> Result<CandidateProfile, MatchError> {
        self.inner.get_candidate(id).await
    }

    async fn list_active_candidates(&self) -> Result<Vec<CandidateProfile>, MatchError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Err(MatchError::Gateway("connection refused".to_string()))
    }

    async fn list_open_jobs(&self) -> Result<Vec<JobRequirement>, MatchError> {
        self.inner.list_open_jobs().await
    }
}

fn create_job(id: &str, skills: &[&str]) -> JobRequirement {
    JobRequirement {
        id: id.to_string(),
        required_skills: skills.iter().collect::<SkillSet>(),
        experience_years: 5.0,
        location: "Remote".to_string(),
        remote: true,
        salary_range: Some(SalaryRange {
            min: 80_000.0,
            max: Some(100_000.0),
            currency: "USD".to_string(),
        }),
        job_type: "full-time".to_string(),
    }
}

fn create_candidate(id: &str, skills: &[&str]) -> CandidateProfile {
    CandidateProfile {
        id: id.to_string(),
        skills: skills.iter().collect::<SkillSet>(),
        total_experience_years: 5.0,
        current_location: "Lisbon".to_string(),
        desired_locations: vec![],
        desired_salary: Some(90_000.0),
        is_active: true,
    }
}

fn create_gateway() -> InMemoryGateway {
    InMemoryGateway::new(
        vec![create_job("job-1", &["python", "sql"])],
        vec![
            create_candidate("c-a", &["python", "sql", "aws"]),
            create_candidate("c-b", &["python"]),
            create_candidate("c-c", &["java"]),
            create_candidate("c-d", &["sql", "python"]),
        ],
    )
}

fn create_orchestrator(
    gateway: InMemoryGateway,
    scorer: SlowScorer,
    store: Arc<dyn ResultStore>,
    settings: MatchSettings,
) -> MatchOrchestrator {
    MatchOrchestrator::new(
        Arc::new(gateway),
        Arc::new(scorer),
        store,
        Arc::new(LocalLease::new()),
        Arc::new(RunExecutor::new(2)),
        settings,
    )
}

#[tokio::test]
async fn test_job_run_ranks_and_persists() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = create_orchestrator(
        create_gateway(),
        fixed_scorer(0.8),
        store.clone(),
        MatchSettings::default(),
    );

    let report = orchestrator
        .execute(MatchRun::new(AnchorRef::job("job-1"), false))
        .await;

    assert_eq!(report.run.status, MatchStatus::Finished);
    assert_eq!(report.evaluated, 4);
    assert_eq!(report.gated, 1);

    // c-a and c-d tie at 0.94, broken by candidate id; c-b follows at 0.765
    let ids: Vec<&str> = report.ranked.iter().map(|p| p.candidate_id.as_str()).collect();
    assert_eq!(ids, vec!["c-a", "c-d", "c-b"]);
    assert!((report.ranked[2].final_score - (0.7 * 0.75 + 0.3 * 0.8)).abs() < 1e-9);

    let stored = store.results_for(&AnchorRef::job("job-1"));
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|r| !r.reasons.is_empty() && !r.degraded));
    assert_eq!(
        store.status(&AnchorRef::job("job-1")).await.unwrap(),
        Some(MatchStatus::Finished)
    );
}

#[tokio::test]
async fn test_timed_out_pair_degrades_alone() {
    let store = Arc::new(InMemoryStore::new());
    let settings = MatchSettings {
        qualitative_timeout: Duration::from_millis(50),
        ..MatchSettings::default()
    };
    let scorer = SlowScorer {
        score: 0.8,
        slow_candidate: Some("c-b".to_string()),
        delay: Duration::from_secs(5),
    };
    let orchestrator = create_orchestrator(create_gateway(), scorer, store.clone(), settings);

    let report = orchestrator
        .execute(MatchRun::new(AnchorRef::job("job-1"), false))
        .await;

    assert_eq!(report.run.status, MatchStatus::Finished);
    assert_eq!(report.degraded, 1);

    let slow = report.ranked.iter().find(|p| p.candidate_id == "c-b").unwrap();
    assert_eq!(slow.final_score, slow.deterministic);
    assert!((slow.final_score - 0.75).abs() < 1e-9);
    assert!(slow.reasons.iter().any(|r| r.starts_with(DEGRADED_MARKER)));

    let fast = report.ranked.iter().find(|p| p.candidate_id == "c-a").unwrap();
    assert!(fast.qualitative_ok);
    assert!((fast.final_score - 0.94).abs() < 1e-9);

    let stored = store.results_for(&AnchorRef::job("job-1"));
    assert!(stored.iter().any(|r| r.candidate_id == "c-b" && r.degraded));
}

#[tokio::test]
async fn test_rerun_without_overwrite_is_noop() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = create_orchestrator(
        create_gateway(),
        fixed_scorer(0.8),
        store.clone(),
        MatchSettings::default(),
    );
    let anchor = AnchorRef::job("job-1");

    let first = orchestrator.execute(MatchRun::new(anchor.clone(), false)).await;
    let before = store.results_for(&anchor);

    let second = orchestrator.execute(MatchRun::new(anchor.clone(), false)).await;
    let after = store.results_for(&anchor);

    assert_eq!(first.inserted, 3);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.run.status, MatchStatus::Finished);
    assert_eq!(before, after);
    assert_eq!(store.status(&anchor).await.unwrap(), Some(MatchStatus::Finished));
}

#[tokio::test]
async fn test_overwrite_replaces_prior_results() {
    let gateway = create_gateway();
    let store = Arc::new(InMemoryStore::new());
    let anchor = AnchorRef::job("job-1");

    let first = create_orchestrator(gateway, fixed_scorer(0.8), store.clone(), MatchSettings::default());
    first.execute(MatchRun::new(anchor.clone(), false)).await;

    // Same data, but only the single best pair survives now
    let settings = MatchSettings {
        max_results: 1,
        ..MatchSettings::default()
    };
    let second = create_orchestrator(create_gateway(), fixed_scorer(0.8), store.clone(), settings);
    let report = second.execute(MatchRun::new(anchor.clone(), true)).await;

    assert_eq!(report.inserted, 1);
    let stored = store.results_for(&anchor);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].candidate_id, "c-a");
}

#[tokio::test]
async fn test_runs_are_deterministic() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = create_orchestrator(
        create_gateway(),
        fixed_scorer(0.6),
        store.clone(),
        MatchSettings::default(),
    );

    let a = orchestrator
        .execute(MatchRun::new(AnchorRef::job("job-1"), true))
        .await;
    let b = orchestrator
        .execute(MatchRun::new(AnchorRef::job("job-1"), true))
        .await;

    let summary = |ranked: &[talent_match::models::PairScore]| {
        ranked
            .iter()
            .map(|p| (p.candidate_id.clone(), p.final_score, p.reasons.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(summary(&a.ranked[..]), summary(&b.ranked[..]));
}

#[tokio::test]
async fn test_output_respects_max_results() {
    let candidates: Vec<CandidateProfile> = (0..25)
        .map(|i| create_candidate(&format!("c-{:02}", i), &["python", "sql"]))
        .collect();
    let gateway = InMemoryGateway::new(vec![create_job("job-1", &["python", "sql"])], candidates);
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = create_orchestrator(gateway, fixed_scorer(0.8), store, MatchSettings::default());

    let report = orchestrator
        .execute(MatchRun::new(AnchorRef::job("job-1"), false))
        .await;

    assert_eq!(report.evaluated, 25);
    assert_eq!(report.ranked.len(), 10);
    assert_eq!(report.ranked[0].candidate_id, "c-00");
    assert_eq!(report.ranked[9].candidate_id, "c-09");
}

#[tokio::test]
async fn test_persistence_failure_marks_run_failed() {
    let store = Arc::new(FailingStore {
        inner: InMemoryStore::new(),
        attempts: AtomicUsize::new(0),
    });
    let settings = MatchSettings {
        persist_attempts: 3,
        persist_backoff: Duration::from_millis(1),
        ..MatchSettings::default()
    };
    let orchestrator = create_orchestrator(create_gateway(), fixed_scorer(0.8), store.clone(), settings);

    let report = orchestrator
        .execute(MatchRun::new(AnchorRef::job("job-1"), false))
        .await;

    assert_eq!(report.run.status, MatchStatus::Failed);
    assert_eq!(report.inserted, 0);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    assert!(store.inner.is_empty());
    assert_eq!(
        store.status(&AnchorRef::job("job-1")).await.unwrap(),
        Some(MatchStatus::Failed)
    );
}

#[tokio::test]
async fn test_missing_candidate_anchor_fails() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = create_orchestrator(
        create_gateway(),
        fixed_scorer(0.8),
        store.clone(),
        MatchSettings::default(),
    );

    let report = orchestrator
        .execute(MatchRun::new(AnchorRef::candidate("ghost"), false))
        .await;

    assert_eq!(report.run.status, MatchStatus::Failed);
    assert!(report.run.error.as_deref().unwrap_or_default().contains("not found"));
    assert_eq!(
        store.status(&AnchorRef::candidate("ghost")).await.unwrap(),
        Some(MatchStatus::Failed)
    );
}

#[tokio::test]
async fn test_candidate_anchor_ranks_open_jobs() {
    let gateway = InMemoryGateway::new(
        vec![
            create_job("job-b", &["python"]),
            create_job("job-a", &["python"]),
            create_job("job-c", &["python"]),
            create_job("job-z", &["haskell"]),
        ],
        vec![create_candidate("c-1", &["python"])],
    );
    gateway.close_job("job-c");
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = create_orchestrator(gateway, fixed_scorer(0.8), store.clone(), MatchSettings::default());

    let report = orchestrator
        .execute(MatchRun::new(AnchorRef::candidate("c-1"), false))
        .await;

    assert_eq!(report.run.status, MatchStatus::Finished);
    assert_eq!(report.evaluated, 3);
    let ids: Vec<&str> = report.ranked.iter().map(|p| p.job_id.as_str()).collect();
    assert_eq!(ids, vec!["job-a", "job-b"]);
    assert_eq!(store.results_for(&AnchorRef::candidate("c-1")).len(), 2);
}

#[tokio::test]
async fn test_trigger_runs_in_background() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = create_orchestrator(
        create_gateway(),
        fixed_scorer(0.8),
        store.clone(),
        MatchSettings::default(),
    );

    let run = orchestrator.run_job_match("job-1", false).await.unwrap();
    assert_eq!(run.status, MatchStatus::Pending);
    assert_eq!(run.anchor, AnchorRef::job("job-1"));

    orchestrator.wait_idle().await;

    assert_eq!(store.results_for(&AnchorRef::job("job-1")).len(), 3);
    assert_eq!(
        store.status(&AnchorRef::job("job-1")).await.unwrap(),
        Some(MatchStatus::Finished)
    );

    // The lease is released once the run completes
    assert!(orchestrator.run_job_match("job-1", true).await.is_ok());
    orchestrator.wait_idle().await;
}

#[tokio::test]
async fn test_busy_anchor_is_rejected() {
    let lease = Arc::new(LocalLease::new());
    lease.acquire(&AnchorRef::job("job-1"), "another-run").await.unwrap();

    let orchestrator = MatchOrchestrator::new(
        Arc::new(create_gateway()),
        Arc::new(fixed_scorer(0.8)),
        Arc::new(InMemoryStore::new()),
        lease.clone(),
        Arc::new(RunExecutor::new(2)),
        MatchSettings::default(),
    );

    let err = orchestrator.run_job_match("job-1", false).await.unwrap_err();
    assert!(matches!(err, MatchError::AnchorBusy(_)));

    // Other anchors are unaffected
    assert!(orchestrator.run_candidate_match("c-a", false).await.is_ok());
    orchestrator.wait_idle().await;
}

#[tokio::test]
async fn test_qualitative_disabled_skips_scorer() {
    let store = Arc::new(InMemoryStore::new());
    let settings = MatchSettings {
        qualitative_enabled: false,
        ..MatchSettings::default()
    };
    let orchestrator = create_orchestrator(create_gateway(), fixed_scorer(0.0), store, settings);

    let report = orchestrator
        .execute(MatchRun::new(AnchorRef::job("job-1"), false))
        .await;

    assert_eq!(report.degraded, 3);
    assert!((report.ranked[0].final_score - 1.0).abs() < 1e-9);
    assert!(report.ranked.iter().all(|p| p.qualitative.is_none()));
}

#[tokio::test]
async fn test_queued_run_reports_pending() {
    let store = Arc::new(InMemoryStore::new());
    let gateway = InMemoryGateway::new(
        vec![
            create_job("job-1", &["python"]),
            create_job("job-2", &["python"]),
        ],
        vec![create_candidate("c-a", &["python"])],
    );
    let scorer = SlowScorer {
        score: 0.8,
        slow_candidate: Some("c-a".to_string()),
        delay: Duration::from_millis(200),
    };
    let orchestrator = MatchOrchestrator::new(
        Arc::new(gateway),
        Arc::new(scorer),
        store.clone(),
        Arc::new(LocalLease::new()),
        Arc::new(RunExecutor::new(1)),
        MatchSettings::default(),
    );

    // job-2 carries the outcome of an earlier run
    store
        .set_status(&AnchorRef::job("job-2"), MatchStatus::Finished)
        .await
        .unwrap();

    orchestrator.run_job_match("job-1", false).await.unwrap();
    orchestrator.run_job_match("job-2", true).await.unwrap();

    // job-2 waits behind job-1 on the single run slot
    assert_eq!(
        store.status(&AnchorRef::job("job-2")).await.unwrap(),
        Some(MatchStatus::Pending)
    );

    orchestrator.wait_idle().await;

    assert_eq!(
        store.status(&AnchorRef::job("job-2")).await.unwrap(),
        Some(MatchStatus::Finished)
    );
    assert_eq!(store.results_for(&AnchorRef::job("job-2")).len(), 1);
}

#[tokio::test]
async fn test_fanout_concurrency_bounds_scorer_calls() {
    let candidates: Vec<CandidateProfile> = (0..10)
        .map(|i| create_candidate(&format!("c-{:02}", i), &["python", "sql"]))
        .collect();
    let gateway = InMemoryGateway::new(vec![create_job("job-1", &["python", "sql"])], candidates);
    let scorer = Arc::new(PeakScorer::default());
    let settings = MatchSettings {
        fanout_concurrency: 2,
        ..MatchSettings::default()
    };
    let orchestrator = MatchOrchestrator::new(
        Arc::new(gateway),
        scorer.clone(),
        Arc::new(InMemoryStore::new()),
        Arc::new(LocalLease::new()),
        Arc::new(RunExecutor::new(1)),
        settings,
    );

    let report = orchestrator
        .execute(MatchRun::new(AnchorRef::job("job-1"), false))
        .await;

    assert_eq!(report.run.status, MatchStatus::Finished);
    assert_eq!(scorer.calls.load(Ordering::SeqCst), 10);
    assert!(scorer.peak.load(Ordering::SeqCst) <= 2);
    assert!(scorer.peak.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_gateway_failure_fails_run() {
    let store = Arc::new(InMemoryStore::new());
    let gateway = Arc::new(UnreachableCandidates {
        inner: create_gateway(),
        list_calls: AtomicUsize::new(0),
    });
    let orchestrator = MatchOrchestrator::new(
        gateway.clone(),
        Arc::new(fixed_scorer(0.8)),
        store.clone(),
        Arc::new(LocalLease::new()),
        Arc::new(RunExecutor::new(1)),
        MatchSettings::default(),
    );

    let report = orchestrator
        .execute(MatchRun::new(AnchorRef::job("job-1"), false))
        .await;

    assert_eq!(report.run.status, MatchStatus::Failed);
    assert_eq!(gateway.list_calls.load(Ordering::SeqCst), 1);
    assert!(report.ranked.is_empty());
    assert_eq!(
        store.status(&AnchorRef::job("job-1")).await.unwrap(),
        Some(MatchStatus::Failed)
    );
    assert!(store.results_for(&AnchorRef::job("job-1")).is_empty());
}
