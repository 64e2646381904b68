use crate::error::MatchError;
use crate::models::{
    AnchorKind, AnchorRef, CandidateProfile, JobRequirement, MatchResult, MatchStatus,
};
use crate::services::traits::{DataGateway, ResultStore};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fixture file layout accepted by [`InMemoryGateway::from_json_file`]
#[derive(Debug, Default, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub jobs: Vec<JobRequirement>,
    #[serde(default)]
    pub candidates: Vec<CandidateProfile>,
}

/// Process-local data gateway, used when no database is configured and in tests
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    jobs: RwLock<BTreeMap<String, (JobRequirement, bool)>>,
    candidates: RwLock<BTreeMap<String, CandidateProfile>>,
}

impl InMemoryGateway {
    /// Create a gateway where every given job is open
    pub fn new(jobs: Vec<JobRequirement>, candidates: Vec<CandidateProfile>) -> Self {
        let gateway = Self::default();
        for job in jobs {
            gateway.upsert_job(job);
        }
        for candidate in candidates {
            gateway.upsert_candidate(candidate);
        }
        gateway
    }

    /// Load jobs and candidates from a JSON fixture file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, MatchError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            MatchError::Config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        let fixtures: Fixtures = serde_json::from_str(&raw)
            .map_err(|e| MatchError::Config(format!("invalid fixture file: {}", e)))?;

        Ok(Self::new(fixtures.jobs, fixtures.candidates))
    }

    pub fn upsert_job(&self, job: JobRequirement) {
        write(&self.jobs).insert(job.id.clone(), (job, true));
    }

    /// Keep the job retrievable by id but drop it from the open set
    pub fn close_job(&self, id: &str) {
        if let Some(entry) = write(&self.jobs).get_mut(id) {
            entry.1 = false;
        }
    }

    pub fn upsert_candidate(&self, candidate: CandidateProfile) {
        write(&self.candidates).insert(candidate.id.clone(), candidate);
    }
}

#[async_trait]
impl DataGateway for InMemoryGateway {
    async fn get_job(&self, id: &str) -> Result<JobRequirement, MatchError> {
        read(&self.jobs)
            .get(id)
            .map(|(job, _)| job.clone())
            .ok_or_else(|| MatchError::NotFound(AnchorRef::job(id)))
    }

    async fn get_candidate(&self, id: &str) -> Result<CandidateProfile, MatchError> {
        read(&self.candidates)
            .get(id)
            .cloned()
            .ok_or_else(|| MatchError::NotFound(AnchorRef::candidate(id)))
    }

    async fn list_active_candidates(&self) -> Result<Vec<CandidateProfile>, MatchError> {
        Ok(read(&self.candidates)
            .values()
            .filter(|candidate| candidate.is_active)
            .cloned()
            .collect())
    }

    async fn list_open_jobs(&self) -> Result<Vec<JobRequirement>, MatchError> {
        Ok(read(&self.jobs)
            .values()
            .filter(|(_, open)| *open)
            .map(|(job, _)| job.clone())
            .collect())
    }
}

/// Process-local result store keyed by (job id, candidate id)
#[derive(Debug, Default)]
pub struct InMemoryStore {
    results: RwLock<BTreeMap<(String, String), MatchResult>>,
    statuses: RwLock<HashMap<AnchorRef, MatchStatus>>,
}

fn belongs_to(result: &MatchResult, anchor: &AnchorRef) -> bool {
    match anchor.kind {
        AnchorKind::Job => result.job_id == anchor.id,
        AnchorKind::Candidate => result.candidate_id == anchor.id,
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored results of an anchor, best score first
    pub fn results_for(&self, anchor: &AnchorRef) -> Vec<MatchResult> {
        let mut results: Vec<MatchResult> = read(&self.results)
            .values()
            .filter(|result| belongs_to(result, anchor))
            .cloned()
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.job_id.cmp(&b.job_id))
                .then_with(|| a.candidate_id.cmp(&b.candidate_id))
        });
        results
    }

    pub fn len(&self) -> usize {
        read(&self.results).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.results).is_empty()
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    async fn upsert_match_results(
        &self,
        anchor: &AnchorRef,
        results: &[MatchResult],
        overwrite: bool,
    ) -> Result<usize, MatchError> {
        let mut stored = write(&self.results);

        if overwrite {
            stored.retain(|_, result| !belongs_to(result, anchor));
        }

        let mut inserted = 0;
        for result in results {
            let key = (result.job_id.clone(), result.candidate_id.clone());
            if stored.contains_key(&key) {
                continue;
            }
            stored.insert(key, result.clone());
            inserted += 1;
        }

        Ok(inserted)
    }

    async fn set_status(&self, anchor: &AnchorRef, status: MatchStatus) -> Result<(), MatchError> {
        write(&self.statuses).insert(anchor.clone(), status);
        Ok(())
    }

    async fn status(&self, anchor: &AnchorRef) -> Result<Option<MatchStatus>, MatchError> {
        Ok(read(&self.statuses).get(anchor).copied())
    }
}
