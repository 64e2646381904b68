use crate::error::MatchError;
use crate::models::{CandidateProfile, JobRequirement, QualitativeAssessment};
use crate::services::traits::QualitativeScorer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// (job id, candidate id, fingerprint of both profiles)
type ScoreKey = (String, String, u64);

/// Caching wrapper around a qualitative scorer
///
/// Successful assessments are kept in an in-memory moka cache. The key holds
/// both ids plus a fingerprint of the serialized job and candidate, so editing
/// either profile misses the cache instead of serving a stale score. Failures
/// are never cached: a pair that degraded once gets another chance on the
/// next run.
pub struct CachedScorer<S> {
    inner: S,
    cache: moka::future::Cache<ScoreKey, QualitativeAssessment>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<S: QualitativeScorer> CachedScorer<S> {
    pub fn new(inner: S, max_capacity: u64, ttl: Duration) -> Self {
        let cache = moka::future::CacheBuilder::new(max_capacity)
            .time_to_live(ttl)
            .build();

        Self {
            inner,
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get cache statistics
    pub async fn stats(&self) -> ScoreCacheStats {
        self.cache.run_pending_tasks().await;

        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        ScoreCacheStats {
            entries: self.cache.entry_count(),
            hits,
            misses,
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
        }
    }
}

/// Hash of everything the scorer sees for a pair
fn fingerprint(job: &JobRequirement, candidate: &CandidateProfile) -> Result<u64, serde_json::Error> {
    let mut hasher = DefaultHasher::new();
    serde_json::to_vec(job)?.hash(&mut hasher);
    serde_json::to_vec(candidate)?.hash(&mut hasher);
    Ok(hasher.finish())
}

#[async_trait]
impl<S: QualitativeScorer> QualitativeScorer for CachedScorer<S> {
    async fn score(
        &self,
        job: &JobRequirement,
        candidate: &CandidateProfile,
    ) -> Result<QualitativeAssessment, MatchError> {
        let key = match fingerprint(job, candidate) {
            Ok(digest) => (job.id.clone(), candidate.id.clone(), digest),
            Err(e) => {
                tracing::warn!("Not caching {}/{}: {}", job.id, candidate.id, e);
                return self.inner.score(job, candidate).await;
            }
        };

        if let Some(assessment) = self.cache.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Qualitative cache hit: {}/{}", job.id, candidate.id);
            return Ok(assessment);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let assessment = self.inner.score(job, candidate).await?;
        self.cache.insert(key, assessment.clone()).await;

        Ok(assessment)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreCacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}
