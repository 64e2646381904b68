use crate::error::MatchError;
use crate::models::AnchorRef;
use crate::services::traits::RunLease;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while taking or releasing a lease
#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),
}

impl From<LeaseError> for MatchError {
    fn from(value: LeaseError) -> Self {
        MatchError::Persistence(value.to_string())
    }
}

// Deletes the key only while it still holds the caller's token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Redis-backed lease, shared by every service instance
///
/// The key expires after `ttl` so a crashed instance cannot hold an anchor
/// forever.
pub struct RedisLease {
    redis: Arc<tokio::sync::Mutex<ConnectionManager>>,
    release: redis::Script,
    ttl: Duration,
}

impl RedisLease {
    pub async fn new(redis_url: &str, ttl: Duration) -> Result<Self, LeaseError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;

        Ok(Self {
            redis: Arc::new(tokio::sync::Mutex::new(redis)),
            release: redis::Script::new(RELEASE_SCRIPT),
            ttl,
        })
    }

    /// Build the Redis key guarding an anchor
    pub fn key(anchor: &AnchorRef) -> String {
        format!("match-lease:{}:{}", anchor.kind, anchor.id)
    }
}

#[async_trait]
impl RunLease for RedisLease {
    async fn acquire(&self, anchor: &AnchorRef, token: &str) -> Result<bool, MatchError> {
        let key = Self::key(anchor);

        let mut conn = self.redis.lock().await;
        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(self.ttl.as_millis() as u64)
            .query_async(&mut *conn)
            .await
            .map_err(LeaseError::from)?;
        drop(conn);

        let acquired = reply.is_some();
        tracing::trace!("Lease {} acquired: {}", key, acquired);
        Ok(acquired)
    }

    async fn release(&self, anchor: &AnchorRef, token: &str) -> Result<(), MatchError> {
        let key = Self::key(anchor);

        let mut conn = self.redis.lock().await;
        let removed: i64 = self
            .release
            .key(&key)
            .arg(token)
            .invoke_async(&mut *conn)
            .await
            .map_err(LeaseError::from)?;

        if removed == 0 {
            tracing::debug!("Lease {} was no longer held by {}", key, token);
        }
        Ok(())
    }
}

/// Process-local lease for single-instance deployments and tests
#[derive(Debug, Default)]
pub struct LocalLease {
    held: Mutex<HashMap<AnchorRef, String>>,
}

impl LocalLease {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, anchor: &AnchorRef) -> bool {
        self.lock().contains_key(anchor)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<AnchorRef, String>> {
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RunLease for LocalLease {
    async fn acquire(&self, anchor: &AnchorRef, token: &str) -> Result<bool, MatchError> {
        let mut held = self.lock();
        if held.contains_key(anchor) {
            return Ok(false);
        }
        held.insert(anchor.clone(), token.to_string());
        Ok(true)
    }

    async fn release(&self, anchor: &AnchorRef, token: &str) -> Result<(), MatchError> {
        let mut held = self.lock();
        if held.get(anchor).map(String::as_str) == Some(token) {
            held.remove(anchor);
        }
        Ok(())
    }
}
