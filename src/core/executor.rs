use crate::error::MatchError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Bounded executor for background matching runs
///
/// Runs are accepted immediately and queue on a semaphore, so at most
/// `max_concurrent_runs` of them execute at once. The executor owns every
/// task it spawns; `drain` and `shutdown` wait for them to reach completion.
pub struct RunExecutor {
    permits: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
    closed: AtomicBool,
}

impl RunExecutor {
    pub fn new(max_concurrent_runs: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
            tasks: Mutex::new(JoinSet::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Queue a run for background execution
    pub fn submit<F>(&self, run: F) -> Result<(), MatchError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(MatchError::ShuttingDown);
        }

        let permits = Arc::clone(&self.permits);
        let mut tasks = self.lock_tasks();

        // Reap runs that already completed so the set does not grow unbounded
        while let Some(finished) = tasks.try_join_next() {
            if let Err(e) = finished {
                tracing::error!("Matching run task ended abnormally: {}", e);
            }
        }

        tasks.spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            run.await;
        });

        Ok(())
    }

    /// Number of runs queued or executing
    pub fn in_flight(&self) -> usize {
        self.lock_tasks().len()
    }

    /// Wait until every submitted run has completed
    pub async fn drain(&self) {
        loop {
            let mut batch = std::mem::take(&mut *self.lock_tasks());
            if batch.is_empty() {
                return;
            }

            while let Some(finished) = batch.join_next().await {
                if let Err(e) = finished {
                    tracing::error!("Matching run task ended abnormally: {}", e);
                }
            }
        }
    }

    /// Stop accepting runs and wait for the in-flight ones
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        tracing::info!("Draining {} in-flight matching runs", self.in_flight());
        self.drain().await;
    }

    fn lock_tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RunExecutor {
    fn default() -> Self {
        Self::new(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_drain_waits_for_all_runs() {
        let executor = RunExecutor::new(2);
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let done = Arc::clone(&done);
            executor
                .submit(async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        executor.drain().await;

        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert_eq!(executor.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let executor = RunExecutor::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..6 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            executor
                .submit(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        executor.drain().await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_rejects_after_shutdown() {
        let executor = RunExecutor::new(1);
        executor.shutdown().await;

        assert!(matches!(
            executor.submit(async {}),
            Err(MatchError::ShuttingDown)
        ));
    }
}
