//! In-process registry of job definitions plus their limiter/semaphore
//! slots, keyed by job name.

use crate::limiter::TokenBucket;
use crate::semaphore::JobSlot;
use cron_kernel::error::CronError;
use cron_kernel::job::JobDefinition;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Everything the dispatcher needs about a registered job beyond the
/// definition itself: its concurrency slot and, if configured, its limiter.
pub struct RegisteredJob {
    pub definition: JobDefinition,
    pub slot: JobSlot,
    pub limiter: Option<TokenBucket>,
}

/// Job registry, mirroring a plain `RwLock<HashMap<...>>` — registration and
/// lookups are rare relative to dispatch-loop reads, so a reader-writer lock
/// outperforms per-entry synchronization here.
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, RegisteredJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, definition: JobDefinition, now_ms: u64) -> Result<(), CronError> {
        definition.validate()?;
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&definition.name) {
            return Err(CronError::duplicate(&definition.name));
        }
        let slot = JobSlot::new(definition.concurrency);
        let limiter = definition.rate_limit.map(|rl| TokenBucket::new(rl, now_ms));
        jobs.insert(
            definition.name.clone(),
            RegisteredJob {
                definition,
                slot,
                limiter,
            },
        );
        Ok(())
    }

    /// Remove a job, failing `E_STATE` unless the caller has already
    /// confirmed it has no active runs (the dispatcher checks this, since
    /// "active runs" is dispatcher-owned state the registry does not see)
    /// or passed `force`.
    pub async fn unregister(&self, name: &str, force: bool, has_active_runs: bool) -> Result<(), CronError> {
        if has_active_runs && !force {
            return Err(CronError::state(format!(
                "job '{name}' has active runs; pass force=true to unregister anyway"
            )));
        }
        let mut jobs = self.jobs.write().await;
        jobs.remove(name).ok_or_else(|| CronError::not_found(name))?;
        Ok(())
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.jobs.read().await.contains_key(name)
    }

    pub async fn with_job<T>(&self, name: &str, f: impl FnOnce(&RegisteredJob) -> T) -> Option<T> {
        self.jobs.read().await.get(name).map(f)
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
