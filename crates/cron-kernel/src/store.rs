//! The scheduler's contract with persistence.
//!
//! The scheduler owns the job registry, timer heap, limiters, semaphores,
//! and runs; the store owns triggers. The scheduler mutates triggers only
//! through this trait — never by reaching into a concrete store type —
//! which is what lets an external, durable implementation (a database) be
//! swapped in for the in-memory default in `cron-core` without touching
//! dispatch logic.

use crate::error::CronError;
use crate::run::Run;
use crate::trigger::Trigger;
use async_trait::async_trait;
use uuid::Uuid;

/// Persistence contract for triggers and runs.
///
/// External implementations must preserve serialized mutation order: two
/// concurrent `upsert_trigger` calls for the same id must not interleave
/// such that the final stored value is neither of the two inputs.
#[async_trait]
pub trait TriggerStore: Send + Sync {
    async fn upsert_trigger(&self, trigger: Trigger) -> Result<(), CronError>;

    async fn get_trigger(&self, id: Uuid) -> Result<Option<Trigger>, CronError>;

    async fn list_triggers(&self) -> Result<Vec<Trigger>, CronError>;

    async fn delete_trigger(&self, id: Uuid) -> Result<(), CronError>;

    async fn record_run(&self, run: Run) -> Result<(), CronError>;

    async fn update_run(&self, run: Run) -> Result<(), CronError>;

    async fn get_run(&self, run_id: Uuid) -> Result<Option<Run>, CronError>;

    async fn list_runs_for_trigger(&self, trigger_id: Uuid) -> Result<Vec<Run>, CronError>;
}
