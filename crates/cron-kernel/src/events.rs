//! Lifecycle events the scheduler emits to observers.
//!
//! A closed, `#[serde(tag = ...)]`-tagged variant union rather than a
//! stringly-typed listener map — the set of event kinds is fixed and every
//! subscriber gets every variant, filtering in application code if needed.

use crate::run::RunError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[non_exhaustive]
pub enum SchedulerEvent {
    JobRegistered {
        name: String,
    },
    Scheduled {
        trigger_id: Uuid,
        next_run_at_ms: u64,
    },
    Throttled {
        trigger_id: Uuid,
        reason: String,
        retry_after_ms: u64,
    },
    Started {
        run_id: Uuid,
        trigger_id: Uuid,
        attempt: u32,
    },
    Completed {
        run_id: Uuid,
        result: serde_json::Value,
    },
    Failed {
        run_id: Uuid,
        error: RunError,
        will_retry: bool,
    },
    Canceled {
        run_id: Uuid,
    },
    TimedOut {
        run_id: Uuid,
    },
    RetryScheduled {
        run_id: Uuid,
        attempt: u32,
        delay_ms: u64,
    },
    Shutdown,
}
