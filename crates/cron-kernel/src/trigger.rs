//! Trigger specifications and the persisted `Trigger` record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Input to `schedule`: describes when a trigger should fire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[non_exhaustive]
pub enum TriggerSpec {
    /// Fire once at `run_at`.
    At { run_at_ms: u64 },
    /// Fire at `start_at, start_at+period_ms, ...` up to `end_at`.
    Every {
        period_ms: u64,
        start_at_ms: Option<u64>,
        end_at_ms: Option<u64>,
    },
    /// Standard 5- or 6-field cron expression. Parsing and "next occurrence
    /// after a given instant" are delegated to `cron-core`, which owns the
    /// dependency on the `cron` crate; the kernel only carries the string.
    Cron { expression: String },
}

/// What to do when an occurrence is discovered to be more than
/// `misfire_tolerance_ms` late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MisfirePolicy {
    /// Drop the missed occurrence; resume at the next normally-scheduled
    /// instant.
    Skip,
    /// Fire immediately as if on time; the next occurrence is recomputed
    /// from now.
    FireNow,
    /// Fire immediately; the next occurrence is recomputed from the
    /// original due time, cascading further catch-up fires until current
    /// (optionally bounded by `Trigger::max_catchup`).
    FireMissed,
}

impl Default for MisfirePolicy {
    fn default() -> Self {
        MisfirePolicy::Skip
    }
}

/// Lifecycle state of a persisted trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerState {
    Active,
    Paused,
    Completed,
}

/// A persistent schedule record, owned by the `TriggerStore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub id: Uuid,
    pub job_name: String,
    pub spec: TriggerSpec,
    pub next_run_at_ms: u64,
    pub last_run_at_ms: Option<u64>,
    pub misfire_policy: MisfirePolicy,
    pub metadata: Option<serde_json::Value>,
    pub payload: Option<serde_json::Value>,
    pub state: TriggerState,
    /// Bounds `FireMissed` cascading catch-up fires. `None` means unbounded
    /// (see DESIGN.md Open Questions).
    pub max_catchup: Option<u32>,
    /// Monotonically increasing; bumped whenever this trigger is
    /// rescheduled so stale heap entries can be discarded on pop.
    pub generation: u64,
}

impl Trigger {
    pub fn new(job_name: impl Into<String>, spec: TriggerSpec, next_run_at_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_name: job_name.into(),
            spec,
            next_run_at_ms,
            last_run_at_ms: None,
            misfire_policy: MisfirePolicy::default(),
            metadata: None,
            payload: None,
            state: TriggerState::Active,
            max_catchup: None,
            generation: 0,
        }
    }

    pub fn with_misfire_policy(mut self, policy: MisfirePolicy) -> Self {
        self.misfire_policy = policy;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_max_catchup(mut self, max_catchup: u32) -> Self {
        self.max_catchup = Some(max_catchup);
        self
    }
}
