//! A single execution attempt of a trigger occurrence.

use crate::error::CronError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Monotonic run lifecycle: `Pending -> Running -> {terminal}`. No
/// backwards transitions — enforced by the dispatcher, not this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    TimedOut,
}

impl RunStatus {
    /// Whether this status is terminal (no further transitions expected).
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Pending | RunStatus::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: Uuid,
    pub trigger_id: Uuid,
    pub job_name: String,
    pub scheduled_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,
    /// 1-based attempt number for this occurrence.
    pub attempt: u32,
    pub status: RunStatus,
    pub error: Option<RunError>,
}

/// A serializable projection of [`CronError`], suitable for storage and
/// for the `error` field of lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub code: String,
    pub message: String,
    /// The error this one wraps, if any — e.g. retry exhaustion wrapping
    /// the last attempt's failure. Boxed and recursive so the whole
    /// chain survives into storage and events, not just the outermost
    /// code.
    pub cause: Option<Box<RunError>>,
}

impl From<&CronError> for RunError {
    fn from(e: &CronError) -> Self {
        Self {
            code: e.code.to_string(),
            message: e.message.clone(),
            cause: e
                .cause
                .as_ref()
                .and_then(|c| c.downcast_ref::<CronError>())
                .map(|c| Box::new(RunError::from(c))),
        }
    }
}

impl Run {
    pub fn new(trigger_id: Uuid, job_name: impl Into<String>, scheduled_at_ms: u64, attempt: u32) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            trigger_id,
            job_name: job_name.into(),
            scheduled_at_ms,
            started_at_ms: None,
            finished_at_ms: None,
            attempt,
            status: RunStatus::Pending,
            error: None,
        }
    }

    /// Transition to `Running`, recording the start timestamp.
    ///
    /// # Panics
    ///
    /// Panics if called from anything but `Pending` — a backwards or
    /// repeated transition is a dispatcher bug, not a recoverable error.
    pub fn start(&mut self, now_ms: u64) {
        assert_eq!(self.status, RunStatus::Pending, "run started twice");
        self.status = RunStatus::Running;
        self.started_at_ms = Some(now_ms);
    }

    /// Transition to a terminal status, recording the finish timestamp.
    pub fn finish(&mut self, status: RunStatus, now_ms: u64, error: Option<RunError>) {
        assert!(status.is_terminal(), "finish() requires a terminal status");
        assert_eq!(self.status, RunStatus::Running, "run finished before it started");
        self.status = status;
        self.finished_at_ms = Some(now_ms);
        self.error = error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_are_identified_correctly() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        for s in [
            RunStatus::Succeeded,
            RunStatus::Failed,
            RunStatus::Canceled,
            RunStatus::TimedOut,
        ] {
            assert!(s.is_terminal());
        }
    }

    #[test]
    fn lifecycle_transitions_monotonically() {
        let mut run = Run::new(Uuid::new_v4(), "job", 100, 1);
        assert_eq!(run.status, RunStatus::Pending);
        run.start(110);
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.started_at_ms, Some(110));
        run.finish(RunStatus::Succeeded, 150, None);
        assert_eq!(run.status, RunStatus::Succeeded);
        assert_eq!(run.finished_at_ms, Some(150));
    }

    #[test]
    #[should_panic(expected = "run started twice")]
    fn starting_twice_panics() {
        let mut run = Run::new(Uuid::new_v4(), "job", 100, 1);
        run.start(110);
        run.start(120);
    }

    #[test]
    #[should_panic(expected = "finish() requires a terminal status")]
    fn finishing_with_nonterminal_status_panics() {
        let mut run = Run::new(Uuid::new_v4(), "job", 100, 1);
        run.start(110);
        run.finish(RunStatus::Running, 120, None);
    }
}
