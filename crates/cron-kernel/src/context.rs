//! The job handler contract: what a handler receives and must return.

use crate::clock::Clock;
use crate::error::CronError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Everything a handler is given. It holds only this context — it never
/// owns scheduler state directly, per spec §3 ("A handler holds only the
/// `JobHandlerContext` it is given").
#[derive(Clone)]
pub struct JobHandlerContext {
    pub run_id: Uuid,
    pub trigger_id: Uuid,
    pub job_name: String,
    pub payload: Option<serde_json::Value>,
    pub scheduled_at_ms: u64,
    /// 1-based attempt number for this occurrence.
    pub attempt: u32,
    /// Cooperative cancellation: handlers should check `cancellation
    /// .is_cancelled()` at safe points and honor `cancellation
    /// .cancelled()` for cancel-aware awaits.
    pub cancellation: CancellationToken,
    /// Clock injected so handlers that need to sleep or read time remain
    /// testable under a `VirtualClock`.
    pub clock: Arc<dyn Clock>,
    touch: Arc<dyn Fn(Option<serde_json::Value>) + Send + Sync>,
}

impl JobHandlerContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: Uuid,
        trigger_id: Uuid,
        job_name: impl Into<String>,
        payload: Option<serde_json::Value>,
        scheduled_at_ms: u64,
        attempt: u32,
        cancellation: CancellationToken,
        clock: Arc<dyn Clock>,
        touch: Arc<dyn Fn(Option<serde_json::Value>) + Send + Sync>,
    ) -> Self {
        Self {
            run_id,
            trigger_id,
            job_name: job_name.into(),
            payload,
            scheduled_at_ms,
            attempt,
            cancellation,
            clock,
            touch,
        }
    }

    /// Report incremental progress for observability. Never fails: a
    /// progress report is best-effort and must not be able to fail a run.
    pub fn touch(&self, progress: Option<serde_json::Value>) {
        (self.touch)(progress);
    }
}

/// A job's async handler.
///
/// `execute` returns `Ok(value)` on success or `Err(error)` on failure; the
/// runner classifies the error (timeout, cancellation, or generic failure)
/// based on the cancellation token's state and the error's code, per spec
/// §4.5.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn execute(
        &self,
        ctx: JobHandlerContext,
    ) -> Result<serde_json::Value, CronError>;
}

/// Adapt any `Fn(JobHandlerContext) -> Future<Output = Result<...>>` into a
/// [`JobHandler`], so callers can register closures directly instead of
/// hand-writing a trait impl for every job.
pub struct FnJobHandler<F> {
    f: F,
}

impl<F> FnJobHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> JobHandler for FnJobHandler<F>
where
    F: Fn(JobHandlerContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<serde_json::Value, CronError>> + Send,
{
    async fn execute(&self, ctx: JobHandlerContext) -> Result<serde_json::Value, CronError> {
        (self.f)(ctx).await
    }
}
