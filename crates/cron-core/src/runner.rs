//! Executes a single handler invocation with timeout and cancellation.

use cron_kernel::clock::Clock;
use cron_kernel::context::{JobHandler, JobHandlerContext};
use cron_kernel::error::{CronError, CronErrorCode};
use cron_kernel::run::RunStatus;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Everything the runner needs to execute one attempt, independent of the
/// dispatcher's bookkeeping around it.
pub struct RunRequest {
    pub run_id: Uuid,
    pub trigger_id: Uuid,
    pub job_name: String,
    pub payload: Option<Value>,
    pub scheduled_at_ms: u64,
    pub attempt: u32,
    pub timeout_ms: Option<u64>,
    pub clock: Arc<dyn Clock>,
    pub touch: Arc<dyn Fn(Option<Value>) + Send + Sync>,
}

/// The runner's classification of a finished attempt.
pub struct RunOutcome {
    pub status: RunStatus,
    pub result: Option<Value>,
    pub error: Option<CronError>,
}

/// Runs a single job attempt to completion, racing the handler against an
/// optional timeout and honoring a `CancellationToken` created for this
/// attempt. Never panics on handler error — every outcome is classified.
pub struct JobRunner;

impl JobRunner {
    pub async fn run(
        handler: &dyn JobHandler,
        request: RunRequest,
        cancellation: CancellationToken,
    ) -> RunOutcome {
        let ctx = JobHandlerContext::new(
            request.run_id,
            request.trigger_id,
            request.job_name.clone(),
            request.payload,
            request.scheduled_at_ms,
            request.attempt,
            cancellation.clone(),
            request.clock.clone(),
            request.touch,
        );

        let handler_fut = handler.execute(ctx);

        let outcome = match request.timeout_ms {
            Some(ms) if ms > 0 => {
                tokio::select! {
                    result = handler_fut => Ok(result),
                    _ = request.clock.sleep(ms) => Err(()),
                }
            }
            _ => Ok(handler_fut.await),
        };

        match outcome {
            Err(()) => {
                cancellation.cancel();
                RunOutcome {
                    status: RunStatus::TimedOut,
                    result: None,
                    error: Some(CronError::timeout(format!(
                        "job '{}' exceeded its timeout",
                        request.job_name
                    ))),
                }
            }
            Ok(Ok(value)) => RunOutcome {
                status: RunStatus::Succeeded,
                result: Some(value),
                error: None,
            },
            Ok(Err(e)) if cancellation.is_cancelled() => RunOutcome {
                status: RunStatus::Canceled,
                result: None,
                error: Some(CronError::canceled(e.message)),
            },
            Ok(Err(e)) if e.code == CronErrorCode::ETimeout => RunOutcome {
                status: RunStatus::TimedOut,
                result: None,
                error: Some(e),
            },
            Ok(Err(e)) => RunOutcome {
                status: RunStatus::Failed,
                result: None,
                error: Some(e),
            },
        }
    }
}
