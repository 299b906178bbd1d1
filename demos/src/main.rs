//! Cron scheduler demo — entry point.
//!
//! Registers a job that runs every two seconds, lets it fire a handful of
//! times, then drains the scheduler gracefully.
//!
//! # Environment variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RUST_LOG` | `cron_demo=info,cron_core=info` | Tracing filter. |

use cron_core::cron_kernel::context::{FnJobHandler, JobHandlerContext};
use cron_core::cron_kernel::job::JobDefinition;
use cron_core::cron_kernel::trigger::TriggerSpec;
use cron_core::dispatcher::ScheduleOptions;
use cron_core::{InMemoryTriggerStore, Scheduler, SchedulerConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("cron_demo=info,cron_core=info".parse().unwrap()),
        )
        .init();

    let clock = Arc::new(cron_core::SystemClock);
    let store = Arc::new(InMemoryTriggerStore::new());
    let scheduler = Scheduler::new(clock, store, SchedulerConfig::default());

    let runs = Arc::new(AtomicU32::new(0));
    let runs_for_handler = runs.clone();
    let handler = FnJobHandler::new(move |ctx: JobHandlerContext| {
        let runs = runs_for_handler.clone();
        async move {
            let count = runs.fetch_add(1, Ordering::SeqCst) + 1;
            info!(job = %ctx.job_name, count, "heartbeat fired");
            Ok(serde_json::json!({ "count": count }))
        }
    });

    scheduler
        .register_job(JobDefinition::new("heartbeat", Arc::new(handler)))
        .await
        .expect("registering the heartbeat job should succeed");

    scheduler
        .schedule(
            "heartbeat",
            TriggerSpec::Every {
                period_ms: 2000,
                start_at_ms: None,
                end_at_ms: None,
            },
            ScheduleOptions::default(),
        )
        .await
        .expect("scheduling the heartbeat trigger should succeed");

    tokio::time::sleep(Duration::from_secs(7)).await;

    info!("shutting down");
    scheduler
        .shutdown(true)
        .await
        .expect("graceful shutdown should succeed");

    info!(total_runs = runs.load(Ordering::SeqCst), "demo finished");
}
