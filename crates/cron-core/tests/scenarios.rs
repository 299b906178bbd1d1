//! End-to-end scheduler scenarios driven entirely by a `VirtualClock`.
//!
//! Mock jobs built from `FnJobHandler`, `Arc<AtomicU32>` call counters, and
//! `tokio::test`.

use cron_core::cron_kernel::clock::Clock;
use cron_core::cron_kernel::context::{FnJobHandler, JobHandlerContext};
use cron_core::cron_kernel::error::CronError;
use cron_core::cron_kernel::events::SchedulerEvent;
use cron_core::cron_kernel::job::{BackoffStrategy, JobDefinition, RateLimitConfig, RetryPolicy};
use cron_core::cron_kernel::trigger::TriggerSpec;
use cron_core::dispatcher::ScheduleOptions;
use cron_core::{InMemoryTriggerStore, Scheduler, SchedulerConfig};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn scheduler_with(config: SchedulerConfig) -> (Arc<Scheduler>, Arc<cron_core::VirtualClock>) {
    let clock = Arc::new(cron_core::VirtualClock::new());
    let store = Arc::new(InMemoryTriggerStore::new());
    let scheduler = Scheduler::new(clock.clone(), store, config);
    (scheduler, clock)
}

#[tokio::test]
async fn immediate_job_completes_on_execute_now() {
    let (scheduler, clock) = scheduler_with(SchedulerConfig::default());
    let calls = Arc::new(AtomicU32::new(0));
    let calls_for_handler = calls.clone();

    let handler = FnJobHandler::new(move |_ctx: JobHandlerContext| {
        let calls = calls_for_handler.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!({"ok": true}))
        }
    });
    scheduler
        .register_job(JobDefinition::new("immediate-job", Arc::new(handler)))
        .await
        .unwrap();

    let mut events = scheduler.subscribe();
    let handle = scheduler.execute_now("immediate-job", None, None).await.unwrap();

    clock.advance(1);
    settle().await;

    let mut saw_completed = false;
    while let Ok(event) = events.try_recv() {
        if let SchedulerEvent::Completed { run_id, .. } = event {
            assert_eq!(run_id, handle.run_id);
            saw_completed = true;
        }
    }
    assert!(saw_completed, "expected a Completed event for the immediate run");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn backdated_execute_now_runs_exactly_once() {
    let (scheduler, clock) = scheduler_with(SchedulerConfig::default());
    let calls = Arc::new(AtomicU32::new(0));
    let calls_for_handler = calls.clone();
    let handler = FnJobHandler::new(move |_ctx: JobHandlerContext| {
        let calls = calls_for_handler.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!(null))
        }
    });
    scheduler
        .register_job(JobDefinition::new("backdated-job", Arc::new(handler)))
        .await
        .unwrap();

    let backdated_run_at = clock.now_ms().saturating_sub(60_000);
    scheduler
        .execute_now("backdated-job", Some(backdated_run_at), None)
        .await
        .unwrap();

    clock.advance(1);
    settle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn per_job_concurrency_cap_is_respected() {
    let (scheduler, clock) = scheduler_with(SchedulerConfig::default());
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicU32::new(0));

    let active_for_handler = active.clone();
    let peak_for_handler = peak.clone();
    let completed_for_handler = completed.clone();
    let handler = FnJobHandler::new(move |ctx: JobHandlerContext| {
        let active = active_for_handler.clone();
        let peak = peak_for_handler.clone();
        let completed = completed_for_handler.clone();
        async move {
            let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now_active, Ordering::SeqCst);
            ctx.clock.sleep(50).await;
            active.fetch_sub(1, Ordering::SeqCst);
            completed.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!(null))
        }
    });

    scheduler
        .register_job(JobDefinition::new("limited", Arc::new(handler)).with_concurrency(1))
        .await
        .unwrap();

    let now = clock.now_ms();
    scheduler
        .schedule(
            "limited",
            TriggerSpec::At { run_at_ms: now + 10 },
            ScheduleOptions::default(),
        )
        .await
        .unwrap();
    scheduler
        .schedule(
            "limited",
            TriggerSpec::At { run_at_ms: now + 10 },
            ScheduleOptions::default(),
        )
        .await
        .unwrap();

    for _ in 0..10 {
        clock.advance(50);
        settle().await;
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1, "concurrency=1 must cap observed peak at 1");
    assert_eq!(completed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rate_limited_job_spaces_out_starts() {
    let (scheduler, clock) = scheduler_with(SchedulerConfig::default());
    let starts = Arc::new(std::sync::Mutex::new(Vec::<u64>::new()));
    let starts_for_handler = starts.clone();

    let handler = FnJobHandler::new(move |ctx: JobHandlerContext| {
        let starts = starts_for_handler.clone();
        async move {
            starts.lock().unwrap().push(ctx.clock.now_ms());
            Ok(serde_json::json!(null))
        }
    });

    scheduler
        .register_job(
            JobDefinition::new("throttled", Arc::new(handler))
                .with_concurrency(10)
                .with_rate_limit(RateLimitConfig::new(1.0, 1.0, 100)),
        )
        .await
        .unwrap();

    let now = clock.now_ms();
    for _ in 0..3 {
        scheduler
            .schedule(
                "throttled",
                TriggerSpec::At { run_at_ms: now + 10 },
                ScheduleOptions::default(),
            )
            .await
            .unwrap();
    }

    for _ in 0..30 {
        clock.advance(20);
        settle().await;
    }

    let recorded = starts.lock().unwrap().clone();
    assert_eq!(recorded.len(), 3);
    assert!(recorded[1] - recorded[0] >= 80, "starts: {recorded:?}");
    assert!(recorded[2] - recorded[1] >= 80, "starts: {recorded:?}");
}

#[tokio::test]
async fn global_concurrency_cap_bounds_peak_across_jobs() {
    let config = SchedulerConfig {
        max_concurrent_runs: Some(2),
        ..Default::default()
    };
    let (scheduler, clock) = scheduler_with(config);

    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicU32::new(0));

    let active_for_handler = active.clone();
    let peak_for_handler = peak.clone();
    let completed_for_handler = completed.clone();
    let handler = FnJobHandler::new(move |ctx: JobHandlerContext| {
        let active = active_for_handler.clone();
        let peak = peak_for_handler.clone();
        let completed = completed_for_handler.clone();
        async move {
            let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now_active, Ordering::SeqCst);
            ctx.clock.sleep(50).await;
            active.fetch_sub(1, Ordering::SeqCst);
            completed.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!(null))
        }
    });

    scheduler
        .register_job(JobDefinition::new("bursty", Arc::new(handler)).with_concurrency(10))
        .await
        .unwrap();

    let now = clock.now_ms();
    for _ in 0..5 {
        scheduler
            .schedule("bursty", TriggerSpec::At { run_at_ms: now + 10 }, ScheduleOptions::default())
            .await
            .unwrap();
    }

    for _ in 0..10 {
        clock.advance(50);
        settle().await;
    }

    assert!(peak.load(Ordering::SeqCst) <= 2, "global cap=2 must bound peak active runs");
    assert_eq!(completed.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn retries_with_exponential_backoff_then_succeeds() {
    let (scheduler, clock) = scheduler_with(SchedulerConfig::default());
    let attempts = Arc::new(AtomicU32::new(0));
    let starts = Arc::new(std::sync::Mutex::new(Vec::<u64>::new()));

    let attempts_for_handler = attempts.clone();
    let starts_for_handler = starts.clone();
    let handler = FnJobHandler::new(move |ctx: JobHandlerContext| {
        let attempts = attempts_for_handler.clone();
        let starts = starts_for_handler.clone();
        async move {
            starts.lock().unwrap().push(ctx.clock.now_ms());
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt < 3 {
                Err(CronError::internal("transient failure"))
            } else {
                Ok(serde_json::json!({"attempt": attempt}))
            }
        }
    });

    scheduler
        .register_job(
            JobDefinition::new("flaky", Arc::new(handler)).with_retry(RetryPolicy::new(
                3,
                BackoffStrategy::Exponential {
                    base_delay_ms: 10,
                    factor: 2.0,
                    max_delay_ms: None,
                },
            )),
        )
        .await
        .unwrap();

    let now = clock.now_ms();
    scheduler
        .schedule("flaky", TriggerSpec::At { run_at_ms: now + 5 }, ScheduleOptions::default())
        .await
        .unwrap();

    for _ in 0..10 {
        clock.advance(15);
        settle().await;
    }

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    let recorded = starts.lock().unwrap().clone();
    assert_eq!(recorded.len(), 3);
    assert!(recorded[1] - recorded[0] >= 10, "starts: {recorded:?}");
    assert!(recorded[2] - recorded[1] >= 20, "starts: {recorded:?}");
}

#[tokio::test]
async fn retry_exhaustion_attaches_e_retry_limit() {
    let (scheduler, clock) = scheduler_with(SchedulerConfig::default());
    let attempts = Arc::new(AtomicU32::new(0));
    let attempts_for_handler = attempts.clone();

    let handler = FnJobHandler::new(move |_ctx: JobHandlerContext| {
        let attempts = attempts_for_handler.clone();
        async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(CronError::internal("always fails"))
        }
    });

    scheduler
        .register_job(
            JobDefinition::new("always-fails", Arc::new(handler))
                .with_retry(RetryPolicy::new(2, BackoffStrategy::Fixed { delay_ms: 10 })),
        )
        .await
        .unwrap();

    let mut events = scheduler.subscribe();
    let now = clock.now_ms();
    scheduler
        .schedule("always-fails", TriggerSpec::At { run_at_ms: now + 5 }, ScheduleOptions::default())
        .await
        .unwrap();

    for _ in 0..10 {
        clock.advance(15);
        settle().await;
    }

    assert_eq!(attempts.load(Ordering::SeqCst), 2, "max_attempts=2 must stop after the second try");

    let mut terminal_error = None;
    while let Ok(event) = events.try_recv() {
        if let SchedulerEvent::Failed { error, will_retry, .. } = event {
            assert!(!will_retry, "an exhausted run must not claim a pending retry");
            terminal_error = Some(error);
        }
    }
    let error = terminal_error.expect("expected a terminal Failed event");
    assert_eq!(error.code, "E_RETRY_LIMIT");
    let cause = error.cause.expect("exhaustion must carry the original cause");
    assert_eq!(cause.code, "E_INTERNAL");
    assert_eq!(cause.message, "always fails");
}

#[tokio::test]
async fn graceful_shutdown_waits_for_in_flight_run() {
    let (scheduler, clock) = scheduler_with(SchedulerConfig::default());
    let finished = Arc::new(AtomicU32::new(0));
    let finished_for_handler = finished.clone();

    let handler = FnJobHandler::new(move |ctx: JobHandlerContext| {
        let finished = finished_for_handler.clone();
        async move {
            ctx.clock.sleep(20).await;
            finished.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!(null))
        }
    });
    scheduler
        .register_job(JobDefinition::new("slow", Arc::new(handler)))
        .await
        .unwrap();
    scheduler.execute_now("slow", None, None).await.unwrap();

    clock.advance(1);
    settle().await;

    let clock_for_shutdown = clock.clone();
    let scheduler_for_shutdown = scheduler.clone();
    let shutdown = tokio::spawn(async move { scheduler_for_shutdown.shutdown(true).await });

    settle().await;
    clock_for_shutdown.advance(20);
    settle().await;

    tokio::time::timeout(Duration::from_secs(1), shutdown)
        .await
        .expect("shutdown task should not hang")
        .unwrap()
        .unwrap();

    assert_eq!(finished.load(Ordering::SeqCst), 1);
}
