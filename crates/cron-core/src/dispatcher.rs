//! The scheduler orchestrator: registration, scheduling, the dispatch loop,
//! admission gating, retries, recurrence, and shutdown.

use crate::config::SchedulerConfig;
use crate::events::EventBus;
use crate::heap::{HeapEntry, TimerHeap};
use crate::limiter::{Admission, TokenBucket};
use crate::registry::JobRegistry;
use crate::runner::{JobRunner, RunRequest};
use crate::schedule::{first_occurrence, next_occurrence};
use crate::semaphore::ConcurrencyGate;
use cron_kernel::clock::Clock;
use cron_kernel::context::JobHandler;
use cron_kernel::error::{CronError, CronErrorCode};
use cron_kernel::events::SchedulerEvent;
use cron_kernel::job::JobDefinition;
use cron_kernel::run::{Run, RunError, RunStatus};
use cron_kernel::store::TriggerStore;
use cron_kernel::trigger::{MisfirePolicy, Trigger, TriggerSpec, TriggerState};
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Options accepted by [`Scheduler::schedule`] beyond the bare spec.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOptions {
    pub misfire_policy: MisfirePolicy,
    pub metadata: Option<serde_json::Value>,
    pub payload: Option<serde_json::Value>,
    pub max_catchup: Option<u32>,
}

pub struct ScheduledTrigger {
    pub trigger_id: Uuid,
    pub next_run_at_ms: u64,
}

pub struct ExecuteNowHandle {
    pub run_id: Uuid,
    pub trigger_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerState {
    Running,
    Draining,
    Stopped,
}

struct ActiveRun {
    trigger_id: Uuid,
    job_name: String,
    cancellation: CancellationToken,
}

/// The basis a freshly-finished occurrence recomputes its recurrence from:
/// `due_at_ms` for an on-time or `Skip`/`FireMissed` fire, `now` for a
/// `FireNow` misfire — see spec §4.6.
struct RecurrenceBasis {
    trigger_id: Uuid,
    basis_ms: u64,
}

/// What `maybe_retry` decided about a failed or timed-out attempt.
#[derive(Debug, PartialEq, Eq)]
enum RetryDecision {
    /// A retry attempt was pushed onto the heap; no terminal event yet.
    Scheduled,
    /// No retry policy, or the policy's predicate declined this error.
    NotRetryable,
    /// A retry policy exists but `max_attempts` was reached; the terminal
    /// `Failed` event wraps the original error in `E_RETRY_LIMIT`.
    Exhausted,
}

/// The job-scheduler orchestrator. Cheap to clone (an `Arc` internally);
/// construct once via [`Scheduler::new`] and share the handle.
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    store: Arc<dyn TriggerStore>,
    registry: JobRegistry,
    heap: SyncMutex<TimerHeap>,
    gate: ConcurrencyGate,
    global_limiter: Option<TokenBucket>,
    events: EventBus,
    notify: Notify,
    run_finished: Notify,
    state: SyncMutex<SchedulerState>,
    active_runs: SyncMutex<HashMap<Uuid, ActiveRun>>,
    pending_runs: SyncMutex<HashMap<Uuid, Uuid>>,
    catchup_counts: SyncMutex<HashMap<Uuid, u32>>,
    misfire_tolerance_ms: u64,
    shutdown_grace_ms: u64,
}

impl Scheduler {
    /// Build a scheduler and spawn its dispatch loop. The returned `Arc` is
    /// the only handle you need; dropping every clone lets the loop's task
    /// keep running until `shutdown` is called and completes.
    pub fn new(clock: Arc<dyn Clock>, store: Arc<dyn TriggerStore>, config: SchedulerConfig) -> Arc<Self> {
        let global_limiter = config
            .global_rate_limit
            .map(|rl| TokenBucket::new(rl, clock.now_ms()));

        let scheduler = Arc::new(Self {
            clock,
            store,
            registry: JobRegistry::new(),
            heap: SyncMutex::new(TimerHeap::new()),
            gate: ConcurrencyGate::new(config.max_concurrent_runs),
            global_limiter,
            events: EventBus::with_capacity(config.event_bus_capacity),
            notify: Notify::new(),
            run_finished: Notify::new(),
            state: SyncMutex::new(SchedulerState::Running),
            active_runs: SyncMutex::new(HashMap::new()),
            pending_runs: SyncMutex::new(HashMap::new()),
            catchup_counts: SyncMutex::new(HashMap::new()),
            misfire_tolerance_ms: config.misfire_tolerance_ms,
            shutdown_grace_ms: config.shutdown_grace_ms,
        });

        tokio::spawn(scheduler.clone().dispatch_loop());
        scheduler
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    fn ensure_running(&self) -> Result<(), CronError> {
        if *self.state.lock() == SchedulerState::Running {
            Ok(())
        } else {
            Err(CronError::shutdown())
        }
    }

    // ---- Registration ----------------------------------------------------

    pub async fn register_job(&self, definition: JobDefinition) -> Result<(), CronError> {
        self.ensure_running()?;
        let name = definition.name.clone();
        self.registry.register(definition, self.clock.now_ms()).await?;
        info!(job = %name, "job registered");
        self.events.publish(SchedulerEvent::JobRegistered { name });
        Ok(())
    }

    pub async fn unregister_job(&self, name: &str, force: bool) -> Result<(), CronError> {
        let has_active_runs = self
            .active_runs
            .lock()
            .values()
            .any(|r| r.job_name == name);
        self.registry.unregister(name, force, has_active_runs).await
    }

    // ---- Scheduling --------------------------------------------------------

    pub async fn schedule(
        &self,
        job_name: &str,
        spec: TriggerSpec,
        opts: ScheduleOptions,
    ) -> Result<ScheduledTrigger, CronError> {
        self.ensure_running()?;
        if !self.registry.contains(job_name).await {
            return Err(CronError::not_found(job_name));
        }

        let now = self.clock.now_ms();
        let next_run_at_ms = first_occurrence(&spec, now)?;

        let mut trigger = Trigger::new(job_name, spec, next_run_at_ms).with_misfire_policy(opts.misfire_policy);
        if let Some(metadata) = opts.metadata {
            trigger = trigger.with_metadata(metadata);
        }
        if let Some(payload) = opts.payload {
            trigger = trigger.with_payload(payload);
        }
        if let Some(max_catchup) = opts.max_catchup {
            trigger = trigger.with_max_catchup(max_catchup);
        }

        let trigger_id = trigger.id;
        let generation = trigger.generation;
        self.store.upsert_trigger(trigger).await?;
        self.heap.lock().push(trigger_id, next_run_at_ms, generation, 1);
        self.notify.notify_one();

        debug!(trigger_id = %trigger_id, job = %job_name, next_run_at_ms, "trigger scheduled");
        self.events.publish(SchedulerEvent::Scheduled {
            trigger_id,
            next_run_at_ms,
        });

        Ok(ScheduledTrigger {
            trigger_id,
            next_run_at_ms,
        })
    }

    /// Equivalent to `schedule` with a one-shot spec whose `run_at` is
    /// clamped to `max(run_at, now)` — a `run_at` in the past, as well as
    /// `None`, both collapse to "right now". Pre-mints the first attempt's
    /// `run_id` so the caller can correlate it with lifecycle events before
    /// the dispatch loop ever wakes.
    pub async fn execute_now(
        &self,
        job_name: &str,
        run_at_ms: Option<u64>,
        payload: Option<serde_json::Value>,
    ) -> Result<ExecuteNowHandle, CronError> {
        self.ensure_running()?;
        if !self.registry.contains(job_name).await {
            return Err(CronError::not_found(job_name));
        }

        let now = self.clock.now_ms().max(run_at_ms.unwrap_or(0));
        let mut trigger = Trigger::new(job_name, TriggerSpec::At { run_at_ms: now }, now);
        if let Some(payload) = payload.clone() {
            trigger = trigger.with_payload(payload);
        }
        let trigger_id = trigger.id;
        let generation = trigger.generation;
        self.store.upsert_trigger(trigger).await?;

        let run = Run::new(trigger_id, job_name, now, 1);
        let run_id = run.run_id;
        self.store.record_run(run).await?;
        self.pending_runs.lock().insert(trigger_id, run_id);

        self.heap.lock().push(trigger_id, now, generation, 1);
        self.notify.notify_one();

        self.events.publish(SchedulerEvent::Scheduled {
            trigger_id,
            next_run_at_ms: now,
        });

        Ok(ExecuteNowHandle { run_id, trigger_id })
    }

    pub async fn pause_trigger(&self, trigger_id: Uuid) -> Result<(), CronError> {
        let mut trigger = self
            .store
            .get_trigger(trigger_id)
            .await?
            .ok_or_else(|| CronError::not_found(trigger_id))?;
        trigger.state = TriggerState::Paused;
        self.store.upsert_trigger(trigger).await
    }

    pub async fn resume_trigger(&self, trigger_id: Uuid) -> Result<(), CronError> {
        let mut trigger = self
            .store
            .get_trigger(trigger_id)
            .await?
            .ok_or_else(|| CronError::not_found(trigger_id))?;
        trigger.state = TriggerState::Active;
        trigger.generation += 1;
        let now = self.clock.now_ms();
        let next = next_occurrence(&trigger.spec, now)?
            .ok_or_else(|| CronError::state("trigger has no further occurrences to resume"))?;
        trigger.next_run_at_ms = next;
        let generation = trigger.generation;
        self.store.upsert_trigger(trigger).await?;
        self.heap.lock().push(trigger_id, next, generation, 1);
        self.notify.notify_one();
        Ok(())
    }

    pub async fn remove_trigger(&self, trigger_id: Uuid) -> Result<(), CronError> {
        self.store.delete_trigger(trigger_id).await
    }

    pub async fn cancel_run(&self, run_id: Uuid) -> Result<(), CronError> {
        let active = self.active_runs.lock();
        match active.get(&run_id) {
            Some(run) => {
                run.cancellation.cancel();
                Ok(())
            }
            None => Err(CronError::not_found(run_id)),
        }
    }

    // ---- Shutdown -----------------------------------------------------------

    pub async fn shutdown(&self, graceful: bool) -> Result<(), CronError> {
        *self.state.lock() = SchedulerState::Draining;

        if graceful {
            let deadline = self.clock.now_ms() + self.shutdown_grace_ms;
            loop {
                if self.gate.global_active() == 0 {
                    break;
                }
                let now = self.clock.now_ms();
                if now >= deadline {
                    warn!("shutdown grace period elapsed with runs still active");
                    break;
                }
                tokio::select! {
                    _ = self.run_finished.notified() => {}
                    _ = self.clock.sleep((deadline - now).min(50)) => {}
                }
            }
        }

        let mut suppressed = Vec::new();
        let stragglers: Vec<Uuid> = self.active_runs.lock().keys().copied().collect();
        for run_id in stragglers {
            if let Err(e) = self.cancel_run(run_id).await {
                suppressed.push(e);
            }
        }

        // Give canceled handlers a brief, bounded window to unwind before
        // declaring the scheduler stopped.
        for _ in 0..10 {
            if self.gate.global_active() == 0 {
                break;
            }
            tokio::select! {
                _ = self.run_finished.notified() => {}
                _ = self.clock.sleep(10) => {}
            }
        }

        *self.state.lock() = SchedulerState::Stopped;
        self.notify.notify_one();
        self.events.publish(SchedulerEvent::Shutdown);

        if suppressed.is_empty() {
            Ok(())
        } else {
            Err(CronError::shutdown().with_suppressed(suppressed))
        }
    }

    // ---- Dispatch loop --------------------------------------------------

    async fn dispatch_loop(self: Arc<Self>) {
        loop {
            if *self.state.lock() == SchedulerState::Stopped {
                return;
            }

            let head_due = self.heap.lock().peek().map(|e| e.due_at_ms);
            let draining = *self.state.lock() != SchedulerState::Running;

            match head_due {
                None => {
                    self.notify.notified().await;
                    continue;
                }
                Some(_) if draining => {
                    // Stop popping new entries while draining; just wait
                    // for shutdown to finish tearing things down.
                    self.notify.notified().await;
                    continue;
                }
                Some(due) => {
                    let now = self.clock.now_ms();
                    if due > now {
                        tokio::select! {
                            _ = self.clock.sleep(due - now) => {}
                            _ = self.notify.notified() => {}
                        }
                        continue;
                    }
                }
            }

            loop {
                let now = self.clock.now_ms();
                let due_entry = {
                    let mut heap = self.heap.lock();
                    match heap.peek() {
                        Some(entry) if entry.due_at_ms <= now => heap.pop(),
                        _ => None,
                    }
                };
                let Some(entry) = due_entry else { break };
                self.handle_due_entry(entry).await;
            }
        }
    }

    async fn handle_due_entry(self: &Arc<Self>, entry: HeapEntry) {
        let trigger = match self.store.get_trigger(entry.trigger_id).await {
            Ok(Some(t)) => t,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "store lookup failed while dispatching; dropping entry");
                return;
            }
        };

        if trigger.generation != entry.generation || trigger.state != TriggerState::Active {
            return;
        }

        let now = self.clock.now_ms();
        let lateness = now.saturating_sub(entry.due_at_ms);

        if lateness > self.misfire_tolerance_ms && entry.attempt == 1 {
            match trigger.misfire_policy {
                MisfirePolicy::Skip => {
                    self.catchup_counts.lock().remove(&trigger.id);
                    self.reschedule_after(&trigger, now).await;
                    return;
                }
                MisfirePolicy::FireNow => {
                    self.catchup_counts.lock().remove(&trigger.id);
                    self.launch(&trigger, entry, RecurrenceBasis {
                        trigger_id: trigger.id,
                        basis_ms: now,
                    })
                    .await;
                    return;
                }
                MisfirePolicy::FireMissed => {
                    let exhausted = {
                        let mut counts = self.catchup_counts.lock();
                        let count = counts.entry(trigger.id).or_insert(0);
                        let exhausted = trigger.max_catchup.is_some_and(|max| *count >= max);
                        if exhausted {
                            counts.remove(&trigger.id);
                        } else {
                            *count += 1;
                        }
                        exhausted
                    };
                    if exhausted {
                        self.reschedule_after(&trigger, now).await;
                        return;
                    }
                    let basis_ms = entry.due_at_ms;
                    self.launch(&trigger, entry, RecurrenceBasis {
                        trigger_id: trigger.id,
                        basis_ms,
                    })
                    .await;
                    return;
                }
            }
        }

        self.catchup_counts.lock().remove(&trigger.id);
        let basis_ms = entry.due_at_ms;
        self.launch(&trigger, entry, RecurrenceBasis {
            trigger_id: trigger.id,
            basis_ms,
        })
        .await;
    }

    /// Skip a missed occurrence and push whatever comes next.
    async fn reschedule_after(self: &Arc<Self>, trigger: &Trigger, now: u64) {
        match next_occurrence(&trigger.spec, now) {
            Ok(Some(next)) => {
                let mut updated = trigger.clone();
                updated.generation += 1;
                updated.next_run_at_ms = next;
                let generation = updated.generation;
                if self.store.upsert_trigger(updated).await.is_ok() {
                    self.heap.lock().push(trigger.id, next, generation, 1);
                    self.notify.notify_one();
                    self.events.publish(SchedulerEvent::Scheduled {
                        trigger_id: trigger.id,
                        next_run_at_ms: next,
                    });
                }
            }
            Ok(None) => {
                let mut updated = trigger.clone();
                updated.state = TriggerState::Completed;
                let _ = self.store.upsert_trigger(updated).await;
            }
            Err(e) => warn!(trigger_id = %trigger.id, error = %e, "failed to compute next occurrence"),
        }
    }

    /// Check admission, and either launch a run or defer this occurrence.
    async fn launch(self: &Arc<Self>, trigger: &Trigger, entry: HeapEntry, basis: RecurrenceBasis) {
        let now = self.clock.now_ms();

        let job_snapshot = self
            .registry
            .with_job(&trigger.job_name, |job| {
                (
                    job.definition.clone(),
                    job.limiter.as_ref().map(|l| l.try_acquire(now)),
                )
            })
            .await;

        let Some((definition, job_admission)) = job_snapshot else {
            warn!(job = %trigger.job_name, "trigger references a job that is no longer registered");
            return;
        };

        if let Some(Admission::Deferred { retry_after_ms }) = job_admission {
            self.defer(trigger.id, entry, now, retry_after_ms, "per-job rate limit");
            return;
        }

        if let Some(limiter) = &self.global_limiter {
            if let Admission::Deferred { retry_after_ms } = limiter.try_acquire(now) {
                self.defer(trigger.id, entry, now, retry_after_ms, "global rate limit");
                return;
            }
        }

        let admitted = self
            .registry
            .with_job(&trigger.job_name, |job| self.gate.try_acquire(&job.slot))
            .await
            .unwrap_or(false);

        if !admitted {
            self.defer(trigger.id, entry, now, 50, "concurrency limit");
            return;
        }

        let run_id_hint = self.pending_runs.lock().remove(&trigger.id).filter(|_| entry.attempt == 1);

        let mut run = match run_id_hint {
            Some(run_id) => match self.store.get_run(run_id).await {
                Ok(Some(run)) => run,
                _ => Run::new(trigger.id, &trigger.job_name, entry.due_at_ms, entry.attempt),
            },
            None => Run::new(trigger.id, &trigger.job_name, entry.due_at_ms, entry.attempt),
        };
        run.start(now);
        let run_id = run.run_id;
        if let Err(e) = self.store.update_run(run).await {
            warn!(run_id = %run_id, error = %e, "failed to persist run start");
        }

        let cancellation = CancellationToken::new();
        self.active_runs.lock().insert(
            run_id,
            ActiveRun {
                trigger_id: trigger.id,
                job_name: trigger.job_name.clone(),
                cancellation: cancellation.clone(),
            },
        );

        info!(run_id = %run_id, trigger_id = %trigger.id, attempt = entry.attempt, "run started");
        self.events.publish(SchedulerEvent::Started {
            run_id,
            trigger_id: trigger.id,
            attempt: entry.attempt,
        });

        let scheduler = self.clone();
        let payload = trigger.payload.clone();
        let job_name = trigger.job_name.clone();
        let trigger_id = trigger.id;
        let attempt = entry.attempt;
        let scheduled_at_ms = entry.due_at_ms;

        tokio::spawn(async move {
            scheduler
                .execute_and_finalize(
                    definition,
                    run_id,
                    trigger_id,
                    job_name,
                    payload,
                    scheduled_at_ms,
                    attempt,
                    cancellation,
                    basis,
                )
                .await;
        });
    }

    fn defer(&self, trigger_id: Uuid, entry: HeapEntry, now: u64, delay_ms: u64, reason: &str) {
        self.heap.lock().push(trigger_id, now + delay_ms, entry.generation, entry.attempt);
        self.notify.notify_one();
        debug!(trigger_id = %trigger_id, reason, delay_ms, "occurrence throttled");
        self.events.publish(SchedulerEvent::Throttled {
            trigger_id,
            reason: reason.to_string(),
            retry_after_ms: delay_ms,
        });
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_and_finalize(
        self: Arc<Self>,
        definition: JobDefinition,
        run_id: Uuid,
        trigger_id: Uuid,
        job_name: String,
        payload: Option<serde_json::Value>,
        scheduled_at_ms: u64,
        attempt: u32,
        cancellation: CancellationToken,
        basis: RecurrenceBasis,
    ) {
        let outcome = match &definition.handler {
            Some(handler) => {
                let handler: Arc<dyn JobHandler> = handler.clone();
                let request = RunRequest {
                    run_id,
                    trigger_id,
                    job_name: job_name.clone(),
                    payload,
                    scheduled_at_ms,
                    attempt,
                    timeout_ms: definition.timeout_ms,
                    clock: self.clock.clone(),
                    touch: Arc::new(|_progress| {}),
                };
                JobRunner::run(handler.as_ref(), request, cancellation).await
            }
            None => crate::runner::RunOutcome {
                status: RunStatus::Failed,
                result: None,
                error: Some(CronError::configuration(format!(
                    "job '{job_name}' has no in-process handler and worker dispatch is external"
                ))),
            },
        };

        let now = self.clock.now_ms();

        self.registry
            .with_job(&job_name, |job| self.gate.release(&job.slot))
            .await;
        self.active_runs.lock().remove(&run_id);
        self.run_finished.notify_waiters();

        let run_error = outcome.error.as_ref().map(RunError::from);
        if let Ok(Some(mut run)) = self.store.get_run(run_id).await {
            run.finish(outcome.status, now, run_error.clone());
            let _ = self.store.update_run(run).await;
        }

        match outcome.status {
            RunStatus::Succeeded => {
                self.events.publish(SchedulerEvent::Completed {
                    run_id,
                    result: outcome.result.unwrap_or(serde_json::Value::Null),
                });
            }
            RunStatus::Canceled => {
                self.events.publish(SchedulerEvent::Canceled { run_id });
            }
            RunStatus::TimedOut | RunStatus::Failed => {
                let trigger_generation = self
                    .store
                    .get_trigger(trigger_id)
                    .await
                    .ok()
                    .flatten()
                    .map(|t| t.generation)
                    .unwrap_or(0);
                let decision = self.maybe_retry(
                    &definition,
                    trigger_id,
                    trigger_generation,
                    run_id,
                    attempt,
                    outcome.error.as_ref(),
                );
                match decision {
                    RetryDecision::Scheduled => return,
                    RetryDecision::NotRetryable => {
                        self.events.publish(SchedulerEvent::Failed {
                            run_id,
                            error: run_error.unwrap_or_else(|| RunError {
                                code: CronErrorCode::EInternal.to_string(),
                                message: "run failed without an attached error".into(),
                                cause: None,
                            }),
                            will_retry: false,
                        });
                    }
                    RetryDecision::Exhausted => {
                        let limit_error = CronError::retry_limit(format!(
                            "job '{job_name}' exhausted {attempt} attempt(s)"
                        ));
                        let limit_error = match outcome.error {
                            Some(original) => limit_error.with_cause(original),
                            None => limit_error,
                        };
                        self.events.publish(SchedulerEvent::Failed {
                            run_id,
                            error: RunError::from(&limit_error),
                            will_retry: false,
                        });
                    }
                }
            }
            RunStatus::Pending | RunStatus::Running => {
                unreachable!("JobRunner never returns a non-terminal status")
            }
        }

        if let Ok(Some(trigger)) = self.store.get_trigger(trigger_id).await {
            if trigger.state == TriggerState::Active {
                self.recompute_recurrence(trigger, basis).await;
            }
        }
    }

    /// Push a retry heap entry if the job's retry policy allows another
    /// attempt.
    fn maybe_retry(
        &self,
        definition: &JobDefinition,
        trigger_id: Uuid,
        trigger_generation: u64,
        run_id: Uuid,
        attempt: u32,
        error: Option<&CronError>,
    ) -> RetryDecision {
        let Some(retry) = definition.retry.as_ref() else {
            return RetryDecision::NotRetryable;
        };
        let Some(error) = error else {
            return RetryDecision::NotRetryable;
        };
        if attempt >= retry.max_attempts {
            return RetryDecision::Exhausted;
        }
        if !retry.should_retry(error) {
            return RetryDecision::NotRetryable;
        }

        let delay_ms = retry.backoff.next_delay_ms(attempt - 1);
        let next_attempt = attempt + 1;
        let now = self.clock.now_ms();

        // Retries carry the trigger's current generation so a concurrent
        // pause/remove still invalidates them.
        self.heap
            .lock()
            .push(trigger_id, now + delay_ms, trigger_generation, next_attempt);
        self.notify.notify_one();

        info!(run_id = %run_id, next_attempt, delay_ms, "retry scheduled");
        self.events.publish(SchedulerEvent::RetryScheduled {
            run_id,
            attempt: next_attempt,
            delay_ms,
        });
        RetryDecision::Scheduled
    }

    async fn recompute_recurrence(&self, trigger: Trigger, basis: RecurrenceBasis) {
        debug_assert_eq!(trigger.id, basis.trigger_id);
        match next_occurrence(&trigger.spec, basis.basis_ms + 1) {
            Ok(Some(next)) => {
                let mut updated = trigger.clone();
                updated.last_run_at_ms = Some(basis.basis_ms);
                updated.generation += 1;
                updated.next_run_at_ms = next;
                let generation = updated.generation;
                if self.store.upsert_trigger(updated).await.is_ok() {
                    self.heap.lock().push(trigger.id, next, generation, 1);
                    self.notify.notify_one();
                    self.events.publish(SchedulerEvent::Scheduled {
                        trigger_id: trigger.id,
                        next_run_at_ms: next,
                    });
                }
            }
            Ok(None) => {
                let mut updated = trigger.clone();
                updated.last_run_at_ms = Some(basis.basis_ms);
                updated.state = TriggerState::Completed;
                let _ = self.store.upsert_trigger(updated).await;
            }
            Err(e) => warn!(trigger_id = %trigger.id, error = %e, "failed to compute recurrence"),
        }
    }
}
