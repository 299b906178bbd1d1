#![allow(dead_code)]

//! Concrete implementations for the cron job scheduler: the dispatch loop,
//! timer heap, token bucket, concurrency gate, job runner, in-memory store,
//! and event bus described by `cron-kernel`'s traits.
//!
//! Most applications only need [`dispatcher::Scheduler`], [`clock::VirtualClock`]
//! for tests, and the re-exports from `cron-kernel` for building
//! [`cron_kernel::JobDefinition`]s and [`cron_kernel::TriggerSpec`]s.

pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod events;
pub mod heap;
pub mod limiter;
pub mod registry;
pub mod runner;
pub mod schedule;
pub mod semaphore;
pub mod store;

pub use clock::{SystemClock, VirtualClock};
pub use config::SchedulerConfig;
pub use dispatcher::{ExecuteNowHandle, ScheduleOptions, Scheduler, ScheduledTrigger};
pub use events::EventBus;
pub use heap::{HeapEntry, TimerHeap};
pub use limiter::{Admission, TokenBucket};
pub use registry::JobRegistry;
pub use runner::{JobRunner, RunOutcome, RunRequest};
pub use semaphore::{ConcurrencyGate, JobSlot};
pub use store::InMemoryTriggerStore;

// Re-export the kernel so downstream crates depend on `cron-core` alone for
// the common case of building jobs, triggers, and reading errors/events.
pub use cron_kernel;
