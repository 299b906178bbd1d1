#![allow(dead_code)]

//! Kernel contract for the cron job scheduler — traits, data types, and
//! errors, with zero dispatch logic.
//!
//! # Architecture
//!
//! Per the kernel/core split:
//!
//! - **Trait definitions and plain data types** live here.
//! - **Concrete implementations** (the dispatcher, the timer heap, the
//!   token bucket, ...) live in `cron-core`.
//! - This crate must never depend on `tokio::time`, the `cron` crate, or
//!   anything that performs I/O or scheduling.
//!
//! Everything in this crate compiles and unit-tests without a running
//! `tokio` runtime except where `async-trait` forces an `async fn` into the
//! signature.

pub mod clock;
pub mod context;
pub mod duration;
pub mod error;
pub mod events;
pub mod job;
pub mod run;
pub mod store;
pub mod trigger;

pub use clock::Clock;
pub use context::{JobHandler, JobHandlerContext};
pub use error::{CronError, CronErrorCode};
pub use events::SchedulerEvent;
pub use job::{BackoffStrategy, JobDefinition, RateLimitConfig, RetryPolicy};
pub use run::{Run, RunStatus};
pub use store::TriggerStore;
pub use trigger::{MisfirePolicy, Trigger, TriggerSpec, TriggerState};
