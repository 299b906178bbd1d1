//! Clock abstraction (injectable for testing).
//!
//! Injecting this through the scheduler rather than calling
//! `SystemTime::now()` or `tokio::time::sleep` directly makes every
//! timing-sensitive code path — dispatch, retries, rate-limit refill,
//! timeouts — deterministic under a `VirtualClock` in tests.
//!
//! Only the trait lives here. Concrete implementations — the OS-backed
//! `SystemClock` and the test-only `VirtualClock` — live in `cron-core`,
//! since a wall-clock `sleep` needs a timer runtime and this crate must
//! never depend on one.

use std::future::Future;
use std::pin::Pin;

/// Current time and sleep, abstracted so the scheduler never reads the
/// wall clock directly.
///
/// Implementations live in `cron-core`: `cron_core::clock::SystemClock`
/// for production, `cron_core::clock::VirtualClock` for deterministic
/// tests. Both share this trait.
pub trait Clock: Send + Sync {
    /// Current time as milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;

    /// Current time as a `chrono` UTC instant.
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        let ms = self.now_ms() as i64;
        chrono::DateTime::from_timestamp_millis(ms).unwrap_or_else(chrono::Utc::now)
    }

    /// Resolve after at least `ms` logical milliseconds have elapsed.
    fn sleep(&self, ms: u64) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
