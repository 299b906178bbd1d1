//! Token-bucket rate limiting with lazy, continuous refill.

use cron_kernel::job::RateLimitConfig;
use parking_lot::Mutex;

/// Result of a rate-limit admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Allowed,
    /// Caller should retry no earlier than `now + retry_after_ms`.
    Deferred { retry_after_ms: u64 },
}

struct State {
    tokens: f64,
    last_refill_ms: u64,
}

/// A token bucket, refilled lazily on each acquisition check rather than by
/// a background task — there is nothing to drive refill when the scheduler
/// is idle, so refill math runs inline with `try_acquire`.
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    refill_interval_ms: u64,
    state: Mutex<State>,
}

impl TokenBucket {
    pub fn new(config: RateLimitConfig, now_ms: u64) -> Self {
        Self {
            capacity: config.capacity,
            refill_rate: config.refill_rate,
            refill_interval_ms: config.refill_interval_ms,
            state: Mutex::new(State {
                tokens: config.capacity,
                last_refill_ms: now_ms,
            }),
        }
    }

    /// Attempt to acquire a single token at `now_ms`.
    pub fn try_acquire(&self, now_ms: u64) -> Admission {
        let mut state = self.state.lock();
        let elapsed_ms = now_ms.saturating_sub(state.last_refill_ms);
        if self.refill_interval_ms > 0 && elapsed_ms > 0 {
            let refill = (elapsed_ms as f64 / self.refill_interval_ms as f64) * self.refill_rate;
            state.tokens = (state.tokens + refill).min(self.capacity);
        }
        state.last_refill_ms = now_ms;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Admission::Allowed
        } else if self.refill_rate <= 0.0 {
            // No refill configured: capacity was exhausted and will never
            // recover. Defer indefinitely in practice by reporting the
            // largest meaningful wait the caller would reasonably re-poll
            // at; callers treat this the same as any other deferral.
            Admission::Deferred {
                retry_after_ms: u64::MAX,
            }
        } else {
            let deficit = 1.0 - state.tokens;
            let retry_after_ms =
                (deficit * self.refill_interval_ms as f64 / self.refill_rate).ceil() as u64;
            Admission::Deferred { retry_after_ms }
        }
    }
}
