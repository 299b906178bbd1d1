//! Clock implementations: the OS-backed [`SystemClock`] and a fully
//! drivable [`VirtualClock`] for deterministic tests.
//!
//! `VirtualClock` time only moves when the test explicitly says so:
//! `advance(ms)` or `set_to(ms)`. `sleep` registers a waiter and resolves
//! it in due-time order once the clock passes that instant.

use cron_kernel::clock::Clock;
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// The default [`Clock`], backed by the OS wall clock and `tokio::time`.
///
/// `sleep` yields to the Tokio timer wheel and never holds the process
/// from exiting.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }

    fn sleep(&self, ms: u64) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        })
    }
}


struct Waiter {
    at_ms: u64,
    sequence: u64,
    tx: oneshot::Sender<()>,
}

impl PartialEq for Waiter {
    fn eq(&self, other: &Self) -> bool {
        self.at_ms == other.at_ms && self.sequence == other.sequence
    }
}
impl Eq for Waiter {}
impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Waiter {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap on (at_ms, sequence): earliest due time first, ties
        // broken by insertion order.
        (self.at_ms, self.sequence).cmp(&(other.at_ms, other.sequence))
    }
}

struct Inner {
    waiters: BinaryHeap<Reverse<Waiter>>,
    next_sequence: u64,
}

/// A clock whose time is a single monotonically non-decreasing counter,
/// advanced only by explicit [`VirtualClock::advance`] or
/// [`VirtualClock::set_to`]. Enables deterministic tests of timeouts,
/// misfires, rate-limit refill, and backoff without wall-clock sleeps.
#[derive(Clone)]
pub struct VirtualClock {
    now_ms: Arc<AtomicU64>,
    inner: Arc<Mutex<Inner>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(start_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(start_ms)),
            inner: Arc::new(Mutex::new(Inner {
                waiters: BinaryHeap::new(),
                next_sequence: 0,
            })),
        }
    }

    /// Advance the clock by `ms` and resolve every waiter now due, in
    /// due-time order (ties by insertion order).
    pub fn advance(&self, ms: u64) {
        let new_now = self.now_ms.fetch_add(ms, Ordering::SeqCst) + ms;
        self.resolve_due(new_now);
    }

    /// Jump directly to an absolute instant. Must not move time backwards.
    pub fn set_to(&self, ms: u64) {
        let prev = self.now_ms.fetch_max(ms, Ordering::SeqCst);
        if ms >= prev {
            self.resolve_due(ms);
        }
    }

    fn resolve_due(&self, now: u64) {
        let mut inner = self.inner.lock();
        while let Some(Reverse(top)) = inner.waiters.peek() {
            if top.at_ms > now {
                break;
            }
            let Reverse(waiter) = inner.waiters.pop().unwrap();
            let _ = waiter.tx.send(());
        }
    }

    /// Number of waiters not yet resolved — useful for tests asserting
    /// that a scheduler genuinely parked rather than busy-looping.
    pub fn pending_timers(&self) -> usize {
        self.inner.lock().waiters.len()
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn sleep(&self, ms: u64) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let (tx, rx) = oneshot::channel();
            let at_ms = self.now_ms().saturating_add(ms);
            {
                let mut inner = self.inner.lock();
                let sequence = inner.next_sequence;
                inner.next_sequence += 1;
                inner.waiters.push(Reverse(Waiter { at_ms, sequence, tx }));
            }
            // `sleep(0)` must still yield at least once rather than
            // resolving synchronously — a waiter was registered above, so
            // even if `at_ms == now` the resolution comes from the next
            // `advance`/`set_to` call, never from this call itself.
            let _ = rx.await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sleep_resolves_on_advance() {
        let clock = VirtualClock::new();
        let clock2 = clock.clone();
        let handle = tokio::spawn(async move {
            clock2.sleep(100).await;
        });
        tokio::task::yield_now().await;
        assert_eq!(clock.pending_timers(), 1);
        clock.advance(50);
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());
        clock.advance(50);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn sleep_zero_does_not_resolve_synchronously() {
        let clock = VirtualClock::new();
        let clock2 = clock.clone();
        let handle = tokio::spawn(async move {
            clock2.sleep(0).await;
        });
        tokio::task::yield_now().await;
        assert!(!handle.is_finished(), "sleep(0) resolved before any advance");
        clock.advance(0);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn waiters_resolve_in_due_time_order() {
        let clock = VirtualClock::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for (label, delay) in [("b", 20u64), ("a", 10u64), ("c", 30u64)] {
            let clock = clock.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                clock.sleep(delay).await;
                order.lock().push(label);
            }));
        }
        tokio::task::yield_now().await;
        clock.advance(30);
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn set_to_does_not_move_time_backwards() {
        let clock = VirtualClock::starting_at(100);
        clock.set_to(50);
        assert_eq!(clock.now_ms(), 100);
        clock.set_to(200);
        assert_eq!(clock.now_ms(), 200);
    }
}
