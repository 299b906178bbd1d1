//! Non-blocking concurrency gating via plain atomic counters.
//!
//! The dispatch loop needs admission checks that never suspend — a blocking
//! `tokio::sync::Semaphore::acquire` would stall the whole loop behind one
//! busy job, so admission is a compare-and-swap instead of a permit wait.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-job concurrency counter, paired with an optional shared global
/// counter enforced by the same gate.
pub struct JobSlot {
    active: AtomicUsize,
    limit: usize,
}

impl JobSlot {
    pub fn new(limit: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            limit,
        }
    }
}

/// Two-level admission gate: a per-job cap and an optional global cap
/// shared across all jobs.
pub struct ConcurrencyGate {
    global_active: AtomicUsize,
    global_limit: Option<usize>,
}

impl ConcurrencyGate {
    pub fn new(global_limit: Option<usize>) -> Self {
        Self {
            global_active: AtomicUsize::new(0),
            global_limit,
        }
    }

    /// Attempt to admit one more run of a job with the given slot. Returns
    /// `true` and increments both counters iff both the per-job and global
    /// caps have headroom. Never blocks.
    pub fn try_acquire(&self, slot: &JobSlot) -> bool {
        // Reserve the job slot first with a CAS loop, since two callers
        // racing on the same job must not both pass a `< limit` check.
        loop {
            let current = slot.active.load(Ordering::SeqCst);
            if current >= slot.limit {
                return false;
            }
            if slot
                .active
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                break;
            }
        }

        if let Some(limit) = self.global_limit {
            loop {
                let current = self.global_active.load(Ordering::SeqCst);
                if current >= limit {
                    slot.active.fetch_sub(1, Ordering::SeqCst);
                    return false;
                }
                if self
                    .global_active
                    .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    return true;
                }
            }
        }
        self.global_active.fetch_add(1, Ordering::SeqCst);
        true
    }

    pub fn release(&self, slot: &JobSlot) {
        slot.active.fetch_sub(1, Ordering::SeqCst);
        self.global_active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn global_active(&self) -> usize {
        self.global_active.load(Ordering::SeqCst)
    }
}
