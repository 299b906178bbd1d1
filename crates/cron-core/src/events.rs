//! Broadcast distribution of [`SchedulerEvent`]s to observers.

use cron_kernel::events::SchedulerEvent;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 1024;

/// A single `tokio::sync::broadcast` channel shared by every subscriber.
/// Subscribers that fall behind the capacity miss older events rather than
/// stalling the dispatch loop — publishing never blocks.
pub struct EventBus {
    sender: broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to every current subscriber. A `SendError` here only
    /// means there are zero subscribers, which is not an error condition for
    /// the scheduler.
    pub fn publish(&self, event: SchedulerEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
