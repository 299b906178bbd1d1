//! Store implementations. `memory` is the default; external crates may
//! implement `cron_kernel::TriggerStore` for a durable backend instead.

pub mod memory;

pub use memory::InMemoryTriggerStore;
