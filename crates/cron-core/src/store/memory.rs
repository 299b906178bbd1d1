//! The default, non-durable `TriggerStore`.

use async_trait::async_trait;
use cron_kernel::error::CronError;
use cron_kernel::run::Run;
use cron_kernel::store::TriggerStore;
use cron_kernel::trigger::Trigger;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// An in-memory `TriggerStore` backed by two `RwLock<HashMap<...>>` maps.
/// Authoritative only for the lifetime of the process — restarting loses
/// all triggers and run history, which is documented scheduler behavior,
/// not a defect of this store.
#[derive(Default)]
pub struct InMemoryTriggerStore {
    triggers: RwLock<HashMap<Uuid, Trigger>>,
    runs: RwLock<HashMap<Uuid, Run>>,
}

impl InMemoryTriggerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TriggerStore for InMemoryTriggerStore {
    async fn upsert_trigger(&self, trigger: Trigger) -> Result<(), CronError> {
        self.triggers.write().await.insert(trigger.id, trigger);
        Ok(())
    }

    async fn get_trigger(&self, id: Uuid) -> Result<Option<Trigger>, CronError> {
        Ok(self.triggers.read().await.get(&id).cloned())
    }

    async fn list_triggers(&self) -> Result<Vec<Trigger>, CronError> {
        Ok(self.triggers.read().await.values().cloned().collect())
    }

    async fn delete_trigger(&self, id: Uuid) -> Result<(), CronError> {
        self.triggers.write().await.remove(&id);
        Ok(())
    }

    async fn record_run(&self, run: Run) -> Result<(), CronError> {
        self.runs.write().await.insert(run.run_id, run);
        Ok(())
    }

    async fn update_run(&self, run: Run) -> Result<(), CronError> {
        self.runs.write().await.insert(run.run_id, run);
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<Run>, CronError> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }

    async fn list_runs_for_trigger(&self, trigger_id: Uuid) -> Result<Vec<Run>, CronError> {
        Ok(self
            .runs
            .read()
            .await
            .values()
            .filter(|r| r.trigger_id == trigger_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cron_kernel::trigger::TriggerSpec;

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = InMemoryTriggerStore::new();
        let trigger = Trigger::new("job", TriggerSpec::At { run_at_ms: 10 }, 10);
        let id = trigger.id;
        store.upsert_trigger(trigger).await.unwrap();
        let back = store.get_trigger(id).await.unwrap().unwrap();
        assert_eq!(back.id, id);
    }

    #[tokio::test]
    async fn delete_removes_trigger() {
        let store = InMemoryTriggerStore::new();
        let trigger = Trigger::new("job", TriggerSpec::At { run_at_ms: 10 }, 10);
        let id = trigger.id;
        store.upsert_trigger(trigger).await.unwrap();
        store.delete_trigger(id).await.unwrap();
        assert!(store.get_trigger(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn runs_filter_by_trigger() {
        let store = InMemoryTriggerStore::new();
        let trigger_id = Uuid::new_v4();
        let other_id = Uuid::new_v4();
        store
            .record_run(Run::new(trigger_id, "job", 0, 1))
            .await
            .unwrap();
        store
            .record_run(Run::new(other_id, "job", 0, 1))
            .await
            .unwrap();
        let runs = store.list_runs_for_trigger(trigger_id).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].trigger_id, trigger_id);
    }
}
