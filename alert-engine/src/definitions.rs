use std::collections::BTreeSet;

use alert_dampening::{Dampening, DampeningKey, TriggerMode};
use alert_partitioning::PartitionEntry;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;

use crate::error::Result;

/// Read-only view of trigger and dampening definitions.
#[async_trait]
pub trait DefinitionsStore: Send + Sync {
    /// Dampening configured for one trigger mode, if any.
    async fn get_dampening(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: TriggerMode,
    ) -> Result<Option<Dampening>>;

    /// Every known trigger, sorted.
    async fn list_triggers(&self) -> Result<Vec<PartitionEntry>>;
}

/// One trigger as found in a definitions file. Modes without a dampening
/// use the default.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerDefinition {
    pub tenant_id: String,
    pub trigger_id: String,
    #[serde(default)]
    pub dampenings: Vec<Dampening>,
}

/// Definitions kept in memory. Dampenings are validated on the way in so
/// readers only ever see usable configurations.
#[derive(Debug, Default)]
pub struct InMemoryDefinitionsStore {
    triggers: DashMap<PartitionEntry, ()>,
    dampenings: DashMap<DampeningKey, Dampening>,
}

impl InMemoryDefinitionsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a JSON array of [`TriggerDefinition`]s.
    pub fn from_json(json: &str) -> Result<Self> {
        let definitions: Vec<TriggerDefinition> = serde_json::from_str(json)?;
        let store = Self::new();
        for definition in definitions {
            store.put_trigger(&definition.tenant_id, &definition.trigger_id);
            for dampening in definition.dampenings {
                store.put_dampening(dampening)?;
            }
        }
        Ok(store)
    }

    pub fn put_trigger(&self, tenant_id: &str, trigger_id: &str) {
        self.triggers
            .insert(PartitionEntry::new(tenant_id, trigger_id), ());
    }

    /// Store a dampening, registering its trigger if needed.
    pub fn put_dampening(&self, dampening: Dampening) -> Result<()> {
        dampening.validate()?;
        self.put_trigger(&dampening.key.tenant_id, &dampening.key.trigger_id);
        self.dampenings.insert(dampening.key.clone(), dampening);
        Ok(())
    }

    /// Forget a trigger and all of its dampenings. Returns whether it existed.
    pub fn remove_trigger(&self, tenant_id: &str, trigger_id: &str) -> bool {
        self.dampenings.retain(|key, _| {
            !(key.tenant_id == tenant_id && key.trigger_id == trigger_id)
        });
        self.triggers
            .remove(&PartitionEntry::new(tenant_id, trigger_id))
            .is_some()
    }
}

#[async_trait]
impl DefinitionsStore for InMemoryDefinitionsStore {
    async fn get_dampening(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: TriggerMode,
    ) -> Result<Option<Dampening>> {
        let key = DampeningKey::new(tenant_id, trigger_id, mode);
        Ok(self.dampenings.get(&key).map(|d| d.value().clone()))
    }

    async fn list_triggers(&self) -> Result<Vec<PartitionEntry>> {
        let sorted: BTreeSet<PartitionEntry> =
            self.triggers.iter().map(|t| t.key().clone()).collect();
        Ok(sorted.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn put_dampening_rejects_invalid_config() {
        let store = InMemoryDefinitionsStore::new();
        let key = DampeningKey::new("acme", "cpu", TriggerMode::Firing);

        let err = store
            .put_dampening(Dampening::relaxed_count(key.clone(), 5, 3))
            .unwrap_err();
        assert!(err.to_string().contains("acme-cpu-FIRING"));
        assert!(store.list_triggers().await.unwrap().is_empty());

        store
            .put_dampening(Dampening::strict_time(key.clone(), Duration::from_secs(30)))
            .unwrap();
        let loaded = store
            .get_dampening("acme", "cpu", TriggerMode::Firing)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.eval_time_setting, 30_000);
        assert!(store
            .get_dampening("acme", "cpu", TriggerMode::AutoResolve)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn from_json_loads_triggers_and_dampenings() {
        let store = InMemoryDefinitionsStore::from_json(
            r#"[
                {"tenant_id": "acme", "trigger_id": "cpu", "dampenings": [
                    {"key": {"tenant_id": "acme", "trigger_id": "cpu", "mode": "FIRING"},
                     "dampening_type": "RELAXED_COUNT",
                     "eval_true_setting": 2, "eval_total_setting": 3, "eval_time_setting": 0}
                ]},
                {"tenant_id": "acme", "trigger_id": "disk"}
            ]"#,
        )
        .unwrap();

        assert_eq!(store.list_triggers().await.unwrap().len(), 2);
        let dampening = store
            .get_dampening("acme", "cpu", TriggerMode::Firing)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dampening.eval_total_setting, 3);
    }

    #[test]
    fn from_json_rejects_invalid_dampening() {
        let result = InMemoryDefinitionsStore::from_json(
            r#"[{"tenant_id": "acme", "trigger_id": "cpu", "dampenings": [
                {"key": {"tenant_id": "acme", "trigger_id": "cpu", "mode": "AUTORESOLVE"},
                 "dampening_type": "STRICT",
                 "eval_true_setting": 0, "eval_total_setting": 0, "eval_time_setting": 0}
            ]}]"#,
        );
        assert!(matches!(result, Err(Error::Dampening(_))));
    }

    #[tokio::test]
    async fn list_and_remove_triggers() {
        let store = InMemoryDefinitionsStore::new();
        store.put_trigger("b", "2");
        store.put_trigger("a", "1");
        store
            .put_dampening(Dampening::strict(
                DampeningKey::new("a", "1", TriggerMode::Firing),
                2,
            ))
            .unwrap();

        assert_eq!(
            store.list_triggers().await.unwrap(),
            vec![PartitionEntry::new("a", "1"), PartitionEntry::new("b", "2")]
        );

        assert!(store.remove_trigger("a", "1"));
        assert!(!store.remove_trigger("a", "1"));
        assert!(store
            .get_dampening("a", "1", TriggerMode::Firing)
            .await
            .unwrap()
            .is_none());
    }
}
