use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alert_dampening::{Dampening, DampeningKey, TriggerMode};
use alert_engine::{
    AlertsEngine, ChannelAlertSink, DefinitionsStore, InMemoryDefinitionsStore, SatisfiedAlert,
};
use alert_partitioning::{MemberId, PartitionEntry, PartitionManager};
use tokio::sync::{mpsc, Mutex};

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub async fn wait_for_condition<F, Fut>(timeout: Duration, interval: Duration, f: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if f().await {
            return;
        }
        tokio::time::sleep(interval).await;
    }
    panic!("condition not met within {timeout:?}");
}

/// Poll a synchronous condition with the default timeout.
pub async fn wait_until<F>(f: F)
where
    F: Fn() -> bool,
{
    wait_for_condition(WAIT_TIMEOUT, POLL_INTERVAL, || std::future::ready(f())).await;
}

pub fn members(ids: &[u64]) -> Vec<MemberId> {
    ids.iter().copied().map(MemberId).collect()
}

/// `n` triggers spread over four tenants. Every third trigger fires only
/// after two consecutive true evaluations.
pub fn definitions(n: usize) -> Arc<InMemoryDefinitionsStore> {
    let store = InMemoryDefinitionsStore::new();
    for i in 0..n {
        let tenant = format!("tenant-{}", i % 4);
        let trigger = format!("trigger-{i}");
        store.put_trigger(&tenant, &trigger);
        if i % 3 == 0 {
            store
                .put_dampening(Dampening::strict(
                    DampeningKey::new(&tenant, &trigger, TriggerMode::Firing),
                    2,
                ))
                .expect("valid dampening");
        }
    }
    Arc::new(store)
}

/// One cluster member: its own partition manager with only the local
/// engine registered, the way every node runs.
pub struct Node {
    pub id: MemberId,
    pub manager: Arc<PartitionManager>,
    pub engine: Arc<AlertsEngine>,
    pub alerts: Mutex<mpsc::Receiver<SatisfiedAlert>>,
}

impl Node {
    pub async fn start(id: u64, definitions: Arc<InMemoryDefinitionsStore>) -> Node {
        let id = MemberId(id);
        let (sink, alerts) = ChannelAlertSink::new(1024);
        let manager = Arc::new(PartitionManager::new());
        let engine = Arc::new(AlertsEngine::new(id, definitions.clone(), Arc::new(sink)));
        manager.register_listener(id, engine.clone());
        manager.start().expect("manager starts once");
        manager.add_entries(definitions.list_triggers().await.expect("in-memory store"));
        Node {
            id,
            manager,
            engine,
            alerts: Mutex::new(alerts),
        }
    }

    pub fn loaded(&self) -> usize {
        self.engine.loaded_dampenings().len()
    }

    /// Whether the engine holds exactly the triggers the manager assigns to
    /// this member, both modes each.
    pub fn is_settled(&self) -> bool {
        let expected: BTreeSet<PartitionEntry> =
            self.manager.local_entries(self.id).into_iter().collect();
        let keys = self.engine.loaded_dampenings();
        let loaded: BTreeSet<PartitionEntry> = keys
            .iter()
            .map(|key| PartitionEntry::new(&key.tenant_id, &key.trigger_id))
            .collect();
        loaded == expected && keys.len() == expected.len() * TriggerMode::ALL.len()
    }

    pub async fn drain_alerts(&self) -> Vec<SatisfiedAlert> {
        let mut rx = self.alerts.lock().await;
        let mut drained = Vec::new();
        while let Ok(alert) = rx.try_recv() {
            drained.push(alert);
        }
        drained
    }
}

/// Apply the same member set on every given node.
pub fn apply_membership(nodes: &[&Node], ids: &[u64]) {
    for node in nodes {
        node.manager
            .on_membership_change(&members(ids))
            .expect("non-empty membership");
    }
}

pub fn total_loaded(nodes: &[&Node]) -> usize {
    nodes.iter().map(|node| node.loaded()).sum()
}

pub fn all_settled(nodes: &[&Node]) -> bool {
    nodes.iter().all(|node| node.is_settled())
}
