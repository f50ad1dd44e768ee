use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use alert_partitioning::{
    MemberId, PartitionChange, PartitionEntry, PartitionListener, PartitionManager, TriggerChange,
    TriggerOperation,
};

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

pub fn members(ids: &[u64]) -> Vec<MemberId> {
    ids.iter().copied().map(MemberId).collect()
}

pub fn entries(n: usize) -> Vec<PartitionEntry> {
    (0..n)
        .map(|i| PartitionEntry::new(format!("tenant-{}", i % 5), format!("trigger-{i}")))
        .collect()
}

/// Keeps the set of entries a member believes it owns, the way a node
/// engine would.
#[derive(Default)]
pub struct OwnedEntries {
    pub owned: Mutex<HashSet<PartitionEntry>>,
    pub changes: Mutex<Vec<PartitionChange>>,
    pub trigger_changes: Mutex<Vec<TriggerChange>>,
}

impl OwnedEntries {
    pub async fn owned_sorted(&self) -> BTreeSet<PartitionEntry> {
        self.owned.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl PartitionListener for OwnedEntries {
    async fn on_partition_change(&self, change: &PartitionChange) -> anyhow::Result<()> {
        let mut owned = self.owned.lock().await;
        for (tenant, triggers) in &change.removed {
            for trigger in triggers {
                owned.remove(&PartitionEntry::new(tenant, trigger));
            }
        }
        for (tenant, triggers) in &change.added {
            for trigger in triggers {
                owned.insert(PartitionEntry::new(tenant, trigger));
            }
        }
        self.changes.lock().await.push(change.clone());
        Ok(())
    }

    async fn on_trigger_change(&self, change: &TriggerChange) -> anyhow::Result<()> {
        let mut owned = self.owned.lock().await;
        match change.operation {
            TriggerOperation::Add | TriggerOperation::Update => {
                owned.insert(change.entry.clone());
            }
            TriggerOperation::Remove => {
                owned.remove(&change.entry);
            }
        }
        self.trigger_changes.lock().await.push(change.clone());
        Ok(())
    }
}

pub struct AlwaysFails;

#[async_trait]
impl PartitionListener for AlwaysFails {
    async fn on_partition_change(&self, _change: &PartitionChange) -> anyhow::Result<()> {
        anyhow::bail!("downstream unavailable")
    }
}

/// Register an `OwnedEntries` listener for each member id.
pub fn register_all(manager: &PartitionManager, ids: &[u64]) -> Vec<(MemberId, Arc<OwnedEntries>)> {
    ids.iter()
        .map(|id| {
            let listener = Arc::new(OwnedEntries::default());
            manager.register_listener(MemberId(*id), listener.clone());
            (MemberId(*id), listener)
        })
        .collect()
}
