use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::buckets::{recompute_buckets, BucketTable};
use crate::error::{Error, Result};
use crate::hash::map_entry;
use crate::listener::{dispatch_loop, ListenerEvent, ListenerRegistry, PartitionListener};
use crate::metrics_consts::{
    BUCKET_COUNT_GAUGE, ENTRIES_REASSIGNED_COUNTER, MEMBERSHIP_REJECTED_COUNTER,
    PARTITION_ENTRIES_GAUGE, REBALANCES_COUNTER,
};
use crate::partition::{compute_partition, count_reassigned, diff_all, Partition};
use crate::types::{MemberId, PartitionEntry, TriggerChange, TriggerOperation};

/// Immutable view of the routing state, swapped in whole after every
/// recomputation.
#[derive(Debug, Clone, Default)]
pub struct PartitionSnapshot {
    pub version: u64,
    pub buckets: BucketTable,
    pub partition: Partition,
}

impl PartitionSnapshot {
    /// Owner of an entry. Entries not yet registered are routed through the
    /// mapper, so data for a brand new trigger already lands on the member
    /// that will own it.
    pub fn owner_of(&self, entry: &PartitionEntry) -> Option<MemberId> {
        if let Some(owner) = self.partition.get(entry) {
            return Some(*owner);
        }
        if self.buckets.is_empty() {
            return None;
        }
        self.buckets
            .owner(map_entry(entry, self.buckets.bucket_count()))
    }

    pub fn entries_of(&self, member: MemberId) -> Vec<PartitionEntry> {
        let mut entries: Vec<PartitionEntry> = self
            .partition
            .iter()
            .filter(|(_, owner)| **owner == member)
            .map(|(entry, _)| entry.clone())
            .collect();
        entries.sort();
        entries
    }
}

#[derive(Default)]
struct WriterState {
    entries: HashSet<PartitionEntry>,
}

/// Decides which member evaluates which trigger.
///
/// Writes (membership changes and trigger definitions) go through a single
/// writer lock, so every recomputation classifies against one consistent
/// table. Reads are served from a [`PartitionSnapshot`] published through a
/// watch channel; readers clone an `Arc` and never see a half-applied
/// update.
///
/// Resulting per-member changes are queued and handed to registered
/// [`PartitionListener`]s by a dispatcher task started with [`start`].
/// Events produced before `start` are buffered.
///
/// [`start`]: PartitionManager::start
pub struct PartitionManager {
    writer: Mutex<WriterState>,
    snapshot_tx: watch::Sender<Arc<PartitionSnapshot>>,
    events_tx: mpsc::UnboundedSender<ListenerEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<ListenerEvent>>>,
    listeners: ListenerRegistry,
    cancel: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Default for PartitionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitionManager {
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(PartitionSnapshot::default()));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            writer: Mutex::new(WriterState::default()),
            snapshot_tx,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            listeners: ListenerRegistry::default(),
            cancel: CancellationToken::new(),
            dispatcher: Mutex::new(None),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the listener dispatcher. Must be called from within a tokio
    /// runtime, and only once.
    pub fn start(&self) -> Result<()> {
        let events = lock(&self.events_rx)
            .take()
            .ok_or(Error::AlreadyStarted)?;
        let handle = tokio::spawn(dispatch_loop(
            events,
            self.listeners.clone(),
            self.cancel.child_token(),
        ));
        *lock(&self.dispatcher) = Some(handle);
        tracing::info!("partition manager started");
        Ok(())
    }

    /// Stop the dispatcher after delivering the events already queued.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = lock(&self.dispatcher).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "listener dispatcher panicked");
            }
        }
        tracing::info!("partition manager stopped");
    }

    pub fn register_listener(&self, member: MemberId, listener: Arc<dyn PartitionListener>) {
        self.listeners.register(member, listener);
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Arc<PartitionSnapshot> {
        Arc::clone(&self.snapshot_tx.borrow())
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<PartitionSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn owner_of(&self, entry: &PartitionEntry) -> Option<MemberId> {
        self.snapshot().owner_of(entry)
    }

    pub fn bucket_count(&self) -> usize {
        self.snapshot().buckets.len()
    }

    /// Current members in bucket order.
    pub fn members(&self) -> Vec<MemberId> {
        self.snapshot().buckets.members()
    }

    pub fn buckets(&self) -> BucketTable {
        self.snapshot().buckets.clone()
    }

    pub fn local_entries(&self, member: MemberId) -> Vec<PartitionEntry> {
        self.snapshot().entries_of(member)
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Recompute buckets and partition for a new member set and notify the
    /// members whose share changed.
    ///
    /// An empty member list is rejected and the current table kept.
    pub fn on_membership_change(&self, members: &[MemberId]) -> Result<()> {
        let writer = lock(&self.writer);
        let current = self.snapshot();

        let buckets = match recompute_buckets(&current.buckets, members) {
            Ok(buckets) => buckets,
            Err(e) => {
                tracing::warn!(error = %e, "rejecting membership change, keeping current bucket table");
                metrics::counter!(MEMBERSHIP_REJECTED_COUNTER).increment(1);
                return Err(e);
            }
        };

        if buckets == current.buckets {
            tracing::debug!(members = members.len(), "membership change left bucket table unchanged");
            return Ok(());
        }

        let partition = compute_partition(&writer.entries, &buckets);
        let reassigned = count_reassigned(&current.partition, &partition);
        let changes = diff_all(&current.partition, &partition);

        tracing::info!(
            old_buckets = current.buckets.len(),
            new_buckets = buckets.len(),
            entries = partition.len(),
            reassigned,
            "rebalanced bucket table"
        );
        metrics::counter!(REBALANCES_COUNTER).increment(1);
        metrics::counter!(ENTRIES_REASSIGNED_COUNTER).increment(reassigned as u64);

        self.publish(&current, buckets, partition);

        for change in changes {
            tracing::debug!(
                member = %change.member,
                added = change.added_count(),
                removed = change.removed_count(),
                "queueing partition change"
            );
            self.emit(ListenerEvent::Partition(change));
        }

        Ok(())
    }

    /// Register entries in bulk, e.g. after loading all triggers at startup.
    /// Owners of the new entries receive a partition change.
    pub fn add_entries<I>(&self, entries: I)
    where
        I: IntoIterator<Item = PartitionEntry>,
    {
        let mut writer = lock(&self.writer);
        let current = self.snapshot();

        let before = writer.entries.len();
        writer.entries.extend(entries);
        if writer.entries.len() == before {
            return;
        }

        let partition = compute_partition(&writer.entries, &current.buckets);
        let changes = diff_all(&current.partition, &partition);
        self.publish(&current, current.buckets.clone(), partition);

        for change in changes {
            self.emit(ListenerEvent::Partition(change));
        }
    }

    /// Apply a single trigger change from the definitions store and route it
    /// to its owner. Returns the owner, or `None` while no bucket table
    /// exists yet (the entry is then picked up by the next rebalance).
    ///
    /// An `Update` for an entry the manager does not know yet registers it,
    /// so later rebalances move it like any other entry.
    pub fn notify_trigger(
        &self,
        operation: TriggerOperation,
        entry: PartitionEntry,
    ) -> Option<MemberId> {
        let mut writer = lock(&self.writer);
        let current = self.snapshot();
        let owner = current.owner_of(&entry);

        let changed = match operation {
            TriggerOperation::Add | TriggerOperation::Update => {
                writer.entries.insert(entry.clone())
            }
            TriggerOperation::Remove => writer.entries.remove(&entry),
        };

        if changed {
            let mut partition = current.partition.clone();
            match (operation, owner) {
                (TriggerOperation::Add | TriggerOperation::Update, Some(owner)) => {
                    partition.insert(entry.clone(), owner);
                }
                _ => {
                    partition.remove(&entry);
                }
            }
            self.publish(&current, current.buckets.clone(), partition);
        }

        match owner {
            Some(owner) => {
                tracing::debug!(%entry, %owner, ?operation, "routing trigger change");
                self.emit(ListenerEvent::Trigger(TriggerChange {
                    operation,
                    entry,
                    owner,
                }));
            }
            None => {
                tracing::debug!(%entry, ?operation, "no bucket table yet, trigger change recorded");
            }
        }

        owner
    }

    fn publish(&self, current: &PartitionSnapshot, buckets: BucketTable, partition: Partition) {
        metrics::gauge!(BUCKET_COUNT_GAUGE).set(buckets.len() as f64);
        metrics::gauge!(PARTITION_ENTRIES_GAUGE).set(partition.len() as f64);

        self.snapshot_tx.send_replace(Arc::new(PartitionSnapshot {
            version: current.version + 1,
            buckets,
            partition,
        }));
    }

    fn emit(&self, event: ListenerEvent) {
        if self.events_tx.send(event).is_err() {
            tracing::debug!("listener queue closed, dropping event");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
