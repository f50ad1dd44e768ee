use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::metrics_consts::LISTENER_FAILURES_COUNTER;
use crate::types::{MemberId, PartitionChange, TriggerChange};

/// Receives the share of the partition that concerns one member.
///
/// Implemented by the per-node engines: on `on_partition_change` they load
/// state for added triggers and drop it for removed ones. Calls for a member
/// are delivered in the order the manager produced them, but never on the
/// recomputation path itself; a slow or failing listener only delays or
/// loses its own notification.
#[async_trait]
pub trait PartitionListener: Send + Sync {
    async fn on_partition_change(&self, change: &PartitionChange) -> anyhow::Result<()>;

    /// Called when a single trigger owned by this member is added, updated
    /// or removed. Default implementation does nothing.
    async fn on_trigger_change(&self, _change: &TriggerChange) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) enum ListenerEvent {
    Partition(PartitionChange),
    Trigger(TriggerChange),
}

impl ListenerEvent {
    fn member(&self) -> MemberId {
        match self {
            ListenerEvent::Partition(change) => change.member,
            ListenerEvent::Trigger(change) => change.owner,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ListenerEvent::Partition(_) => "partition",
            ListenerEvent::Trigger(_) => "trigger",
        }
    }
}

type Listeners = HashMap<MemberId, Vec<Arc<dyn PartitionListener>>>;

#[derive(Clone, Default)]
pub(crate) struct ListenerRegistry {
    inner: Arc<RwLock<Listeners>>,
}

impl ListenerRegistry {
    pub(crate) fn register(&self, member: MemberId, listener: Arc<dyn PartitionListener>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(member)
            .or_default()
            .push(listener);
    }

    fn listeners_for(&self, member: MemberId) -> Vec<Arc<dyn PartitionListener>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&member)
            .cloned()
            .unwrap_or_default()
    }
}

/// Deliver queued events until cancelled, then flush whatever is left.
pub(crate) async fn dispatch_loop(
    mut events: mpsc::UnboundedReceiver<ListenerEvent>,
    registry: ListenerRegistry,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => deliver(&registry, &event).await,
                None => return,
            }
        }
    }

    while let Ok(event) = events.try_recv() {
        deliver(&registry, &event).await;
    }
}

async fn deliver(registry: &ListenerRegistry, event: &ListenerEvent) {
    let member = event.member();
    let listeners = registry.listeners_for(member);
    if listeners.is_empty() {
        tracing::trace!(%member, kind = event.kind(), "no listener registered for member");
        return;
    }

    for listener in listeners {
        let call = async {
            match event {
                ListenerEvent::Partition(change) => listener.on_partition_change(change).await,
                ListenerEvent::Trigger(change) => listener.on_trigger_change(change).await,
            }
        };

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(%member, kind = event.kind(), error = ?e, "partition listener failed");
                metrics::counter!(LISTENER_FAILURES_COUNTER, "reason" => "error").increment(1);
            }
            Err(_) => {
                tracing::error!(%member, kind = event.kind(), "partition listener panicked");
                metrics::counter!(LISTENER_FAILURES_COUNTER, "reason" => "panic").increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PartitionEntry, TriggerOperation};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        changes: Mutex<Vec<PartitionChange>>,
        triggers: Mutex<Vec<TriggerChange>>,
    }

    #[async_trait]
    impl PartitionListener for Recording {
        async fn on_partition_change(&self, change: &PartitionChange) -> anyhow::Result<()> {
            self.changes.lock().await.push(change.clone());
            Ok(())
        }

        async fn on_trigger_change(&self, change: &TriggerChange) -> anyhow::Result<()> {
            self.triggers.lock().await.push(change.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl PartitionListener for Failing {
        async fn on_partition_change(&self, _change: &PartitionChange) -> anyhow::Result<()> {
            anyhow::bail!("listener is broken")
        }
    }

    struct Panicking;

    #[async_trait]
    impl PartitionListener for Panicking {
        async fn on_partition_change(&self, _change: &PartitionChange) -> anyhow::Result<()> {
            panic!("listener exploded")
        }
    }

    fn change_for(member: u64) -> PartitionChange {
        let mut change = PartitionChange {
            member: MemberId(member),
            ..Default::default()
        };
        change
            .added
            .insert("tenant".to_string(), vec!["trigger".to_string()]);
        change
    }

    #[tokio::test]
    async fn events_reach_only_the_matching_member() {
        let registry = ListenerRegistry::default();
        let one = Arc::new(Recording::default());
        let two = Arc::new(Recording::default());
        registry.register(MemberId(1), one.clone());
        registry.register(MemberId(2), two.clone());

        deliver(&registry, &ListenerEvent::Partition(change_for(1))).await;
        deliver(
            &registry,
            &ListenerEvent::Trigger(TriggerChange {
                operation: TriggerOperation::Add,
                entry: PartitionEntry::new("tenant", "other"),
                owner: MemberId(2),
            }),
        )
        .await;

        assert_eq!(one.changes.lock().await.len(), 1);
        assert!(one.triggers.lock().await.is_empty());
        assert!(two.changes.lock().await.is_empty());
        assert_eq!(two.triggers.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn failing_listeners_do_not_stop_delivery() {
        let registry = ListenerRegistry::default();
        let recording = Arc::new(Recording::default());
        registry.register(MemberId(1), Arc::new(Failing));
        registry.register(MemberId(1), Arc::new(Panicking));
        registry.register(MemberId(1), recording.clone());

        deliver(&registry, &ListenerEvent::Partition(change_for(1))).await;

        assert_eq!(recording.changes.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn dispatch_loop_flushes_on_cancel() {
        let registry = ListenerRegistry::default();
        let recording = Arc::new(Recording::default());
        registry.register(MemberId(1), recording.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(ListenerEvent::Partition(change_for(1))).unwrap();
        tx.send(ListenerEvent::Partition(change_for(1))).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        dispatch_loop(rx, registry, cancel).await;

        assert_eq!(recording.changes.lock().await.len(), 2);
    }
}
