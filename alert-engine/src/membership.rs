use std::sync::Arc;
use std::time::Duration;

use alert_partitioning::{MemberId, PartitionManager};
use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::metrics_consts::MEMBERSHIP_UPDATES_COUNTER;

/// Source of cluster member sets.
#[async_trait]
pub trait MembershipProvider: Send {
    /// Wait for the next member set. `None` once the provider has nothing
    /// more to report.
    async fn next_members(&mut self) -> Option<Vec<MemberId>>;
}

/// Fixed membership, reported once.
#[derive(Debug, Clone)]
pub struct StaticMembership {
    members: Option<Vec<MemberId>>,
}

impl StaticMembership {
    pub fn new(members: Vec<MemberId>) -> Self {
        Self {
            members: Some(members),
        }
    }
}

#[async_trait]
impl MembershipProvider for StaticMembership {
    async fn next_members(&mut self) -> Option<Vec<MemberId>> {
        self.members.take()
    }
}

/// Membership pushed through a watch channel. The current value is reported
/// first, then every change; the provider ends when the sender is dropped.
#[derive(Debug)]
pub struct WatchMembership {
    rx: watch::Receiver<Vec<MemberId>>,
    reported_initial: bool,
}

impl WatchMembership {
    pub fn channel(initial: Vec<MemberId>) -> (watch::Sender<Vec<MemberId>>, Self) {
        let (tx, rx) = watch::channel(initial);
        (
            tx,
            Self {
                rx,
                reported_initial: false,
            },
        )
    }
}

#[async_trait]
impl MembershipProvider for WatchMembership {
    async fn next_members(&mut self) -> Option<Vec<MemberId>> {
        if !self.reported_initial {
            self.reported_initial = true;
            return Some(self.rx.borrow_and_update().clone());
        }
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

/// Feed member sets from `provider` into the manager until cancelled or the
/// provider ends.
///
/// Sets arriving within `debounce` of each other are collapsed into the
/// last one, so a rolling restart triggers one rebalance instead of many.
pub async fn run_membership_loop<P>(
    manager: Arc<PartitionManager>,
    mut provider: P,
    debounce: Duration,
    cancel: CancellationToken,
) -> Result<()>
where
    P: MembershipProvider,
{
    loop {
        let mut members = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            next = provider.next_members() => match next {
                Some(members) => members,
                None => return Ok(()),
            }
        };

        // Drain additional sets arriving within the debounce window
        let deadline = tokio::time::Instant::now() + debounce;
        let mut exhausted = false;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep_until(deadline) => break,
                next = provider.next_members() => match next {
                    Some(next) => members = next,
                    None => {
                        exhausted = true;
                        break;
                    }
                }
            }
        }

        apply(&manager, &members);

        if exhausted {
            tracing::info!("membership provider finished");
            return Ok(());
        }
    }
}

fn apply(manager: &PartitionManager, members: &[MemberId]) {
    tracing::info!(members = ?members, "applying cluster membership");
    metrics::counter!(MEMBERSHIP_UPDATES_COUNTER).increment(1);
    // Rejections keep the current table and are already logged by the manager.
    if let Err(e) = manager.on_membership_change(members) {
        tracing::debug!(error = %e, "membership set not applied");
    }
}
