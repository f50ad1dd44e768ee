use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a cluster member.
///
/// Only equality, ordering and hashing are relied upon; the number itself
/// carries no meaning for the partitioning logic.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MemberId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A (tenant, trigger) pair, the unit of work distributed across the cluster.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionEntry {
    pub tenant_id: String,
    pub trigger_id: String,
}

impl PartitionEntry {
    pub fn new(tenant_id: impl Into<String>, trigger_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            trigger_id: trigger_id.into(),
        }
    }
}

impl fmt::Display for PartitionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.trigger_id)
    }
}

/// Trigger ids grouped by tenant. Both levels are sorted so that events are
/// reproducible and easy to assert on.
pub type TriggersByTenant = BTreeMap<String, Vec<String>>;

/// Change reported by the definitions store for a single trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerOperation {
    Add,
    Update,
    Remove,
}

/// Triggers gained and lost by one member after a repartition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionChange {
    pub member: MemberId,
    pub added: TriggersByTenant,
    pub removed: TriggersByTenant,
}

impl PartitionChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn added_count(&self) -> usize {
        self.added.values().map(Vec::len).sum()
    }

    pub fn removed_count(&self) -> usize {
        self.removed.values().map(Vec::len).sum()
    }
}

/// A single trigger routed to the member that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerChange {
    pub operation: TriggerOperation,
    pub entry: PartitionEntry,
    pub owner: MemberId,
}
