//! Stable partitioning of (tenant, trigger) entries across cluster members.
//!
//! The [`manager::PartitionManager`] owns the bucket table, recomputes it with
//! minimal reassignment whenever membership changes, and tells each member
//! which triggers it gained and lost.

pub mod buckets;
pub mod error;
pub mod hash;
pub mod listener;
pub mod manager;
pub mod metrics_consts;
pub mod partition;
pub mod types;

pub use buckets::{recompute_buckets, BucketTable};
pub use error::{Error, Result};
pub use hash::map_entry;
pub use listener::PartitionListener;
pub use manager::{PartitionManager, PartitionSnapshot};
pub use partition::{compute_partition, diff_per_owner, Partition, PartitionDiff};
pub use types::{
    MemberId, PartitionChange, PartitionEntry, TriggerChange, TriggerOperation, TriggersByTenant,
};
