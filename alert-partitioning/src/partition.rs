use std::collections::{BTreeSet, HashMap, HashSet};

use crate::buckets::BucketTable;
use crate::hash::map_entry;
use crate::types::{MemberId, PartitionChange, PartitionEntry, TriggersByTenant};

/// Entry -> owning member, derived from the entry set and the bucket table.
pub type Partition = HashMap<PartitionEntry, MemberId>;

/// Entries gained and lost by a single member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionDiff {
    pub added: HashSet<PartitionEntry>,
    pub removed: HashSet<PartitionEntry>,
}

/// Route every entry through the entry mapper and the bucket table.
///
/// An empty table yields an empty partition.
pub fn compute_partition<'a, I>(entries: I, buckets: &BucketTable) -> Partition
where
    I: IntoIterator<Item = &'a PartitionEntry>,
{
    if buckets.is_empty() {
        return Partition::new();
    }
    let bucket_count = buckets.bucket_count();

    entries
        .into_iter()
        .filter_map(|entry| {
            buckets
                .owner(map_entry(entry, bucket_count))
                .map(|owner| (entry.clone(), owner))
        })
        .collect()
}

/// Compare two partitions from the point of view of `owner`.
pub fn diff_per_owner(prev: &Partition, curr: &Partition, owner: MemberId) -> PartitionDiff {
    let added = curr
        .iter()
        .filter(|(entry, o)| **o == owner && prev.get(*entry) != Some(&owner))
        .map(|(entry, _)| entry.clone())
        .collect();

    let removed = prev
        .iter()
        .filter(|(entry, o)| **o == owner && curr.get(*entry) != Some(&owner))
        .map(|(entry, _)| entry.clone())
        .collect();

    PartitionDiff { added, removed }
}

/// Per-member changes for every member owning entries in either partition.
/// Members whose share is unchanged are left out.
pub fn diff_all(prev: &Partition, curr: &Partition) -> Vec<PartitionChange> {
    let owners: BTreeSet<MemberId> = prev.values().chain(curr.values()).copied().collect();

    owners
        .into_iter()
        .filter_map(|member| {
            let diff = diff_per_owner(prev, curr, member);
            let change = PartitionChange {
                member,
                added: group_by_tenant(&diff.added),
                removed: group_by_tenant(&diff.removed),
            };
            (!change.is_empty()).then_some(change)
        })
        .collect()
}

/// Number of entries present in both partitions whose owner changed.
pub fn count_reassigned(prev: &Partition, curr: &Partition) -> usize {
    curr.iter()
        .filter(|(entry, owner)| prev.get(*entry).is_some_and(|old| old != *owner))
        .count()
}

pub fn group_by_tenant<'a, I>(entries: I) -> TriggersByTenant
where
    I: IntoIterator<Item = &'a PartitionEntry>,
{
    let mut grouped = TriggersByTenant::new();
    for entry in entries {
        grouped
            .entry(entry.tenant_id.clone())
            .or_default()
            .push(entry.trigger_id.clone());
    }
    for triggers in grouped.values_mut() {
        triggers.sort();
    }
    grouped
}
