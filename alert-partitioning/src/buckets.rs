use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::MemberId;

/// Ordered mapping bucket index -> owning member.
///
/// A table produced by [`recompute_buckets`] is dense: indices `0..len` are
/// all present and every member owns exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTable {
    owners: BTreeMap<u32, MemberId>,
}

impl BucketTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Number of buckets as used by the entry mapper.
    pub fn bucket_count(&self) -> u32 {
        u32::try_from(self.owners.len()).unwrap_or(u32::MAX)
    }

    pub fn owner(&self, bucket: u32) -> Option<MemberId> {
        self.owners.get(&bucket).copied()
    }

    /// Bucket currently owned by `member`, if any (lowest index wins).
    pub fn bucket_of(&self, member: MemberId) -> Option<u32> {
        self.owners
            .iter()
            .find(|(_, owner)| **owner == member)
            .map(|(bucket, _)| *bucket)
    }

    /// Members in bucket order.
    pub fn members(&self) -> Vec<MemberId> {
        self.owners.values().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, MemberId)> + '_ {
        self.owners.iter().map(|(bucket, owner)| (*bucket, *owner))
    }
}

impl FromIterator<(u32, MemberId)> for BucketTable {
    fn from_iter<I: IntoIterator<Item = (u32, MemberId)>>(iter: I) -> Self {
        Self {
            owners: iter.into_iter().collect(),
        }
    }
}

/// Rebuild the bucket table for a new member set while moving as few
/// buckets as possible.
///
/// Members that survive keep their bucket unless it falls beyond the new
/// table size; those "overflow" members, followed by members never seen
/// before, fill the slots left by departed members in ascending order.
/// The result depends on the old table and the member *set*; input order
/// only matters for the placement of brand new members.
///
/// An empty member list is rejected: it almost certainly signals a fault in
/// the membership provider rather than an intentional scale to zero.
pub fn recompute_buckets(old: &BucketTable, new_members: &[MemberId]) -> Result<BucketTable> {
    let mut members_set = HashSet::with_capacity(new_members.len());
    let members: Vec<MemberId> = new_members
        .iter()
        .copied()
        .filter(|member| members_set.insert(*member))
        .collect();

    if members.is_empty() {
        return Err(Error::EmptyMembership);
    }

    let new_size = u32::try_from(members.len())
        .map_err(|_| Error::InvalidState("too many members".to_string()))?;

    let mut owners: BTreeMap<u32, MemberId> = BTreeMap::new();
    let mut old_owners: HashSet<MemberId> = HashSet::new();
    let mut placed: HashSet<MemberId> = HashSet::new();
    let mut overflow: Vec<MemberId> = Vec::new();

    // Ascending index order, so a member listed twice is kept at its lowest
    // index and its other slots count as freed.
    for (&bucket, &owner) in &old.owners {
        old_owners.insert(owner);
        if !members_set.contains(&owner) || !placed.insert(owner) {
            continue;
        }
        if bucket < new_size {
            owners.insert(bucket, owner);
        } else {
            overflow.push(owner);
        }
    }

    let freed: Vec<u32> = (0..new_size)
        .filter(|bucket| !owners.contains_key(bucket))
        .collect();

    let brand_new = members
        .iter()
        .copied()
        .filter(|member| !old_owners.contains(member));
    let fill_list = overflow.into_iter().chain(brand_new);

    for (bucket, member) in freed.into_iter().zip(fill_list) {
        owners.insert(bucket, member);
    }

    debug_assert_eq!(owners.len(), members.len());

    Ok(BucketTable { owners })
}
