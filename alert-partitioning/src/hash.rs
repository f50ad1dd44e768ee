use std::hash::Hasher;

use siphasher::sip::SipHasher13;

use crate::types::PartitionEntry;

/// Map an entry to a bucket in `0..bucket_count`.
///
/// The entry key is hashed with SipHash-1-3 under fixed keys, so the result
/// is identical on every node and across restarts. The hash is then folded
/// into the bucket range with jump consistent hashing: when the bucket count
/// changes from N to N+1 only ~1/(N+1) of the entries move, all of them into
/// the new last bucket.
pub fn map_entry(entry: &PartitionEntry, bucket_count: u32) -> u32 {
    assert!(bucket_count > 0, "bucket_count must be positive");
    jump_bucket(entry_hash(entry), bucket_count)
}

fn entry_hash(entry: &PartitionEntry) -> u64 {
    let mut hasher = SipHasher13::new();
    hasher.write(entry.tenant_id.as_bytes());
    hasher.write(b":");
    hasher.write(entry.trigger_id.as_bytes());
    hasher.finish()
}

// Lamping & Veach, "A Fast, Minimal Memory, Consistent Hash Algorithm"
// https://arxiv.org/abs/1406.2294
fn jump_bucket(mut key: u64, bucket_count: u32) -> u32 {
    let mut bucket: i64 = -1;
    let mut next: i64 = 0;

    while next < i64::from(bucket_count) {
        bucket = next;
        key = key.wrapping_mul(2862933555777941757).wrapping_add(1);
        next = ((bucket + 1) as f64 * (f64::from(1u32 << 31) / ((key >> 33) + 1) as f64)) as i64;
    }

    u32::try_from(bucket).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entries(n: usize) -> Vec<PartitionEntry> {
        (0..n)
            .map(|i| PartitionEntry::new(format!("tenant-{}", i % 7), format!("trigger-{i}")))
            .collect()
    }

    #[test]
    fn mapping_is_deterministic() {
        for entry in entries(200) {
            let a = map_entry(&entry, 10);
            let b = map_entry(&entry.clone(), 10);
            assert_eq!(a, b, "{entry} produced different buckets");
        }
    }

    #[test]
    fn mapping_is_within_range() {
        for entry in entries(1000) {
            let bucket = map_entry(&entry, 7);
            assert!(bucket < 7, "{entry} mapped to {bucket}");
        }
    }

    #[test]
    fn single_bucket() {
        for entry in entries(100) {
            assert_eq!(map_entry(&entry, 1), 0);
        }
    }

    #[test]
    #[should_panic(expected = "bucket_count must be positive")]
    fn zero_buckets_panics() {
        map_entry(&PartitionEntry::new("t", "x"), 0);
    }

    #[test]
    fn tenant_is_part_of_the_key() {
        let moved = (0..200)
            .filter(|i| {
                let trigger = format!("trigger-{i}");
                map_entry(&PartitionEntry::new("tenant-a", &trigger), 64)
                    != map_entry(&PartitionEntry::new("tenant-b", &trigger), 64)
            })
            .count();
        assert!(moved > 150, "only {moved} of 200 triggers depend on the tenant");
    }

    #[test]
    fn growth_moves_entries_only_into_the_new_bucket() {
        let all = entries(10_000);
        let mut moved = 0;
        for entry in &all {
            let old = map_entry(entry, 5);
            let new = map_entry(entry, 6);
            if old != new {
                assert_eq!(new, 5, "{entry} moved from {old} to {new}");
                moved += 1;
            }
        }

        let moved_pct = moved as f64 / all.len() as f64;
        assert!(
            (moved_pct - 1.0 / 6.0).abs() < 0.05,
            "moved {moved_pct:.2}, expected ~0.17"
        );
    }

    #[test]
    fn distribution_is_roughly_even() {
        let all = entries(10_000);
        let mut counts: HashMap<u32, usize> = HashMap::new();
        for entry in &all {
            *counts.entry(map_entry(entry, 5)).or_default() += 1;
        }

        let expected = all.len() / 5;
        for bucket in 0..5 {
            let count = counts.get(&bucket).copied().unwrap_or(0);
            let deviation = (count as f64 - expected as f64).abs() / expected as f64;
            assert!(
                deviation < 0.1,
                "bucket {bucket} has {count} entries, expected ~{expected}"
            );
        }
    }
}
