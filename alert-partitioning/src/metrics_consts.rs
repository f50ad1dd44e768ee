/// Gauge for the number of buckets (live members) in the current table
pub const BUCKET_COUNT_GAUGE: &str = "alerting_partition_bucket_count";

/// Gauge for the number of partition entries (known triggers)
pub const PARTITION_ENTRIES_GAUGE: &str = "alerting_partition_entries";

/// Counter for bucket table recomputations that changed the table
pub const REBALANCES_COUNTER: &str = "alerting_partition_rebalances_total";

/// Counter for entries whose owner changed during a rebalance
pub const ENTRIES_REASSIGNED_COUNTER: &str = "alerting_partition_entries_reassigned_total";

/// Counter for membership updates rejected (e.g. empty member list)
pub const MEMBERSHIP_REJECTED_COUNTER: &str = "alerting_partition_membership_rejected_total";

/// Counter for listener deliveries that failed or panicked
pub const LISTENER_FAILURES_COUNTER: &str = "alerting_partition_listener_failures_total";
