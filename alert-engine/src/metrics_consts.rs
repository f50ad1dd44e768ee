/// Gauge for dampenings loaded on a node, labelled by member
pub const LOADED_DAMPENINGS_GAUGE: &str = "alerting_engine_loaded_dampenings";

/// Counter for alerts handed to the alert sink
pub const ALERTS_SENT_COUNTER: &str = "alerting_engine_alerts_sent_total";

/// Counter for alert sink failures
pub const ALERT_SINK_FAILURES_COUNTER: &str = "alerting_engine_alert_sink_failures_total";

/// Counter for triggers whose dampenings could not be loaded from the definitions store
pub const DEFINITION_LOAD_FAILURES_COUNTER: &str = "alerting_engine_definition_load_failures_total";

/// Counter for member sets applied to the partition manager
pub const MEMBERSHIP_UPDATES_COUNTER: &str = "alerting_engine_membership_updates_total";
