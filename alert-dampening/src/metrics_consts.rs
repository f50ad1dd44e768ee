/// Counter for evaluation cycles fed into dampenings
pub const DAMPENING_EVALUATIONS_COUNTER: &str = "alerting_dampening_evaluations_total";

/// Counter for satisfied dampenings (fire decisions), labelled by type
pub const DAMPENING_SATISFIED_COUNTER: &str = "alerting_dampening_satisfied_total";

/// Counter for evaluations dropped because the trigger is not loaded locally
pub const DAMPENING_NOT_LOADED_COUNTER: &str = "alerting_dampening_not_loaded_total";
