//! Node-side alerting engine: hosts the partition manager, keeps the
//! dampenings of the triggers this member owns and forwards fire decisions
//! to an alert sink.

pub mod config;
pub mod definitions;
pub mod engine;
pub mod error;
pub mod membership;
pub mod metrics_consts;
pub mod server;
pub mod sink;

pub use config::Config;
pub use definitions::{DefinitionsStore, InMemoryDefinitionsStore};
pub use engine::AlertsEngine;
pub use error::{Error, Result};
pub use membership::{run_membership_loop, MembershipProvider, StaticMembership, WatchMembership};
pub use sink::{AlertSink, ChannelAlertSink, LoggingAlertSink, SatisfiedAlert};
