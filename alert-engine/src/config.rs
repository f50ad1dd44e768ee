use std::time::Duration;

use alert_partitioning::MemberId;
use envconfig::Envconfig;

use crate::error::{Error, Result};

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    // ── Cluster ─────────────────────────────────────────────────────
    /// Member id of this node.
    #[envconfig(default = "1")]
    pub node_id: u64,

    /// Comma separated member ids of the whole cluster, this node included.
    #[envconfig(default = "1")]
    pub cluster_members: String,

    #[envconfig(default = "500")]
    pub membership_debounce_ms: u64,

    /// Optional JSON file with trigger definitions to load at startup.
    pub definitions_path: Option<String>,

    // ── Health / metrics server ─────────────────────────────────────
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub bind_host: String,

    #[envconfig(from = "BIND_PORT", default = "3310")]
    pub bind_port: u16,
}

impl Config {
    pub fn init_with_defaults() -> std::result::Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }

    pub fn node_member_id(&self) -> MemberId {
        MemberId(self.node_id)
    }

    pub fn cluster_member_ids(&self) -> Result<Vec<MemberId>> {
        self.cluster_members
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u64>()
                    .map(MemberId)
                    .map_err(|_| Error::InvalidMemberId(s.to_string()))
            })
            .collect()
    }

    pub fn membership_debounce(&self) -> Duration {
        Duration::from_millis(self.membership_debounce_ms)
    }
}
