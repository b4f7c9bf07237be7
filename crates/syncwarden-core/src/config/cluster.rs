use serde::{Deserialize, Serialize};

/// Cluster configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Registry capacity. Fixed at process start.
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,

    /// Seconds between heartbeat rounds.
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// Consecutive failed probes before a peer is considered down.
    #[serde(default = "default_retry_threshold")]
    pub retry_threshold: u32,

    /// Upper bound on a single probe, connect included.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Shell command run after a successful demotion.
    #[serde(default)]
    pub post_demotion_command: Option<String>,

    /// Seconds before a running post-demotion command is killed.
    #[serde(default = "default_post_demotion_timeout")]
    pub post_demotion_timeout_secs: u64,

    /// Management API of the primary to join at startup.
    #[serde(default)]
    pub join_url: Option<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_nodes: default_max_nodes(),
            probe_interval_secs: default_probe_interval(),
            retry_threshold: default_retry_threshold(),
            probe_timeout_secs: default_probe_timeout(),
            post_demotion_command: None,
            post_demotion_timeout_secs: default_post_demotion_timeout(),
            join_url: None,
        }
    }
}

fn default_max_nodes() -> usize {
    10
}

fn default_probe_interval() -> u64 {
    5
}

fn default_retry_threshold() -> u32 {
    4
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_post_demotion_timeout() -> u64 {
    30
}
