mod cluster;
mod observability;

pub use cluster::ClusterConfig;
pub use observability::{LoggingConfig, ObservabilityConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cluster::{connect_options, validate_endpoint, validate_name, NodeRole};
use crate::error::{Result, WardenError};

/// Root configuration for SyncWarden.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WardenConfig {
    /// Local node identity.
    #[serde(default)]
    pub node: NodeConfig,

    /// Heartbeat and failover configuration.
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Management API configuration.
    #[serde(default)]
    pub api: ApiConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl WardenConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| WardenError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        toml::from_str(&content)
            .map_err(|e| WardenError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Check the settings the coordinator cannot start without.
    pub fn validate(&self) -> Result<()> {
        if self.node.name.is_empty() {
            return Err(WardenError::StartupConfig(
                "node.name must be specified".to_string(),
            ));
        }
        if self.node.endpoint.is_empty() {
            return Err(WardenError::StartupConfig(
                "node.endpoint must be specified".to_string(),
            ));
        }
        validate_name(&self.node.name)
            .and_then(|_| validate_endpoint(&self.node.endpoint))
            .and_then(|_| connect_options(&self.node.endpoint))
            .map_err(|e| WardenError::StartupConfig(e.to_string()))?;

        if self.cluster.max_nodes == 0 {
            return Err(WardenError::StartupConfig(
                "cluster.max_nodes must be at least 1".to_string(),
            ));
        }
        if self.cluster.retry_threshold == 0 {
            return Err(WardenError::StartupConfig(
                "cluster.retry_threshold must be at least 1".to_string(),
            ));
        }
        if self.cluster.probe_interval_secs == 0 {
            return Err(WardenError::StartupConfig(
                "cluster.probe_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Local node identity.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    /// Name this node registers under.
    #[serde(default)]
    pub name: String,

    /// Connection string of the local server.
    #[serde(default)]
    pub endpoint: String,

    /// Role override. Detected from the local server when unset.
    #[serde(default)]
    pub role: Option<NodeRole>,
}

/// Management API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind.
    #[serde(default = "default_api_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    7400
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let Ok(re) = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") else {
        return result;
    };

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
