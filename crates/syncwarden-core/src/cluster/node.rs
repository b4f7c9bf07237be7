use serde::{Deserialize, Serialize};

use crate::error::{Result, WardenError};

/// Longest accepted node name, in bytes.
pub const MAX_NAME_LEN: usize = 63;

/// Longest accepted connection endpoint, in bytes.
pub const MAX_ENDPOINT_LEN: usize = 1023;

/// Replication role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Accepts writes and streams WAL to standbys.
    Primary,
    /// Replays WAL from the primary.
    Standby,
}

impl NodeRole {
    /// Convert to string for display and the management API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Standby => "standby",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "primary" => Some(Self::Primary),
            "standby" => Some(Self::Standby),
            _ => None,
        }
    }

    /// Role implied by `pg_is_in_recovery()`.
    pub fn from_recovery(in_recovery: bool) -> Self {
        if in_recovery {
            Self::Standby
        } else {
            Self::Primary
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, Self::Primary)
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time copy of one registered cluster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique short identifier.
    pub name: String,
    /// Postgres connection string used for probes.
    pub endpoint: String,
    /// Role recorded when the node was registered.
    pub role: NodeRole,
    /// Whether this entry is the local process.
    pub is_self: bool,
    /// Whether the node is currently a synchronous replication target.
    pub sync: bool,
    /// Consecutive failed probes.
    pub failure_count: u32,
}

impl Node {
    /// Whether this node is a peer (anything but the local entry).
    pub fn is_peer(&self) -> bool {
        !self.is_self
    }
}

/// Name and endpoint pair returned by `join`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub endpoint: String,
}

impl From<&Node> for Member {
    fn from(node: &Node) -> Self {
        Self {
            name: node.name.clone(),
            endpoint: node.endpoint.clone(),
        }
    }
}

/// Check a node name against the registry bounds.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(WardenError::InvalidArgument(
            "node name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(WardenError::InvalidArgument(format!(
            "node name must be at most {} bytes",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

/// Check an endpoint against the registry bounds.
pub fn validate_endpoint(endpoint: &str) -> Result<()> {
    if endpoint.is_empty() {
        return Err(WardenError::InvalidArgument(
            "endpoint must not be empty".to_string(),
        ));
    }
    if endpoint.len() > MAX_ENDPOINT_LEN {
        return Err(WardenError::InvalidArgument(format!(
            "endpoint must be at most {} bytes",
            MAX_ENDPOINT_LEN
        )));
    }
    Ok(())
}
