use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

/// Liveness check against a peer's connection endpoint.
///
/// Implementations must never fail past this boundary: connection, auth and
/// timeout errors are all reported as `false`. A single call makes a single
/// attempt; retrying is the job of repeated heartbeat rounds.
pub trait HealthProbe: Send + Sync {
    /// Probe the endpoint and report whether it answered.
    fn probe<'a>(&'a self, endpoint: &'a str) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>>;
}

/// Control surface of the local database server.
///
/// The coordinator uses this to learn its role and replication mode at
/// startup and on reload, and to demote synchronous replication. The host
/// monitor pings it to notice when the server is gone.
pub trait ReplicationControl: Send + Sync {
    /// Check that the local server still answers queries.
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Whether the local server is replaying WAL.
    fn is_in_recovery(&self) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + '_>>;

    /// Whether `hot_standby` is enabled on the local server.
    fn hot_standby_enabled(&self) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + '_>>;

    /// Raw value of `synchronous_standby_names`.
    fn synchronous_standby_names(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;

    /// Persistently clear `synchronous_standby_names`.
    fn disable_sync(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Ask the server to re-read its configuration.
    fn reload_config(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
