//! SyncWarden - heartbeat membership and sync-to-async failover for a
//! PostgreSQL primary and its standbys.

mod runtime;

pub use syncwarden_core;
pub use syncwarden_runtime;

pub use runtime::{Cluster, Warden, WardenBuilder};
