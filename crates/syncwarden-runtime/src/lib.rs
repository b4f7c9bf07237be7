pub mod client;
pub mod cluster;
pub mod db;
pub mod gateway;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{join_cluster, ApiClient};
pub use cluster::{
    CoordinatorExit, CoordinatorHandle, CoordinatorLoop, FailoverController, FailureDetector,
    HostMonitor, NodeRegistry, PgHealthProbe, RoundReport, Tunables,
};
pub use db::LocalServer;
pub use gateway::{ApiError, ApiResponse, GatewayConfig, GatewayServer, GatewayState};
