mod coordinator;
mod detector;
mod failover;
mod host;
mod probe;
mod registry;

pub use coordinator::{
    ConfigFileSource, CoordinatorExit, CoordinatorHandle, CoordinatorLoop, CoordinatorState,
    CoordinatorStatus, RoundReport, TunableSource, Tunables,
};
pub use detector::FailureDetector;
pub use failover::{DemotionOutcome, FailoverController};
pub use host::{HostMonitor, HostMonitorConfig};
pub use probe::PgHealthProbe;
pub use registry::NodeRegistry;
