use std::sync::Arc;
use std::time::Duration;

use syncwarden_core::cluster::ReplicationControl;

use super::coordinator::CoordinatorHandle;

/// Host monitor configuration.
#[derive(Debug, Clone)]
pub struct HostMonitorConfig {
    /// Interval between liveness checks.
    pub interval: Duration,
    /// Consecutive failed checks before the host counts as dead.
    pub max_failures: u32,
}

impl Default for HostMonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_failures: 4,
        }
    }
}

/// Watches the local server and tells the coordinator when it is gone.
pub struct HostMonitor {
    control: Arc<dyn ReplicationControl>,
    config: HostMonitorConfig,
}

impl HostMonitor {
    pub fn new(control: Arc<dyn ReplicationControl>, config: HostMonitorConfig) -> Self {
        Self { control, config }
    }

    /// Ping the local server until it misses `max_failures` checks in a row,
    /// then raise host death on `handle` and return.
    pub async fn run(self, handle: CoordinatorHandle) {
        let max_failures = self.config.max_failures.max(1);
        let mut failures = 0u32;

        loop {
            tokio::time::sleep(self.config.interval).await;

            match self.control.ping().await {
                Ok(()) => {
                    if failures > 0 {
                        tracing::info!(failures, "Local server answering again");
                    }
                    failures = 0;
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(failures, max_failures, error = %e, "Local server did not answer");
                    if failures >= max_failures {
                        tracing::error!("Local server lost");
                        handle.host_died();
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use syncwarden_core::cluster::NodeRole;

    use crate::cluster::{
        CoordinatorExit, CoordinatorLoop, FailoverController, NodeRegistry, Tunables,
    };
    use crate::testing::{MockReplication, ScriptedProbe};

    fn coordinator(control: Arc<MockReplication>) -> CoordinatorLoop {
        let registry = Arc::new(NodeRegistry::new(3, NodeRole::Primary));
        registry.add("me", "e0", true, false).unwrap();
        let failover = Arc::new(FailoverController::new(control, registry.clone(), None));
        let tunables = Tunables {
            probe_interval: Duration::from_secs(60),
            ..Tunables::default()
        };
        CoordinatorLoop::new(
            registry,
            Arc::new(ScriptedProbe::new()),
            failover,
            Box::new(tunables.clone()),
            tunables,
        )
    }

    fn config(max_failures: u32) -> HostMonitorConfig {
        HostMonitorConfig {
            interval: Duration::from_secs(1),
            max_failures,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_server_stops_coordinator() {
        let control = Arc::new(MockReplication::new(false, ""));
        let coordinator = coordinator(control.clone());
        let monitor = HostMonitor::new(control.clone(), config(3));
        tokio::spawn(monitor.run(coordinator.handle()));
        let running = tokio::spawn(coordinator.run());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!running.is_finished());

        control.set_alive(false);
        let exit = tokio::time::timeout(Duration::from_secs(10), running)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, CoordinatorExit::HostDied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_brief_outage_is_tolerated() {
        let control = Arc::new(MockReplication::new(false, ""));
        let coordinator = coordinator(control.clone());
        let handle = coordinator.handle();
        let monitor =
            tokio::spawn(HostMonitor::new(control.clone(), config(3)).run(handle.clone()));
        let running = tokio::spawn(coordinator.run());

        control.set_alive(false);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        control.set_alive(true);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(!monitor.is_finished());
        handle.terminate();
        assert_eq!(running.await.unwrap(), CoordinatorExit::Terminated);
    }
}
