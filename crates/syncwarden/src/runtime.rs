//! SyncWarden process lifecycle.
//!
//! Wires the local server, the node registry, the coordinator loop and the
//! management API together, and forwards process signals to the coordinator.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use syncwarden_core::cluster::{HealthProbe, NodeRole, ReplicationControl};
use syncwarden_core::config::WardenConfig;
use syncwarden_core::error::{Result, WardenError};
use syncwarden_runtime::cluster::{
    ConfigFileSource, CoordinatorExit, CoordinatorHandle, CoordinatorLoop, FailoverController,
    HostMonitor, HostMonitorConfig, NodeRegistry, PgHealthProbe, TunableSource, Tunables,
};
use syncwarden_runtime::db::LocalServer;
use syncwarden_runtime::gateway::{GatewayConfig, GatewayServer, GatewayState};
use syncwarden_runtime::{join_cluster, ApiClient};

/// Registry and failover controller after startup checks passed.
pub struct Cluster {
    pub registry: Arc<NodeRegistry>,
    pub failover: Arc<FailoverController>,
}

/// The SyncWarden runtime.
pub struct Warden {
    config: WardenConfig,
    config_path: Option<PathBuf>,
    control: Option<Arc<dyn ReplicationControl>>,
    probe: Option<Arc<dyn HealthProbe>>,
}

impl Warden {
    /// Create a new builder.
    pub fn builder() -> WardenBuilder {
        WardenBuilder::new()
    }

    /// Get the configuration.
    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.config.cluster.probe_timeout_secs.max(1))
    }

    /// Validate the configuration against the local server and build the
    /// registry with the local node registered in it.
    pub async fn prepare(&self, control: Arc<dyn ReplicationControl>) -> Result<Cluster> {
        self.config.validate()?;

        let detected = NodeRole::from_recovery(control.is_in_recovery().await?);
        let role = match self.config.node.role {
            Some(role) if role != detected => {
                tracing::warn!(%detected, configured = %role, "Using configured role over detected role");
                role
            }
            Some(role) => role,
            None => detected,
        };

        if !control.hot_standby_enabled().await? {
            return Err(WardenError::StartupConfig(
                "hot_standby must be enabled on the local server".to_string(),
            ));
        }

        let registry = Arc::new(NodeRegistry::new(self.config.cluster.max_nodes, role));
        registry.add(&self.config.node.name, &self.config.node.endpoint, true, false)?;

        let failover = Arc::new(
            FailoverController::new(
                control,
                registry.clone(),
                self.config.cluster.post_demotion_command.clone(),
            )
            .with_post_demotion_timeout(Duration::from_secs(
                self.config.cluster.post_demotion_timeout_secs.max(1),
            )),
        );
        let sync_active = failover.refresh_sync_mode().await?;

        tracing::info!(
            node = %self.config.node.name,
            %role,
            sync_active,
            capacity = self.config.cluster.max_nodes,
            "Local node registered"
        );

        Ok(Cluster { registry, failover })
    }

    /// Run until terminated. Returns why the coordinator stopped.
    pub async fn run(self) -> Result<CoordinatorExit> {
        tracing::info!("SyncWarden starting");
        self.config.validate()?;

        let mut local_server = None;
        let control: Arc<dyn ReplicationControl> = match &self.control {
            Some(control) => control.clone(),
            None => {
                let server =
                    LocalServer::connect(&self.config.node.endpoint, self.probe_timeout()).await?;
                local_server = Some(server.clone());
                Arc::new(server)
            }
        };

        let Cluster { registry, failover } = self.prepare(control.clone()).await?;

        if let Some(url) = &self.config.cluster.join_url {
            let client = ApiClient::new(url.clone())?;
            if let Err(e) = join_cluster(
                &client,
                &registry,
                &self.config.node.name,
                &self.config.node.endpoint,
            )
            .await
            {
                tracing::warn!(url = %url, error = %e, "Failed to join cluster");
            }
        }

        let probe: Arc<dyn HealthProbe> = match &self.probe {
            Some(probe) => probe.clone(),
            None => Arc::new(PgHealthProbe::new(self.probe_timeout())),
        };

        let tunables = Tunables::from(&self.config.cluster);
        let source: Box<dyn TunableSource> = match &self.config_path {
            Some(path) => Box::new(ConfigFileSource::new(path.clone())),
            None => Box::new(tunables.clone()),
        };

        let coordinator =
            CoordinatorLoop::new(registry.clone(), probe, failover.clone(), source, tunables);
        let handle = coordinator.handle();
        let status = coordinator.status();

        let gateway = GatewayServer::new(
            GatewayConfig::from(&self.config.api),
            GatewayState::new(
                registry,
                failover,
                coordinator.status(),
                self.config.node.name.clone(),
            ),
        );
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let gateway_task = tokio::spawn(async move {
            let shutdown = async move {
                let _ = stop_rx.await;
            };
            if let Err(e) = gateway.run(shutdown).await {
                tracing::error!("Management API error: {}", e);
            }
        });

        let monitor = HostMonitor::new(
            control,
            HostMonitorConfig {
                interval: Duration::from_secs(self.config.cluster.probe_interval_secs),
                max_failures: self.config.cluster.retry_threshold,
            },
        );
        let monitor_task = tokio::spawn(monitor.run(handle.clone()));
        let signal_task = tokio::spawn(forward_signals(handle));

        let exit = coordinator.run().await;

        monitor_task.abort();
        signal_task.abort();
        let _ = stop_tx.send(());
        if let Err(e) = gateway_task.await {
            tracing::warn!("Management API task failed: {}", e);
        }
        if let Some(server) = local_server {
            server.close().await;
        }

        let last = status.borrow().clone();
        tracing::info!(
            ?exit,
            rounds = last.rounds_completed,
            last_round_at = ?last.last_round_at,
            last_round = ?last.last_round,
            "SyncWarden stopped"
        );
        Ok(exit)
    }
}

/// Map process signals onto coordinator wakes.
#[cfg(unix)]
async fn forward_signals(handle: CoordinatorHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut hangup, mut terminate) =
        match (signal(SignalKind::hangup()), signal(SignalKind::terminate())) {
            (Ok(hangup), Ok(terminate)) => (hangup, terminate),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!("Failed to install signal handlers: {}", e);
                return;
            }
        };

    loop {
        tokio::select! {
            _ = hangup.recv() => {
                tracing::info!("Received SIGHUP, reloading configuration");
                handle.reload();
            }
            _ = terminate.recv() => {
                tracing::info!("Received SIGTERM");
                handle.terminate();
                return;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal");
                handle.terminate();
                return;
            }
        }
    }
}

#[cfg(not(unix))]
async fn forward_signals(handle: CoordinatorHandle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Received shutdown signal");
    }
    handle.terminate();
}

/// Builder for configuring the SyncWarden runtime.
pub struct WardenBuilder {
    config: Option<WardenConfig>,
    config_path: Option<PathBuf>,
    control: Option<Arc<dyn ReplicationControl>>,
    probe: Option<Arc<dyn HealthProbe>>,
}

impl WardenBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: None,
            config_path: None,
            control: None,
            probe: None,
        }
    }

    /// Set the configuration.
    pub fn config(mut self, config: WardenConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load configuration from `path`; reloads re-read the same file.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Use `control` instead of connecting to `node.endpoint`.
    pub fn replication_control(mut self, control: Arc<dyn ReplicationControl>) -> Self {
        self.control = Some(control);
        self
    }

    /// Use `probe` instead of the Postgres probe.
    pub fn health_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Build the runtime.
    pub fn build(self) -> Result<Warden> {
        let config = match (self.config, &self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => WardenConfig::from_file(path)?,
            (None, None) => {
                return Err(WardenError::Config("Configuration is required".to_string()))
            }
        };

        Ok(Warden {
            config,
            config_path: self.config_path,
            control: self.control,
            probe: self.probe,
        })
    }
}

impl Default for WardenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use syncwarden_runtime::testing::{MockReplication, ScriptedProbe};

    fn config() -> WardenConfig {
        WardenConfig::parse_toml(
            r#"
            [node]
            name = "node1"
            endpoint = "postgres://node1/postgres"

            [cluster]
            max_nodes = 3
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_builder_requires_config() {
        assert!(WardenBuilder::new().build().is_err());
    }

    #[test]
    fn test_builder_loads_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[node]\nname = \"n1\"\nendpoint = \"postgres://n1/postgres\"").unwrap();

        let warden = Warden::builder().config_file(file.path()).build().unwrap();
        assert_eq!(warden.config().node.name, "n1");
    }

    #[tokio::test]
    async fn test_prepare_registers_primary() {
        let control = Arc::new(MockReplication::new(false, "FIRST 1 (node2)"));
        let warden = Warden::builder().config(config()).build().unwrap();

        let cluster = warden.prepare(control).await.unwrap();
        assert_eq!(cluster.registry.local_role(), NodeRole::Primary);
        assert_eq!(cluster.registry.capacity(), 3);
        assert_eq!(cluster.registry.count(), 1);
        assert!(cluster.registry.get("node1").unwrap().is_self);
        assert!(cluster.failover.is_sync_active());
    }

    #[tokio::test]
    async fn test_prepare_detects_standby() {
        let control = Arc::new(MockReplication::new(true, ""));
        let warden = Warden::builder().config(config()).build().unwrap();

        let cluster = warden.prepare(control).await.unwrap();
        assert_eq!(cluster.registry.local_role(), NodeRole::Standby);
        assert!(!cluster.failover.is_sync_active());
    }

    #[tokio::test]
    async fn test_prepare_requires_hot_standby() {
        let control = Arc::new(MockReplication::new(false, ""));
        control.set_hot_standby(false);
        let warden = Warden::builder().config(config()).build().unwrap();

        let err = warden.prepare(control).await.err().unwrap();
        assert!(matches!(err, WardenError::StartupConfig(_)));
    }

    #[tokio::test]
    async fn test_prepare_rejects_missing_name() {
        let mut config = config();
        config.node.name.clear();
        let warden = Warden::builder().config(config).build().unwrap();

        let err = warden
            .prepare(Arc::new(MockReplication::new(false, "")))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, WardenError::StartupConfig(_)));
    }

    #[tokio::test]
    async fn test_run_exits_when_local_server_is_lost() {
        let mut config = config();
        config.api.port = 0;
        config.cluster.probe_interval_secs = 1;
        config.cluster.retry_threshold = 2;

        let control = Arc::new(MockReplication::new(false, "FIRST 1 (node2)"));
        let warden = Warden::builder()
            .config(config)
            .replication_control(control.clone())
            .health_probe(Arc::new(ScriptedProbe::new()))
            .build()
            .unwrap();
        let running = tokio::spawn(warden.run());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!running.is_finished());

        control.set_alive(false);
        let exit = tokio::time::timeout(Duration::from_secs(10), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(exit, CoordinatorExit::HostDied);
    }

    #[tokio::test]
    async fn test_configured_role_wins() {
        let mut config = config();
        config.node.role = Some(NodeRole::Standby);
        let warden = Warden::builder().config(config).build().unwrap();

        let cluster = warden
            .prepare(Arc::new(MockReplication::new(false, "")))
            .await
            .unwrap();
        assert_eq!(cluster.registry.local_role(), NodeRole::Standby);
    }
}
