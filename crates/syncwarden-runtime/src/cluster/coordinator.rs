use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;

use syncwarden_core::cluster::HealthProbe;
use syncwarden_core::config::{ClusterConfig, WardenConfig};
use syncwarden_core::error::{Result, WardenError};

use super::detector::FailureDetector;
use super::failover::{DemotionOutcome, FailoverController};
use super::registry::NodeRegistry;

/// Settings that can change on reconfiguration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tunables {
    /// Time between heartbeat rounds.
    pub probe_interval: Duration,
    /// Consecutive failures before a peer is down.
    pub retry_threshold: u32,
    /// Shell command run after demotion.
    pub post_demotion_command: Option<String>,
}

impl From<&ClusterConfig> for Tunables {
    fn from(config: &ClusterConfig) -> Self {
        Self {
            probe_interval: Duration::from_secs(config.probe_interval_secs),
            retry_threshold: config.retry_threshold,
            post_demotion_command: config.post_demotion_command.clone(),
        }
    }
}

impl Default for Tunables {
    fn default() -> Self {
        Self::from(&ClusterConfig::default())
    }
}

/// Where reconfiguration reads tunables from.
pub trait TunableSource: Send + Sync {
    fn load(&self) -> Result<Tunables>;
}

/// Fixed tunables; reloading is a no-op.
impl TunableSource for Tunables {
    fn load(&self) -> Result<Tunables> {
        Ok(self.clone())
    }
}

/// Re-reads the `[cluster]` section of the config file.
#[derive(Debug, Clone)]
pub struct ConfigFileSource {
    path: PathBuf,
}

impl ConfigFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TunableSource for ConfigFileSource {
    fn load(&self) -> Result<Tunables> {
        let config = WardenConfig::from_file(&self.path)?;
        if config.cluster.retry_threshold == 0 || config.cluster.probe_interval_secs == 0 {
            return Err(WardenError::Config(
                "retry_threshold and probe_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(Tunables::from(&config.cluster))
    }
}

/// Wake flags plus the latch the loop sleeps on.
#[derive(Default)]
struct Signals {
    reload: AtomicBool,
    terminate: AtomicBool,
    host_died: AtomicBool,
    latch: Notify,
}

impl Signals {
    fn raise(&self, flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
        // Stores a permit when the loop is busy, so the wake is not lost.
        self.latch.notify_one();
    }
}

/// Cloneable handle used by the runtime to deliver wake requests.
#[derive(Clone)]
pub struct CoordinatorHandle {
    signals: Arc<Signals>,
}

impl CoordinatorHandle {
    /// Reload tunables before the next round.
    pub fn reload(&self) {
        self.signals.raise(&self.signals.reload);
    }

    /// Stop after the current round.
    pub fn terminate(&self) {
        self.signals.raise(&self.signals.terminate);
    }

    /// The host server is gone; exit immediately.
    pub fn host_died(&self) {
        self.signals.raise(&self.signals.host_died);
    }
}

/// Coordinator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    WaitingOnTimer,
    RunningRound,
    Terminated,
}

/// Why the coordinator loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorExit {
    /// Termination was requested.
    Terminated,
    /// The host server died.
    HostDied,
}

/// Outcome of one heartbeat round.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RoundReport {
    /// Peers probed this round.
    pub probed: Vec<String>,
    /// Peers whose probe failed this round.
    pub failed: Vec<String>,
    /// Peers at or above the retry threshold after this round.
    pub down: Vec<String>,
    /// Whether replication was demoted this round.
    pub demoted: bool,
    /// Error that ended the round early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Coordinator status published after every transition.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatus {
    pub state: CoordinatorState,
    pub rounds_completed: u64,
    pub retry_threshold: u32,
    pub probe_interval_secs: u64,
    pub last_round_at: Option<DateTime<Utc>>,
    pub last_round: Option<RoundReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Timer,
    Latch,
}

/// Periodic heartbeat scheduler.
///
/// Rounds run sequentially on the task that calls [`CoordinatorLoop::run`].
/// No registry lock is held while probing or demoting.
pub struct CoordinatorLoop {
    registry: Arc<NodeRegistry>,
    probe: Arc<dyn HealthProbe>,
    failover: Arc<FailoverController>,
    source: Box<dyn TunableSource>,
    detector: FailureDetector,
    tunables: Tunables,
    signals: Arc<Signals>,
    status_tx: watch::Sender<CoordinatorStatus>,
}

impl CoordinatorLoop {
    /// Create a coordinator.
    pub fn new(
        registry: Arc<NodeRegistry>,
        probe: Arc<dyn HealthProbe>,
        failover: Arc<FailoverController>,
        source: Box<dyn TunableSource>,
        tunables: Tunables,
    ) -> Self {
        let (status_tx, _) = watch::channel(CoordinatorStatus {
            state: CoordinatorState::Idle,
            rounds_completed: 0,
            retry_threshold: tunables.retry_threshold,
            probe_interval_secs: tunables.probe_interval.as_secs(),
            last_round_at: None,
            last_round: None,
        });
        failover.set_post_demotion_command(tunables.post_demotion_command.clone());

        Self {
            registry,
            probe,
            failover,
            source,
            detector: FailureDetector::new(tunables.retry_threshold),
            tunables,
            signals: Arc::new(Signals::default()),
            status_tx,
        }
    }

    /// Handle for delivering reload/terminate/host-death wakes.
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            signals: self.signals.clone(),
        }
    }

    /// Subscribe to status updates.
    pub fn status(&self) -> watch::Receiver<CoordinatorStatus> {
        self.status_tx.subscribe()
    }

    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    fn set_state(&self, state: CoordinatorState) {
        self.status_tx.send_modify(|s| s.state = state);
    }

    /// Run until terminated or the host dies.
    pub async fn run(mut self) -> CoordinatorExit {
        let role = self.registry.local_role();
        tracing::info!(%role, interval = ?self.tunables.probe_interval, "Coordinator started");

        let mut deadline = Instant::now() + self.tunables.probe_interval;

        let exit = loop {
            if self.signals.terminate.load(Ordering::SeqCst) {
                break CoordinatorExit::Terminated;
            }

            self.set_state(CoordinatorState::WaitingOnTimer);
            let wake = tokio::select! {
                _ = tokio::time::sleep_until(deadline) => Wake::Timer,
                _ = self.signals.latch.notified() => Wake::Latch,
            };

            if self.signals.host_died.load(Ordering::SeqCst) {
                tracing::error!("Host server died, coordinator exiting");
                break CoordinatorExit::HostDied;
            }
            if self.signals.terminate.load(Ordering::SeqCst) {
                break CoordinatorExit::Terminated;
            }
            if self.signals.reload.swap(false, Ordering::SeqCst) {
                self.reconfigure().await;
            }

            if wake == Wake::Timer {
                self.set_state(CoordinatorState::RunningRound);
                let report = self.run_round().await;
                self.status_tx.send_modify(|s| {
                    s.rounds_completed += 1;
                    s.last_round_at = Some(Utc::now());
                    s.last_round = Some(report);
                });
                deadline = Instant::now() + self.tunables.probe_interval;
            }
        };

        self.set_state(CoordinatorState::Terminated);
        tracing::info!(?exit, "Coordinator stopped");
        exit
    }

    /// Reload tunables and re-read the replication mode.
    ///
    /// On failure the previous values stay in effect.
    pub async fn reconfigure(&mut self) {
        match self.source.load() {
            Ok(tunables) => {
                self.detector.set_retry_threshold(tunables.retry_threshold);
                self.failover
                    .set_post_demotion_command(tunables.post_demotion_command.clone());
                self.status_tx.send_modify(|s| {
                    s.retry_threshold = tunables.retry_threshold;
                    s.probe_interval_secs = tunables.probe_interval.as_secs();
                });
                tracing::info!(
                    interval = ?tunables.probe_interval,
                    retry_threshold = tunables.retry_threshold,
                    "Configuration reloaded"
                );
                self.tunables = tunables;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to reload configuration, keeping previous settings");
            }
        }

        if let Err(e) = self.failover.refresh_sync_mode().await {
            tracing::warn!(error = %e, "Failed to read replication mode");
        }
    }

    /// Run one heartbeat round. Errors are logged and recorded in the report.
    pub async fn run_round(&self) -> RoundReport {
        let mut report = RoundReport::default();

        if self.registry.count() <= 1 {
            return report;
        }

        let local_role = self.registry.local_role();
        let snapshot = self.registry.snapshot();

        for node in snapshot.iter().filter(|n| n.is_peer()) {
            // A standby only watches the primary.
            if !local_role.is_primary() && !node.role.is_primary() {
                continue;
            }

            let up = self.probe.probe(&node.endpoint).await;
            report.probed.push(node.name.clone());

            match self.registry.record_probe_result(&node.name, up) {
                Some(failures) if !up => {
                    report.failed.push(node.name.clone());
                    tracing::warn!(
                        peer = %node.name,
                        failures,
                        retry_threshold = self.detector.retry_threshold(),
                        "Peer did not answer"
                    );
                }
                Some(_) => tracing::trace!(peer = %node.name, "Peer is alive"),
                None => tracing::debug!(peer = %node.name, "Peer removed during round"),
            }
        }

        let nodes = self.registry.snapshot();
        report.down = self
            .detector
            .down_peers(&nodes)
            .into_iter()
            .map(|n| n.name.clone())
            .collect();

        if local_role.is_primary() {
            match self
                .failover
                .maybe_demote(local_role, &nodes, &self.detector)
                .await
            {
                Ok(DemotionOutcome::Demoted { .. }) => report.demoted = true,
                Ok(DemotionOutcome::Skipped) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Heartbeat round failed");
                    report.error = Some(e.to_string());
                }
            }
        }

        report
    }
}
