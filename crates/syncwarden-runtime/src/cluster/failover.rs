use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use syncwarden_core::cluster::{Node, NodeRole, ReplicationControl, SyncStandbys};
use syncwarden_core::error::{Result, WardenError};

use super::detector::FailureDetector;
use super::registry::NodeRegistry;

/// Result of a failover evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemotionOutcome {
    /// Preconditions not met, nothing was issued.
    Skipped,
    /// Synchronous replication was switched off because of these peers.
    Demoted { down: Vec<String> },
}

/// Demotes synchronous replication to asynchronous when a peer is down.
///
/// The sync-active flag is the idempotency guard: it flips to false only
/// after the demotion fully succeeded, and is raised again only when a
/// refresh finds `synchronous_standby_names` set on the local server.
pub struct FailoverController {
    control: Arc<dyn ReplicationControl>,
    registry: Arc<NodeRegistry>,
    sync_active: AtomicBool,
    post_demotion_command: RwLock<Option<String>>,
    post_demotion_timeout: Duration,
}

impl FailoverController {
    /// Create a controller. Sync mode starts inactive until refreshed.
    pub fn new(
        control: Arc<dyn ReplicationControl>,
        registry: Arc<NodeRegistry>,
        post_demotion_command: Option<String>,
    ) -> Self {
        Self {
            control,
            registry,
            sync_active: AtomicBool::new(false),
            post_demotion_command: RwLock::new(post_demotion_command),
            post_demotion_timeout: Duration::from_secs(30),
        }
    }

    /// Kill the post-demotion command if it runs longer than `timeout`.
    pub fn with_post_demotion_timeout(mut self, timeout: Duration) -> Self {
        self.post_demotion_timeout = timeout;
        self
    }

    /// Whether synchronous replication is believed active.
    pub fn is_sync_active(&self) -> bool {
        self.sync_active.load(Ordering::SeqCst)
    }

    pub fn set_post_demotion_command(&self, command: Option<String>) {
        *self
            .post_demotion_command
            .write()
            .unwrap_or_else(PoisonError::into_inner) = command;
    }

    fn post_demotion_command(&self) -> Option<String> {
        self.post_demotion_command
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Read the replication mode from the local server and update the
    /// guard flag and the registry's sync flags.
    pub async fn refresh_sync_mode(&self) -> Result<bool> {
        let raw = self.control.synchronous_standby_names().await?;
        let standbys = SyncStandbys::parse(&raw)?;
        let active = standbys.is_some();

        let was_active = self.sync_active.swap(active, Ordering::SeqCst);
        self.registry.mark_sync(standbys.as_ref());

        if active != was_active {
            tracing::info!(
                synchronous_standby_names = %raw,
                sync_active = active,
                "Replication mode changed"
            );
        }
        Ok(active)
    }

    /// Demote to asynchronous replication if this node is the primary, sync
    /// replication is active and at least one peer is down.
    ///
    /// A failed demotion leaves the guard flag untouched so the next round
    /// tries again.
    pub async fn maybe_demote(
        &self,
        local_role: NodeRole,
        nodes: &[Node],
        detector: &FailureDetector,
    ) -> Result<DemotionOutcome> {
        if !local_role.is_primary() || !self.is_sync_active() {
            return Ok(DemotionOutcome::Skipped);
        }

        let down: Vec<String> = detector
            .down_peers(nodes)
            .into_iter()
            .map(|n| n.name.clone())
            .collect();
        if down.is_empty() {
            return Ok(DemotionOutcome::Skipped);
        }

        tracing::warn!(
            peers = ?down,
            retry_threshold = detector.retry_threshold(),
            "Peers unreachable, changing replication mode to asynchronous"
        );

        self.control.disable_sync().await.map_err(|e| {
            WardenError::DemotionCommand(format!(
                "could not clear synchronous_standby_names: {}",
                e
            ))
        })?;

        self.control.reload_config().await.map_err(|e| {
            WardenError::DemotionCommand(format!("could not reload server configuration: {}", e))
        })?;

        self.sync_active.store(false, Ordering::SeqCst);
        self.registry.clear_sync();
        tracing::info!("Replication mode changed to asynchronous");

        if let Some(command) = self.post_demotion_command() {
            tracing::info!(command, "Running post-demotion command");
            match run_post_demotion_command(&command, self.post_demotion_timeout).await {
                Ok(()) => tracing::debug!(command, "Post-demotion command finished"),
                Err(e) => tracing::warn!(command, error = %e, "Post-demotion command failed"),
            }
        }

        Ok(DemotionOutcome::Demoted { down })
    }
}

/// Run `command` through `sh -c`. The demotion already happened, so the
/// outcome is only reported.
async fn run_post_demotion_command(command: &str, timeout: Duration) -> Result<()> {
    let mut child = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .kill_on_drop(true)
        .spawn()?;

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => {
            let status = status?;
            if status.success() {
                Ok(())
            } else {
                Err(WardenError::DemotionCommand(format!(
                    "post-demotion command exited with {}",
                    status
                )))
            }
        }
        Err(_) => {
            child.kill().await?;
            Err(WardenError::DemotionCommand(format!(
                "post-demotion command killed after {:?}",
                timeout
            )))
        }
    }
}
