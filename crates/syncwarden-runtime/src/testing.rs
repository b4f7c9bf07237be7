//! In-memory collaborators for exercising the coordinator without a server.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use syncwarden_core::cluster::{HealthProbe, ReplicationControl};
use syncwarden_core::error::{Result, WardenError};

/// Probe with scripted per-endpoint answers. Unknown endpoints are up.
#[derive(Default)]
pub struct ScriptedProbe {
    answers: Mutex<HashMap<String, bool>>,
    calls: Mutex<HashMap<String, u32>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make probes of `endpoint` succeed or fail.
    pub fn set(&self, endpoint: &str, up: bool) {
        self.answers
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), up);
    }

    /// Slow every probe down by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// How many times `endpoint` was probed.
    pub fn calls(&self, endpoint: &str) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }
}

impl HealthProbe for ScriptedProbe {
    fn probe<'a>(&'a self, endpoint: &'a str) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            *self
                .calls
                .lock()
                .unwrap()
                .entry(endpoint.to_string())
                .or_insert(0) += 1;

            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            self.answers
                .lock()
                .unwrap()
                .get(endpoint)
                .copied()
                .unwrap_or(true)
        })
    }
}

/// Local server stand-in that records demotion commands.
pub struct MockReplication {
    alive: AtomicBool,
    in_recovery: bool,
    hot_standby: AtomicBool,
    sync_names: Mutex<String>,
    disable_calls: AtomicU32,
    reload_calls: AtomicU32,
    fail_disable: AtomicBool,
    fail_reload: AtomicBool,
}

impl MockReplication {
    pub fn new(in_recovery: bool, sync_names: &str) -> Self {
        Self {
            alive: AtomicBool::new(true),
            in_recovery,
            hot_standby: AtomicBool::new(true),
            sync_names: Mutex::new(sync_names.to_string()),
            disable_calls: AtomicU32::new(0),
            reload_calls: AtomicU32::new(0),
            fail_disable: AtomicBool::new(false),
            fail_reload: AtomicBool::new(false),
        }
    }

    /// Simulate an operator changing `synchronous_standby_names`.
    pub fn set_sync_names(&self, value: &str) {
        *self.sync_names.lock().unwrap() = value.to_string();
    }

    pub fn sync_names(&self) -> String {
        self.sync_names.lock().unwrap().clone()
    }

    /// Simulate the server going away or coming back.
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub fn set_hot_standby(&self, enabled: bool) {
        self.hot_standby.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_disable(&self, fail: bool) {
        self.fail_disable.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reload(&self, fail: bool) {
        self.fail_reload.store(fail, Ordering::SeqCst);
    }

    pub fn disable_calls(&self) -> u32 {
        self.disable_calls.load(Ordering::SeqCst)
    }

    pub fn reload_calls(&self) -> u32 {
        self.reload_calls.load(Ordering::SeqCst)
    }
}

impl ReplicationControl for MockReplication {
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.alive.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(WardenError::Database("connection refused".to_string()))
            }
        })
    }

    fn is_in_recovery(&self) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + '_>> {
        Box::pin(async move { Ok(self.in_recovery) })
    }

    fn hot_standby_enabled(&self) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + '_>> {
        Box::pin(async move { Ok(self.hot_standby.load(Ordering::SeqCst)) })
    }

    fn synchronous_standby_names(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        Box::pin(async move { Ok(self.sync_names()) })
    }

    fn disable_sync(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.disable_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_disable.load(Ordering::SeqCst) {
                return Err(WardenError::Database("ALTER SYSTEM failed".to_string()));
            }
            self.set_sync_names("");
            Ok(())
        })
    }

    fn reload_config(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.reload_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_reload.load(Ordering::SeqCst) {
                return Err(WardenError::Database("pg_reload_conf failed".to_string()));
            }
            Ok(())
        })
    }
}
