//! Background expiry of idle sessions.
//!
//! The sweeper is a repeating tokio task tied to a [`SweeperGuard`].
//! Dropping the guard (or calling [`SweeperGuard::shutdown`]) stops it.

use crate::store::SessionStore;
use cb_core::SessionConfig;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperConfig {
    /// Time between sweeps.
    pub period: Duration,
    /// Idle time after which a session is removed.
    pub ttl: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SweeperConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            period: config.sweep_interval(),
            ttl: config.ttl(),
        }
    }
}

pub struct Sweeper;

impl Sweeper {
    /// Start sweeping `store`. The first sweep runs immediately, then once
    /// per `config.period` until the returned guard is shut down or dropped.
    /// Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<SessionStore>, config: SweeperConfig) -> SweeperGuard {
        let token = CancellationToken::new();
        let handle = tokio::spawn(run(store, config, token.clone()));
        tracing::info!(
            period_secs = config.period.as_secs(),
            ttl_secs = config.ttl.as_secs(),
            "Session sweeper started"
        );
        SweeperGuard {
            token,
            handle: Some(handle),
        }
    }

    /// One sweep pass. A panic inside the pass is logged and swallowed so
    /// the caller's schedule keeps going. Returns how many sessions were
    /// removed.
    pub fn sweep_once(store: &SessionStore, ttl: Duration) -> usize {
        tracing::debug!("Sweeping expired conversation memories");
        match catch_unwind(AssertUnwindSafe(|| store.sweep(ttl))) {
            Ok(removed) => {
                tracing::info!(removed = removed.len(), "Sweep of expired conversation memories finished");
                removed.len()
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                tracing::error!(%reason, "Session sweep failed; retrying on next tick");
                0
            }
        }
    }
}

async fn run(store: Arc<SessionStore>, config: SweeperConfig, token: CancellationToken) {
    let mut interval = tokio::time::interval(config.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {
                Sweeper::sweep_once(&store, config.ttl);
            }
        }
    }
    tracing::info!("Session sweeper stopped");
}

/// Owns the running sweeper. Cancels it when dropped.
pub struct SweeperGuard {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl SweeperGuard {
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel and wait for the task to wind down.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Session sweeper task ended abnormally");
            }
        }
    }
}

impl Drop for SweeperGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
