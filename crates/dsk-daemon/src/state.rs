//! Shared runtime state for dsk-daemon.
//!
//! The loop runner writes the status snapshot after every iteration; the
//! status server only reads it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dsk_reconcile::IterationReport;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Where the reconciliation loop is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Booted, no iteration started yet.
    Starting,
    /// Waiting for the next tick.
    Idle,
    Running,
    /// Shutdown requested; no further iterations.
    Stopped,
}

/// Point-in-time snapshot returned by GET /v1/status.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub state: LoopState,
    pub iterations_ok: u64,
    pub iterations_failed: u64,
    pub last_error: Option<String>,
    pub last_iteration_at: Option<DateTime<Utc>>,
    pub tracked_disturbances: usize,
    pub posts_published_total: u64,
    pub config_hash: Option<String>,
}

/// Cloneable (Arc) handle shared by the runner and all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    pub status: Arc<RwLock<StatusSnapshot>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let initial_status = StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            state: LoopState::Starting,
            iterations_ok: 0,
            iterations_failed: 0,
            last_error: None,
            last_iteration_at: None,
            tracked_disturbances: 0,
            posts_published_total: 0,
            config_hash: None,
        };

        Self {
            build: BuildInfo {
                service: "dsk-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            status: Arc::new(RwLock::new(initial_status)),
        }
    }

    pub async fn set_config(&self, config_hash: &str, tracked: usize) {
        let mut st = self.status.write().await;
        st.config_hash = Some(config_hash.to_string());
        st.tracked_disturbances = tracked;
    }

    pub async fn set_state(&self, state: LoopState) {
        self.status.write().await.state = state;
    }

    pub async fn record_success(&self, report: &IterationReport) {
        let mut st = self.status.write().await;
        st.iterations_ok += 1;
        st.last_error = None;
        st.last_iteration_at = Some(Utc::now());
        st.tracked_disturbances = report.tracked;
        st.posts_published_total += report.posts_published as u64;
    }

    /// `tracked` is the engine's in-memory count after the aborted pass.
    pub async fn record_failure(&self, error: String, tracked: usize) {
        let mut st = self.status.write().await;
        st.iterations_failed += 1;
        st.last_error = Some(error);
        st.last_iteration_at = Some(Utc::now());
        st.tracked_disturbances = tracked;
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        let mut snap = self.status.read().await.clone();
        snap.daemon_uptime_secs = uptime_secs();
        snap
    }
}

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}
