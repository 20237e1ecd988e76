//! Periodic reconciliation loop.
//!
//! One iteration per tick, never overlapping. Each iteration is bounded by a
//! timeout; a failed or timed-out iteration is logged and retried on the next
//! tick. Shutdown is only observed while waiting for a tick, so an iteration
//! in flight always runs to completion (or to its timeout).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dsk_reconcile::{IterationError, IterationReport, ReconcileEngine};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::state::{AppState, LoopState};

#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub interval: Duration,
    pub iteration_timeout: Duration,
}

#[derive(Debug)]
pub enum IterationOutcome {
    Completed(IterationReport),
    Failed(IterationError),
    TimedOut(Duration),
}

impl IterationOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, IterationOutcome::Completed(_))
    }
}

/// Run a single bounded iteration and record its outcome.
pub async fn run_once(
    engine: &mut ReconcileEngine,
    timeout: Duration,
    state: &AppState,
) -> IterationOutcome {
    state.set_state(LoopState::Running).await;

    let outcome = match tokio::time::timeout(timeout, engine.run_iteration()).await {
        Ok(Ok(report)) => IterationOutcome::Completed(report),
        Ok(Err(e)) => IterationOutcome::Failed(e),
        Err(_) => IterationOutcome::TimedOut(timeout),
    };

    let tracked = engine.checkpoint().len();
    match &outcome {
        IterationOutcome::Completed(report) => {
            if !report.is_quiet() {
                info!(
                    posts = report.posts_published,
                    started = ?report.started,
                    resolved = ?report.resolved,
                    tracked = report.tracked,
                    "iteration complete"
                );
            }
            state.record_success(report).await;
        }
        IterationOutcome::Failed(e) => {
            warn!(error = %e, "iteration aborted");
            state.record_failure(e.to_string(), tracked).await;
        }
        IterationOutcome::TimedOut(t) => {
            warn!(timeout_secs = t.as_secs(), "iteration timed out");
            state
                .record_failure(format!("iteration timed out after {}s", t.as_secs()), tracked)
                .await;
        }
    }

    state.set_state(LoopState::Idle).await;
    outcome
}

/// Drive `engine` every `settings.interval` until `shutdown` resolves.
///
/// The first iteration starts immediately. Ticks missed by a slow iteration
/// are delayed, not bursted.
pub async fn run_loop<S>(
    mut engine: ReconcileEngine,
    settings: LoopSettings,
    state: Arc<AppState>,
    shutdown: S,
) where
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("shutdown requested, stopping reconciliation loop");
                break;
            }
            _ = ticker.tick() => {}
        }
        run_once(&mut engine, settings.iteration_timeout, &state).await;
    }

    state.set_state(LoopState::Stopped).await;
}
