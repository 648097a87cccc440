//! Periodic reconciler loop.
//!
//! A reconciler performs one bounded sweep per tick. The loop:
//! - ticks on a fixed interval, delaying rather than bursting after a slow sweep
//! - logs and survives a failed sweep; the next tick retries
//! - exits once the shutdown signal flips, after the in-flight sweep finishes

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::domain::foundation::DomainError;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Items brought to their converged state.
    pub processed: usize,
    /// Items left for the next tick.
    pub failed: usize,
}

impl SweepReport {
    pub fn is_idle(&self) -> bool {
        self.processed == 0 && self.failed == 0
    }
}

/// One periodic convergence task.
#[async_trait]
pub trait Reconciler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs one sweep. Per-item failures go in the report; `Err` means the
    /// sweep could not start at all.
    async fn sweep(&self) -> Result<SweepReport, DomainError>;
}

/// Runs `reconciler` every `interval` until `shutdown` becomes `true`.
pub async fn run_periodic(
    reconciler: Arc<dyn Reconciler>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let name = reconciler.name();
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(reconciler = name, interval_ms = interval.as_millis() as u64, "Reconciler started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            changed = shutdown.changed() => {
                // A dropped sender also means stop.
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match reconciler.sweep().await {
                    Ok(report) if report.is_idle() => {
                        tracing::debug!(reconciler = name, "Sweep found nothing to do");
                    }
                    Ok(report) => {
                        tracing::info!(
                            reconciler = name,
                            processed = report.processed,
                            failed = report.failed,
                            "Sweep finished"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(reconciler = name, error = %e, "Sweep failed; retrying next tick");
                    }
                }
            }
        }
    }

    tracing::info!(reconciler = name, "Reconciler stopped");
}
