//! Long-running engine loops.
//!
//! Two free-running worker threads — one orchestrator loop, one reconciler
//! loop — each paced by `recv_timeout` on a shared shutdown channel, so the
//! pacing sleep doubles as the shutdown listener and `shutdown()` is prompt.
//! Each loop degrades independently: a failed pass is logged and retried on
//! the next tick, never propagated.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::reconcile::Reconciler;
use crate::scheduler::{Orchestrator, VillageContext};

/// Pacing for the two loops.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Delay between orchestrator cycles.
    pub cycle_interval: Duration,
    /// Delay between reconciliation passes.
    pub reconcile_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(60),
            reconcile_interval: Duration::from_secs(30),
        }
    }
}

/// Wall clock as epoch seconds.
fn now_epoch() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Owns the orchestrator and reconciler threads.
pub struct EngineRuntime {
    shutdown_tx: Option<Sender<()>>,
    handles: Vec<JoinHandle<()>>,
}

impl EngineRuntime {
    /// Starts both loops. The orchestrator cycles every village in
    /// `villages` per tick; the reconciler runs one pass per tick.
    #[must_use]
    pub fn start(
        orchestrator: Orchestrator,
        reconciler: Reconciler,
        villages: Vec<VillageContext>,
        config: RuntimeConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let orchestrator_rx = shutdown_rx.clone();
        let cycle_interval = config.cycle_interval;
        let orchestrator_handle = thread::Builder::new()
            .name("raidcore-orchestrator".to_string())
            .spawn(move || {
                while tick(&orchestrator_rx, cycle_interval) {
                    for village in &villages {
                        match orchestrator.cycle(village, now_epoch()) {
                            Ok(report) => debug!(
                                village = %village.id,
                                dispatched = report.dispatched.len(),
                                "cycle finished"
                            ),
                            Err(err) => {
                                warn!(village = %village.id, error = %err, "cycle failed, retrying next tick");
                            }
                        }
                    }
                }
            })
            .expect("failed to spawn raidcore orchestrator loop");

        let reconcile_interval = config.reconcile_interval;
        let reconciler_handle = thread::Builder::new()
            .name("raidcore-reconciler".to_string())
            .spawn(move || {
                while tick(&shutdown_rx, reconcile_interval) {
                    if let Err(err) = reconciler.pass(now_epoch()) {
                        warn!(error = %err, "reconciliation pass failed, retrying next tick");
                    }
                }
            })
            .expect("failed to spawn raidcore reconciler loop");

        Self {
            shutdown_tx: Some(shutdown_tx),
            handles: vec![orchestrator_handle, reconciler_handle],
        }
    }

    /// Stops both loops and joins them deterministically.
    pub fn shutdown(&mut self) {
        // Dropping the sender disconnects every receiver; blocked
        // recv_timeout calls wake immediately.
        drop(self.shutdown_tx.take());
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for EngineRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sleeps one pacing interval. Returns false when shutdown was signalled.
fn tick(shutdown_rx: &Receiver<()>, interval: Duration) -> bool {
    match shutdown_rx.recv_timeout(interval) {
        Err(RecvTimeoutError::Timeout) => true,
        Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
    }
}
