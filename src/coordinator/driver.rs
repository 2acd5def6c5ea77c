//! Periodic background driver. Each tick hands [Coordinator::advance_all] to
//! the blocking pool so simulation work never runs on an async worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::coordinator::{Coordinator, TickReport};

/// Totals accumulated over the driver's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub ticks: u64,
    pub events_processed: u64,
    pub finalized: u64,
    pub finalize_failures: u64,
    pub snapshots: u64,
}

impl DriverStats {
    fn absorb(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.events_processed += report.events_processed as u64;
        self.finalized += report.finalized as u64;
        self.finalize_failures += report.finalize_failures as u64;
        self.snapshots += report.snapshots as u64;
    }
}

pub struct DriverHandle {
    shutdown: watch::Sender<bool>,
    cancel: Arc<AtomicBool>,
    join: JoinHandle<DriverStats>,
}

impl DriverHandle {
    /// Stops the driver. An in-flight tick stops between battles.
    pub async fn shutdown(self) -> DriverStats {
        self.cancel.store(true, Ordering::Relaxed);
        let _ = self.shutdown.send(true);
        match self.join.await {
            Ok(stats) => stats,
            Err(err) => {
                error!("battle driver task failed: {err}");
                DriverStats::default()
            }
        }
    }
}

/// Spawns the driver on the current tokio runtime.
pub fn spawn_driver(coordinator: Arc<Coordinator>, period: Duration) -> DriverHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);
    let cancel = Arc::new(AtomicBool::new(false));
    let task_cancel = Arc::clone(&cancel);

    let join = tokio::spawn(async move {
        let mut stats = DriverStats::default();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("battle driver started: period={period:?}");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let coordinator = Arc::clone(&coordinator);
                    let cancel = Arc::clone(&task_cancel);
                    match tokio::task::spawn_blocking(move || coordinator.advance_all(&cancel)).await {
                        Ok(report) => {
                            debug!("driver tick {}: {report:?}", stats.ticks + 1);
                            stats.absorb(&report);
                        }
                        Err(err) => error!("driver tick failed: {err}"),
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("battle driver stopped after {} ticks", stats.ticks);
        stats
    });

    DriverHandle {
        shutdown,
        cancel,
        join,
    }
}
