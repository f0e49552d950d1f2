//! Periodic collection loop.

use crate::collector::Collector;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Runs the collector on a fixed interval until shut down.
pub struct Runner {
    collector: Collector,
    interval: Duration,
}

impl Runner {
    pub fn new(collector: Collector, interval: Duration) -> Self {
        Self {
            collector,
            interval,
        }
    }

    /// Run cycles until `shutdown` resolves. A failed cycle is logged and
    /// retried on the next tick; it never ends the loop.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutting down collection loop");
                    return;
                }
                _ = ticker.tick() => {
                    match self.collector.run_cycle().await {
                        Ok(stats) => {
                            tracing::info!(
                                containers_marked = stats.containers_marked,
                                stale_creating_marked = stats.stale_creating_marked,
                                containers_reaped = stats.containers_reaped,
                                volumes_marked = stats.volumes_marked,
                                volumes_reaped = stats.volumes_reaped,
                                skipped = stats.skipped,
                                errors = stats.errors,
                                "collection cycle complete"
                            );
                        }
                        Err(err) => {
                            tracing::error!(error = %err, "collection cycle failed; will retry");
                        }
                    }
                }
            }
        }
    }
}
