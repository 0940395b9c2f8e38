//! Delivery reconciliation scheduler.
//!
//! Polls the courier for every in-flight delivery on a fixed interval and
//! applies the reported state through the lifecycle engine. One slow or
//! broken delivery never blocks the others.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::engine::OrderLifecycle;
use crate::order::{Order, OrderStatus};

use super::config::SchedulerConfig;

/// What happened to one order during a reconciliation pass.
enum ReconcileOutcome {
    Applied,
    Unchanged,
    Failed,
}

/// Counters for one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    /// In-flight orders considered.
    pub checked: usize,
    /// Orders whose status moved.
    pub applied: usize,
    /// Orders already converged or raced.
    pub unchanged: usize,
    /// Orders that could not be reconciled this pass.
    pub failed: usize,
}

/// The delivery reconciliation scheduler.
pub struct DeliveryReconciler {
    config: SchedulerConfig,
    engine: Arc<OrderLifecycle>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl DeliveryReconciler {
    pub fn new(config: SchedulerConfig, engine: Arc<OrderLifecycle>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            engine,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start the reconciliation loop (spawns a background task).
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Reconciler already running");
            return;
        }

        info!(
            interval_secs = self.config.interval_secs,
            "Starting delivery reconciler"
        );

        let reconciler = Arc::clone(self);
        let running = Arc::clone(&self.running);
        let interval = Duration::from_secs(self.config.interval_secs);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Reconciliation loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Reconciliation loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        let stats = reconciler.tick().await;
                        if stats.checked > 0 {
                            debug!(
                                checked = stats.checked,
                                applied = stats.applied,
                                failed = stats.failed,
                                "Reconciliation pass finished"
                            );
                        }
                    }
                }
            }
            info!("Reconciliation loop stopped");
        });
    }

    /// Stop the reconciler gracefully. An in-flight pass finishes; no new
    /// pass starts.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Reconciler not running");
            return;
        }

        info!("Stopping delivery reconciler");
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Run one reconciliation pass over all in-flight deliveries.
    ///
    /// Also the deterministic entry point for tests; the background loop
    /// just calls this on a timer.
    pub async fn tick(&self) -> ReconcileStats {
        let orders = match self
            .engine
            .store()
            .list_by_status(&[OrderStatus::RequestDelivery, OrderStatus::Delivering])
        {
            Ok(orders) => orders,
            Err(e) => {
                warn!(error = %e, "Failed to list in-flight deliveries");
                return ReconcileStats::default();
            }
        };

        let mut stats = ReconcileStats {
            checked: orders.len(),
            ..Default::default()
        };

        let outcomes: Vec<ReconcileOutcome> = stream::iter(orders)
            .map(|order| self.reconcile_one(order))
            .buffer_unordered(self.config.max_concurrent_tracks.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                ReconcileOutcome::Applied => stats.applied += 1,
                ReconcileOutcome::Unchanged => stats.unchanged += 1,
                ReconcileOutcome::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Reconcile a single order. Every failure path only affects this order.
    async fn reconcile_one(&self, order: Order) -> ReconcileOutcome {
        let (Some(agency), Some(delivery_id)) = (&order.delivery_agency, &order.delivery_id)
        else {
            warn!(
                order_id = %order.id,
                status = %order.status,
                "In-flight order has no delivery reference"
            );
            return ReconcileOutcome::Failed;
        };

        let Some(gateway) = self.engine.couriers().get(agency) else {
            warn!(
                order_id = %order.id,
                agency = %agency,
                "No gateway registered for agency, skipping"
            );
            return ReconcileOutcome::Failed;
        };

        let report = match gateway.track(delivery_id).await {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    order_id = %order.id,
                    delivery_id = %delivery_id,
                    error = %e,
                    "Failed to track delivery"
                );
                return ReconcileOutcome::Failed;
            }
        };

        match self.engine.apply_courier_report(&order.id, &report) {
            Ok(Some(_)) => ReconcileOutcome::Applied,
            Ok(None) => ReconcileOutcome::Unchanged,
            Err(e) => {
                warn!(
                    order_id = %order.id,
                    error = %e,
                    "Failed to apply courier report"
                );
                ReconcileOutcome::Failed
            }
        }
    }
}
