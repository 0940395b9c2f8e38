use std::sync::Arc;

use orderflow_core::query::OrderQueryService;
use orderflow_core::scheduler::DeliveryReconciler;
use orderflow_core::{Config, OrderLifecycle, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    engine: Arc<OrderLifecycle>,
    query: OrderQueryService,
    reconciler: Option<Arc<DeliveryReconciler>>,
}

impl AppState {
    pub fn new(
        config: Config,
        engine: Arc<OrderLifecycle>,
        query: OrderQueryService,
        reconciler: Option<Arc<DeliveryReconciler>>,
    ) -> Self {
        Self {
            config,
            engine,
            query,
            reconciler,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn engine(&self) -> &OrderLifecycle {
        self.engine.as_ref()
    }

    pub fn query(&self) -> &OrderQueryService {
        &self.query
    }

    pub fn reconciler(&self) -> Option<&Arc<DeliveryReconciler>> {
        self.reconciler.as_ref()
    }

    pub fn scheduler_interval_secs(&self) -> u64 {
        self.config.scheduler.interval_secs
    }
}
