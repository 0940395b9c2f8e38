//! Reconciliation scheduler configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the delivery reconciliation scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Enable/disable the scheduler.
    /// When disabled, courier state is never polled automatically.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// How often to reconcile in-flight deliveries (seconds).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// How many courier track calls may be in flight at once.
    #[serde(default = "default_concurrency")]
    pub max_concurrent_tracks: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u64 {
    60
}

fn default_concurrency() -> usize {
    8
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval(),
            max_concurrent_tracks: default_concurrency(),
        }
    }
}
