//! Background reconciliation of in-flight deliveries against courier state.

mod config;
mod runner;

pub use config::SchedulerConfig;
pub use runner::{DeliveryReconciler, ReconcileStats};
