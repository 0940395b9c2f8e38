//! Registry of configured courier gateways.

use std::collections::HashMap;
use std::sync::Arc;

use super::CourierGateway;

/// Maps agency names to gateways. Lookup is case-insensitive; an agency
/// that is not registered here is unsupported, full stop.
#[derive(Default)]
pub struct CourierRegistry {
    gateways: HashMap<String, Arc<dyn CourierGateway>>,
}

impl CourierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gateway under its own name.
    pub fn register(&mut self, gateway: Arc<dyn CourierGateway>) {
        self.gateways
            .insert(gateway.name().to_ascii_uppercase(), gateway);
    }

    pub fn get(&self, agency: &str) -> Option<Arc<dyn CourierGateway>> {
        self.gateways.get(&agency.to_ascii_uppercase()).cloned()
    }

    pub fn contains(&self, agency: &str) -> bool {
        self.gateways.contains_key(&agency.to_ascii_uppercase())
    }

    /// Registered agency names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.gateways.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }
}
