//! Engine error taxonomy and the transition table.

use std::fmt;

use thiserror::Error;

use crate::courier::CourierError;
use crate::order::{OrderStatus, OrderStoreError};

/// Errors surfaced by lifecycle and query operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The order, or a record the operation needs (customer, address,
    /// store profile), does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The acting user does not own the order's store.
    #[error("user {user_id} may not act on orders of store {store_id}")]
    PermissionDenied { user_id: String, store_id: String },

    /// The requested trigger is not legal from the order's current status.
    #[error("cannot {trigger} order {order_id} in status {from}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        trigger: Trigger,
    },

    /// A concurrent writer won; the caller may re-read and retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The courier could not be reached or answered with a server-side
    /// failure. Retryable.
    #[error("courier temporarily unavailable: {0}")]
    CourierTransient(String),

    /// The courier processed the request and refused it. Not retryable.
    #[error("courier rejected the request: {0}")]
    CourierRejected(String),

    /// No gateway is configured for the requested agency.
    #[error("unsupported delivery agency: {0}")]
    UnsupportedAgency(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<OrderStoreError> for EngineError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::NotFound(id) => EngineError::NotFound(id),
            OrderStoreError::Conflict { order_id, .. } => {
                EngineError::Conflict(format!("order {} changed concurrently", order_id))
            }
            OrderStoreError::DuplicateOrderNumber {
                order_number,
                platform,
            } => EngineError::Conflict(format!(
                "order {} already exists for platform {}",
                order_number, platform
            )),
            OrderStoreError::Database(msg) => EngineError::Internal(msg),
        }
    }
}

impl From<CourierError> for EngineError {
    fn from(e: CourierError) -> Self {
        if e.is_transient() {
            EngineError::CourierTransient(e.to_string())
        } else {
            EngineError::CourierRejected(e.to_string())
        }
    }
}

/// Everything that can move an order to another status.
///
/// The first six are manual (store operator via the API); the courier
/// variants are applied by the reconciliation scheduler from tracked
/// delivery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Accept,
    Reject,
    Cancel,
    Dispatch,
    CallCustomer,
    CompletePickup,
    CourierPickedUp,
    CourierCompleted,
    CourierCanceled,
}

impl Trigger {
    pub const ALL: [Trigger; 9] = [
        Trigger::Accept,
        Trigger::Reject,
        Trigger::Cancel,
        Trigger::Dispatch,
        Trigger::CallCustomer,
        Trigger::CompletePickup,
        Trigger::CourierPickedUp,
        Trigger::CourierCompleted,
        Trigger::CourierCanceled,
    ];

    /// The single source of truth for transition legality.
    pub fn allowed_from(&self, status: OrderStatus) -> bool {
        use OrderStatus::*;
        match self {
            Trigger::Accept => status == Waiting,
            Trigger::Reject => status == Waiting,
            Trigger::Cancel => matches!(status, Waiting | Processing | RequestDelivery),
            Trigger::Dispatch => status == Processing,
            Trigger::CallCustomer => status == Processing,
            Trigger::CompletePickup => status == CustomerCall,
            Trigger::CourierPickedUp => status == RequestDelivery,
            // The courier may report completion without us ever observing
            // the pickup.
            Trigger::CourierCompleted => matches!(status, RequestDelivery | Delivering),
            Trigger::CourierCanceled => matches!(status, RequestDelivery | Delivering),
        }
    }

    /// The status this trigger moves the order to.
    pub fn target(&self) -> OrderStatus {
        match self {
            Trigger::Accept => OrderStatus::Processing,
            Trigger::Reject => OrderStatus::Canceled,
            Trigger::Cancel => OrderStatus::Canceled,
            Trigger::Dispatch => OrderStatus::RequestDelivery,
            Trigger::CallCustomer => OrderStatus::CustomerCall,
            Trigger::CompletePickup => OrderStatus::Completed,
            Trigger::CourierPickedUp => OrderStatus::Delivering,
            Trigger::CourierCompleted => OrderStatus::Completed,
            Trigger::CourierCanceled => OrderStatus::Canceled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Accept => "accept",
            Trigger::Reject => "reject",
            Trigger::Cancel => "cancel",
            Trigger::Dispatch => "dispatch",
            Trigger::CallCustomer => "call_customer",
            Trigger::CompletePickup => "complete_pickup",
            Trigger::CourierPickedUp => "courier_picked_up",
            Trigger::CourierCompleted => "courier_completed",
            Trigger::CourierCanceled => "courier_canceled",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
