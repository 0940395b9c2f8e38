//! Order storage trait and request/filter types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

use super::types::{Address, Customer, Order, OrderLine, OrderStatus, OrderType, StoreProfile};

/// Error type for order store operations.
#[derive(Debug, Error)]
pub enum OrderStoreError {
    /// Order not found.
    #[error("order not found: {0}")]
    NotFound(String),

    /// Compare-and-swap status update lost a race: the stored status no
    /// longer matches what the caller read. Retryable.
    #[error("order {order_id} status changed concurrently (expected {expected}, found {actual})")]
    Conflict {
        order_id: String,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// `(order_number, order_platform)` already exists.
    #[error("duplicate order number {order_number} for platform {platform}")]
    DuplicateOrderNumber {
        order_number: String,
        platform: String,
    },

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

/// Request to create a new order (store-side intake).
///
/// Everything here is immutable once the order exists; the order starts in
/// `WAITING`.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_datetime: DateTime<Utc>,
    pub order_number: String,
    pub order_platform: String,
    pub payment_method: String,
    pub payment_amount: i64,
    pub order_type: OrderType,
    pub lines: Vec<OrderLine>,
    pub customer_id: String,
    pub store_id: String,
    pub address_id: String,
    pub contactless: bool,
}

/// Field-level update applied together with a status change.
///
/// Only the fields relevant to the transition are set; unset fields keep
/// their stored value. This replaces the source system's rebuild-the-whole-
/// entity writes, so a concurrent change to an unrelated field is never
/// silently overwritten.
#[derive(Debug, Clone)]
pub struct StatusPatch {
    pub status: OrderStatus,
    pub cancel_reason: Option<String>,
    pub delivery_agency: Option<String>,
    pub delivery_id: Option<String>,
    pub estimated_cooking_time_mins: Option<u32>,
    pub rider_request_time: Option<DateTime<Utc>>,
    pub pickup_in_secs: Option<u32>,
}

impl StatusPatch {
    /// A patch that only moves the status.
    pub fn to_status(status: OrderStatus) -> Self {
        Self {
            status,
            cancel_reason: None,
            delivery_agency: None,
            delivery_id: None,
            estimated_cooking_time_mins: None,
            rider_request_time: None,
            pickup_in_secs: None,
        }
    }

    pub fn with_cancel_reason(mut self, reason: impl Into<String>) -> Self {
        self.cancel_reason = Some(reason.into());
        self
    }

    pub fn with_cooking_time(mut self, minutes: u32) -> Self {
        self.estimated_cooking_time_mins = Some(minutes);
        self
    }

    pub fn with_dispatch(
        mut self,
        agency: impl Into<String>,
        delivery_id: impl Into<String>,
        pickup_in_secs: u32,
        rider_request_time: DateTime<Utc>,
    ) -> Self {
        self.delivery_agency = Some(agency.into());
        self.delivery_id = Some(delivery_id.into());
        self.pickup_in_secs = Some(pickup_in_secs);
        self.rider_request_time = Some(rider_request_time);
        self
    }
}

/// Criteria for the order search projection.
///
/// All fields are optional filters; fragments match as substrings.
#[derive(Debug, Clone)]
pub struct OrderSearchCriteria {
    /// Match orders placed on this calendar date (UTC).
    pub order_date: Option<NaiveDate>,
    /// Substring of an ordered menu item name.
    pub menu_name: Option<String>,
    /// Substring of the customer phone number.
    pub customer_phone: Option<String>,
    /// Substring of the business order number.
    pub order_number: Option<String>,
    pub order_platform: Option<String>,
    pub payment_method: Option<String>,
    pub order_type: Option<OrderType>,
    pub status: Option<OrderStatus>,
    pub payment_amount: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for OrderSearchCriteria {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderSearchCriteria {
    pub fn new() -> Self {
        Self {
            order_date: None,
            menu_name: None,
            customer_phone: None,
            order_number: None,
            order_platform: None,
            payment_method: None,
            order_type: None,
            status: None,
            payment_amount: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_order_date(mut self, date: NaiveDate) -> Self {
        self.order_date = Some(date);
        self
    }

    pub fn with_menu_name(mut self, fragment: impl Into<String>) -> Self {
        self.menu_name = Some(fragment.into());
        self
    }

    pub fn with_customer_phone(mut self, fragment: impl Into<String>) -> Self {
        self.customer_phone = Some(fragment.into());
        self
    }

    pub fn with_order_number(mut self, fragment: impl Into<String>) -> Self {
        self.order_number = Some(fragment.into());
        self
    }

    pub fn with_order_platform(mut self, platform: impl Into<String>) -> Self {
        self.order_platform = Some(platform.into());
        self
    }

    pub fn with_payment_method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = Some(method.into());
        self
    }

    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = Some(order_type);
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_payment_amount(mut self, amount: i64) -> Self {
        self.payment_amount = Some(amount);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// One courier call recorded for audit.
///
/// Submit retries reuse the identical payload, so `payload_hash` is stable
/// across the retries of a single attempt.
#[derive(Debug, Clone)]
pub struct NewDeliveryAttempt {
    pub order_id: String,
    pub agency: String,
    /// "submit" or "cancel".
    pub operation: String,
    pub delivery_id: Option<String>,
    /// SHA-256 over the serialized request payload.
    pub payload_hash: String,
    /// "SUCCESS" or the courier error code.
    pub result_code: String,
}

/// Recorded courier call, as read back from the store.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryAttempt {
    pub id: i64,
    pub order_id: String,
    pub agency: String,
    pub operation: String,
    pub delivery_id: Option<String>,
    pub payload_hash: String,
    pub result_code: String,
    pub created_at: DateTime<Utc>,
}

/// Trait for order storage backends.
///
/// Implementations must make `update_status` atomic: the write only lands if
/// the stored status still equals `expected`, otherwise `Conflict` is
/// returned and nothing changes.
pub trait OrderStore: Send + Sync {
    /// Create a new order in WAITING.
    fn create(&self, order: NewOrder) -> Result<Order, OrderStoreError>;

    /// Get an order by id.
    fn get(&self, id: &str) -> Result<Option<Order>, OrderStoreError>;

    /// List all orders currently in one of the given statuses.
    fn list_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, OrderStoreError>;

    /// Search a store's orders by criteria, paginated.
    fn search(
        &self,
        store_id: &str,
        criteria: &OrderSearchCriteria,
    ) -> Result<Vec<Order>, OrderStoreError>;

    /// Count a store's orders matching the criteria (ignores pagination).
    fn count(&self, store_id: &str, criteria: &OrderSearchCriteria)
        -> Result<i64, OrderStoreError>;

    /// Compare-and-swap status update. Applies `patch` only if the stored
    /// status equals `expected`; returns the updated order.
    fn update_status(
        &self,
        id: &str,
        expected: OrderStatus,
        patch: StatusPatch,
    ) -> Result<Order, OrderStoreError>;

    /// Record a courier call for audit.
    fn record_attempt(&self, attempt: NewDeliveryAttempt) -> Result<(), OrderStoreError>;

    /// Read back the recorded courier calls for an order, oldest first.
    fn list_attempts(&self, order_id: &str) -> Result<Vec<DeliveryAttempt>, OrderStoreError>;

    /// Store profile lookup (ownership checks, courier payloads).
    fn get_store_profile(&self, id: &str) -> Result<Option<StoreProfile>, OrderStoreError>;

    /// Upsert a store profile.
    fn put_store_profile(&self, profile: &StoreProfile) -> Result<(), OrderStoreError>;

    /// Customer lookup (courier payloads).
    fn get_customer(&self, id: &str) -> Result<Option<Customer>, OrderStoreError>;

    /// Upsert a customer.
    fn put_customer(&self, customer: &Customer) -> Result<(), OrderStoreError>;

    /// Address lookup (courier payloads).
    fn get_address(&self, id: &str) -> Result<Option<Address>, OrderStoreError>;

    /// Upsert an address.
    fn put_address(&self, address: &Address) -> Result<(), OrderStoreError>;
}
