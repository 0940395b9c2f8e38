//! Core order data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Processing status of an order.
///
/// Transitions between statuses are owned by the lifecycle engine; nothing
/// else mutates `Order::status`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Just received, awaiting store accept/reject.
    Waiting,
    /// Accepted by the store, being prepared.
    Processing,
    /// Submitted to a courier, waiting for a rider to be assigned.
    RequestDelivery,
    /// Rider picked the order up.
    Delivering,
    /// Pickup order ready, customer has been called.
    CustomerCall,
    /// Terminal: delivered or handed over.
    Completed,
    /// Terminal: canceled by store, customer or courier.
    Canceled,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Waiting,
        OrderStatus::Processing,
        OrderStatus::RequestDelivery,
        OrderStatus::Delivering,
        OrderStatus::CustomerCall,
        OrderStatus::Completed,
        OrderStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Waiting => "WAITING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::RequestDelivery => "REQUEST_DELIVERY",
            OrderStatus::Delivering => "DELIVERING",
            OrderStatus::CustomerCall => "CUSTOMER_CALL",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Canceled => "CANCELED",
        }
    }

    pub fn parse(s: &str) -> Option<OrderStatus> {
        Self::ALL.iter().copied().find(|st| st.as_str() == s)
    }

    /// No outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Canceled)
    }

    /// Statuses the reconciliation scheduler polls the courier for.
    pub fn is_in_flight_delivery(&self) -> bool {
        matches!(self, OrderStatus::RequestDelivery | OrderStatus::Delivering)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the order reaches the customer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Delivery,
    Pickup,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Delivery => "DELIVERY",
            OrderType::Pickup => "PICKUP",
        }
    }

    pub fn parse(s: &str) -> Option<OrderType> {
        match s {
            "DELIVERY" => Some(OrderType::Delivery),
            "PICKUP" => Some(OrderType::Pickup),
            _ => None,
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ordered menu item.
///
/// Immutable once the order is created; also the source for the courier
/// submit payload's item lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderLine {
    /// Menu item name.
    pub menu_name: String,
    pub quantity: u32,
    /// Unit price in integer currency units.
    pub unit_price: i64,
    /// Stock code reported to the courier (menu id in the source system).
    pub stock_code: String,
}

/// The central entity: one food order.
///
/// `(order_number, order_platform)` is a unique natural key. Status and the
/// delivery-related fields are mutated exclusively through the lifecycle
/// engine's compare-and-swap updates; everything else is fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    /// When the customer placed the order on the originating platform.
    pub order_datetime: DateTime<Utc>,
    /// Business order number assigned by the originating platform.
    pub order_number: String,
    /// Originating platform name (e.g. "BAEMIN", "COUPANG_EATS").
    pub order_platform: String,
    /// Payment method vocabulary is owned by the platforms, kept verbatim.
    pub payment_method: String,
    /// Payment amount in integer currency units.
    pub payment_amount: i64,
    pub order_type: OrderType,
    pub lines: Vec<OrderLine>,
    pub customer_id: String,
    pub store_id: String,
    /// Delivery destination; pickup orders may reference the store address.
    pub address_id: String,
    pub contactless: bool,

    pub status: OrderStatus,
    /// Set if and only if status is CANCELED.
    pub cancel_reason: Option<String>,
    /// Courier agency the order was dispatched to.
    pub delivery_agency: Option<String>,
    /// Courier-side delivery id; set once status reaches REQUEST_DELIVERY.
    pub delivery_id: Option<String>,
    /// Estimated cooking time in minutes, set on accept.
    pub estimated_cooking_time_mins: Option<u32>,
    /// When the rider was requested from the courier.
    pub rider_request_time: Option<DateTime<Utc>>,
    /// Courier "ready for pickup in N seconds" parameter.
    pub pickup_in_secs: Option<u32>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The store a set of orders belongs to, flattened to what the engine and
/// courier payloads need.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreProfile {
    pub id: String,
    pub owner_user_id: String,
    pub name: String,
    /// Branch code registered with the courier platform.
    pub branch_code: String,
    pub phone_number: String,
}

/// Customer reference, read-only for the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub id: String,
    pub store_id: String,
    pub phone_number: String,
    pub nickname: String,
}

/// Delivery destination, read-only for the engine.
///
/// Carries both the lot-number and road-name address variants the courier
/// wire format requires. Coordinates are kept as strings, matching the
/// courier contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub id: String,
    pub customer_id: String,
    pub dest_address: String,
    pub dest_address_detail: String,
    pub dest_address_road: String,
    pub dest_address_detail_road: String,
    pub latitude: String,
    pub longitude: String,
}

/// The authenticated store operator performing a manual transition.
///
/// Resolved by the caller (HTTP layer) before invoking the engine; the engine
/// never reads ambient security context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingUser {
    pub id: String,
    /// The store this user owns.
    pub store_id: String,
}

impl ActingUser {
    pub fn new(id: impl Into<String>, store_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            store_id: store_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("NOPE"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(!OrderStatus::Waiting.is_terminal());
        assert!(!OrderStatus::Delivering.is_terminal());
    }

    #[test]
    fn test_in_flight_delivery_statuses() {
        assert!(OrderStatus::RequestDelivery.is_in_flight_delivery());
        assert!(OrderStatus::Delivering.is_in_flight_delivery());
        assert!(!OrderStatus::Processing.is_in_flight_delivery());
        assert!(!OrderStatus::Completed.is_in_flight_delivery());
    }

    #[test]
    fn test_status_serde_wire_format() {
        let json = serde_json::to_string(&OrderStatus::RequestDelivery).unwrap();
        assert_eq!(json, "\"REQUEST_DELIVERY\"");
        let back: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OrderStatus::RequestDelivery);
    }

    #[test]
    fn test_order_type_parse() {
        assert_eq!(OrderType::parse("PICKUP"), Some(OrderType::Pickup));
        assert_eq!(OrderType::parse("DELIVERY"), Some(OrderType::Delivery));
        assert_eq!(OrderType::parse("pickup"), None);
    }
}
