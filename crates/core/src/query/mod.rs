//! Read-side projections over orders.
//!
//! The lifecycle engine owns writes; this service owns the flattened views
//! the API serves. Everything is scoped to the acting user's store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::EngineError;
use crate::order::{
    ActingUser, DeliveryAttempt, Order, OrderSearchCriteria, OrderStatus, OrderStore, OrderType,
};

/// One row of an order listing.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub id: String,
    pub order_datetime: DateTime<Utc>,
    pub order_number: String,
    pub order_platform: String,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub payment_amount: i64,
    /// "Fried Chicken" or "Fried Chicken +2" for multi-line orders.
    pub menu_summary: String,
    pub delivery_agency: Option<String>,
}

impl OrderSummary {
    fn from_order(order: Order) -> Self {
        let menu_summary = match order.lines.as_slice() {
            [] => String::new(),
            [only] => only.menu_name.clone(),
            [first, rest @ ..] => format!("{} +{}", first.menu_name, rest.len()),
        };

        Self {
            id: order.id,
            order_datetime: order.order_datetime,
            order_number: order.order_number,
            order_platform: order.order_platform,
            order_type: order.order_type,
            status: order.status,
            payment_amount: order.payment_amount,
            menu_summary,
            delivery_agency: order.delivery_agency,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<OrderSummary>,
    /// Total matches, ignoring pagination.
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Full view of a single order, with its references resolved and the courier
/// audit trail attached.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub customer_phone: Option<String>,
    pub customer_nickname: Option<String>,
    pub dest_address: Option<String>,
    pub dest_address_detail: Option<String>,
    pub delivery_attempts: Vec<DeliveryAttempt>,
}

/// Read-side query service.
pub struct OrderQueryService {
    store: Arc<dyn OrderStore>,
}

impl OrderQueryService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Search the actor's orders, paginated.
    pub fn search(
        &self,
        actor: &ActingUser,
        criteria: &OrderSearchCriteria,
    ) -> Result<OrderPage, EngineError> {
        let orders = self.store.search(&actor.store_id, criteria)?;
        let total = self.store.count(&actor.store_id, criteria)?;

        Ok(OrderPage {
            orders: orders.into_iter().map(OrderSummary::from_order).collect(),
            total,
            limit: criteria.limit,
            offset: criteria.offset,
        })
    }

    /// Full detail for one order the actor owns.
    pub fn detail(&self, actor: &ActingUser, order_id: &str) -> Result<OrderDetail, EngineError> {
        let order = self
            .store
            .get(order_id)?
            .ok_or_else(|| EngineError::NotFound(order_id.to_string()))?;

        if order.store_id != actor.store_id {
            return Err(EngineError::PermissionDenied {
                user_id: actor.id.clone(),
                store_id: order.store_id,
            });
        }

        // Reference records may have been pruned; the detail view degrades
        // instead of failing.
        let customer = self.store.get_customer(&order.customer_id)?;
        let address = self.store.get_address(&order.address_id)?;
        let delivery_attempts = self.store.list_attempts(&order.id)?;

        Ok(OrderDetail {
            customer_phone: customer.as_ref().map(|c| c.phone_number.clone()),
            customer_nickname: customer.map(|c| c.nickname),
            dest_address: address.as_ref().map(|a| a.dest_address.clone()),
            dest_address_detail: address.map(|a| a.dest_address_detail),
            delivery_attempts,
            order,
        })
    }
}
