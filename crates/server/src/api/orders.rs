//! Order API handlers.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use orderflow_core::courier::DeliveryQuote;
use orderflow_core::order::{
    ActingUser, NewOrder, Order, OrderLine, OrderSearchCriteria, OrderStatus, OrderType,
};
use orderflow_core::query::{OrderDetail, OrderPage};
use orderflow_core::EngineError;

use crate::state::AppState;

/// Maximum allowed limit for order queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for order queries
const DEFAULT_LIMIT: i64 = 100;

/// Cancel reason recorded when the request body carries none
const DEFAULT_CANCEL_REASON: &str = "canceled by store";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for order intake
#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    /// When the platform received the order (defaults to now)
    pub order_datetime: Option<DateTime<Utc>>,
    /// Platform-scoped order number
    pub order_number: String,
    /// Originating platform (e.g. "BAEMIN")
    pub order_platform: String,
    pub payment_method: String,
    pub payment_amount: i64,
    pub order_type: OrderType,
    pub lines: Vec<OrderLine>,
    pub customer_id: String,
    pub address_id: String,
    #[serde(default)]
    pub contactless: bool,
}

/// Query parameters for searching orders
#[derive(Debug, Deserialize)]
pub struct SearchOrdersParams {
    /// Restrict to orders placed on this date (YYYY-MM-DD)
    pub order_date: Option<NaiveDate>,
    /// Menu name fragment
    pub menu_name: Option<String>,
    /// Customer phone number fragment
    pub customer_phone: Option<String>,
    /// Order number fragment
    pub order_number: Option<String>,
    pub order_platform: Option<String>,
    pub payment_method: Option<String>,
    pub order_type: Option<OrderType>,
    pub status: Option<OrderStatus>,
    pub payment_amount: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Request body for accepting an order
#[derive(Debug, Deserialize)]
pub struct AcceptOrderBody {
    /// Estimated cooking time in minutes
    pub cooking_time_mins: u32,
}

/// Request body for cancelling an order
#[derive(Debug, Deserialize)]
pub struct CancelOrderBody {
    /// Optional reason for cancellation
    pub reason: Option<String>,
}

/// Request body for dispatching an order to a courier agency
#[derive(Debug, Deserialize)]
pub struct DispatchOrderBody {
    /// Agency to dispatch through (e.g. "VROONG")
    pub agency: String,
    /// Requested pickup lead time in seconds
    pub pickup_in_secs: u32,
}

/// Response for a dispatch: the updated order plus the courier's quote
#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub order: Order,
    pub quote: DeliveryQuote,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct OrderErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<OrderErrorResponse>);

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(OrderErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map engine errors to HTTP statuses.
fn engine_error(e: EngineError) -> ApiError {
    let status = match &e {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
        EngineError::InvalidTransition { .. } | EngineError::UnsupportedAgency(_) => {
            StatusCode::BAD_REQUEST
        }
        EngineError::Conflict(_) => StatusCode::CONFLICT,
        EngineError::CourierTransient(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::CourierRejected(_) => StatusCode::BAD_GATEWAY,
        EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

/// Resolve the acting user from the request headers.
///
/// Authentication proper is terminated upstream; the proxy forwards the
/// verified identity in `x-user-id` and `x-store-id`.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<ActingUser, ApiError> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());
    let store_id = headers
        .get("x-store-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    match (user_id, store_id) {
        (Some(user_id), Some(store_id)) => Ok(ActingUser::new(user_id, store_id)),
        _ => Err(error_response(
            StatusCode::UNAUTHORIZED,
            "missing x-user-id or x-store-id header",
        )),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new order
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderBody>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let actor = actor_from_headers(&headers)?;

    if body.lines.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "order must have at least one line",
        ));
    }

    let new_order = NewOrder {
        order_datetime: body.order_datetime.unwrap_or_else(Utc::now),
        order_number: body.order_number,
        order_platform: body.order_platform,
        payment_method: body.payment_method,
        payment_amount: body.payment_amount,
        order_type: body.order_type,
        lines: body.lines,
        customer_id: body.customer_id,
        store_id: actor.store_id.clone(),
        address_id: body.address_id,
        contactless: body.contactless,
    };

    let order = state
        .engine()
        .create_order(&actor, new_order)
        .map_err(engine_error)?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// Search orders with optional filters
pub async fn search_orders(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<SearchOrdersParams>,
) -> Result<Json<OrderPage>, ApiError> {
    let actor = actor_from_headers(&headers)?;

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut criteria = OrderSearchCriteria::new()
        .with_limit(limit)
        .with_offset(offset);

    if let Some(date) = params.order_date {
        criteria = criteria.with_order_date(date);
    }
    if let Some(ref fragment) = params.menu_name {
        criteria = criteria.with_menu_name(fragment);
    }
    if let Some(ref fragment) = params.customer_phone {
        criteria = criteria.with_customer_phone(fragment);
    }
    if let Some(ref fragment) = params.order_number {
        criteria = criteria.with_order_number(fragment);
    }
    if let Some(ref platform) = params.order_platform {
        criteria = criteria.with_order_platform(platform);
    }
    if let Some(ref method) = params.payment_method {
        criteria = criteria.with_payment_method(method);
    }
    if let Some(order_type) = params.order_type {
        criteria = criteria.with_order_type(order_type);
    }
    if let Some(status) = params.status {
        criteria = criteria.with_status(status);
    }
    if let Some(amount) = params.payment_amount {
        criteria = criteria.with_payment_amount(amount);
    }

    let page = state
        .query()
        .search(&actor, &criteria)
        .map_err(engine_error)?;

    Ok(Json(page))
}

/// Get full detail for one order
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<OrderDetail>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let detail = state.query().detail(&actor, &id).map_err(engine_error)?;
    Ok(Json(detail))
}

/// Accept a waiting order
pub async fn accept_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<AcceptOrderBody>,
) -> Result<Json<Order>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let order = state
        .engine()
        .accept(&actor, &id, body.cooking_time_mins)
        .map_err(engine_error)?;
    Ok(Json(order))
}

/// Reject a waiting order
pub async fn reject_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let order = state.engine().reject(&actor, &id).map_err(engine_error)?;
    Ok(Json(order))
}

/// Cancel an order (DELETE endpoint)
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<CancelOrderBody>>,
) -> Result<Json<Order>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let reason = body
        .and_then(|b| b.reason.clone())
        .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());

    let order = state
        .engine()
        .cancel(&actor, &id, &reason)
        .await
        .map_err(engine_error)?;
    Ok(Json(order))
}

/// Notify the customer that a pickup order is ready
pub async fn call_customer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let order = state
        .engine()
        .call_customer(&actor, &id)
        .map_err(engine_error)?;
    Ok(Json(order))
}

/// Hand a pickup order over to the customer
pub async fn complete_pickup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let order = state
        .engine()
        .complete_pickup(&actor, &id)
        .map_err(engine_error)?;
    Ok(Json(order))
}

/// Dispatch an accepted delivery order to a courier agency
pub async fn dispatch_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<DispatchOrderBody>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let (order, quote) = state
        .engine()
        .dispatch(&actor, &id, &body.agency, body.pickup_in_secs)
        .await
        .map_err(engine_error)?;
    Ok(Json(DispatchResponse { order, quote }))
}
