//! Types for courier gateway operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors that can occur during courier gateway operations.
#[derive(Debug, Error)]
pub enum CourierError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("API error: {0}")]
    ApiError(String),

    /// The courier processed the request and said no. Not retryable.
    #[error("Courier rejected request: {error_type}/{error_code}: {message}")]
    Rejected {
        error_type: String,
        error_code: String,
        message: String,
    },

    #[error("Delivery not found: {0}")]
    DeliveryNotFound(String),

    /// The courier reported a delivery status string we do not know.
    #[error("Unknown delivery status: {0}")]
    UnknownStatus(String),
}

impl CourierError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CourierError::ConnectionFailed(_) | CourierError::Timeout | CourierError::ApiError(_)
        )
    }
}

/// Courier-side state of a delivery, normalized across agencies.
///
/// Gateways own the mapping from each agency's wire strings; nothing outside
/// a gateway ever sees a raw status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Accepted by the agency, no rider yet.
    Submitted,
    /// A rider has been assigned.
    Assigned,
    /// The rider has the order.
    PickedUp,
    /// Delivered to the customer.
    Completed,
    /// Canceled on the courier side.
    Canceled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Submitted => "submitted",
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::PickedUp => "picked_up",
            DeliveryStatus::Completed => "completed",
            DeliveryStatus::Canceled => "canceled",
        }
    }
}

/// One item line in a delivery submission.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubmitItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: i64,
    pub stock_code: String,
}

/// Agency-neutral delivery submission.
///
/// Built once per dispatch; retries of a transient failure reuse the exact
/// same request, so the courier can deduplicate on `request_id`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubmitRequest {
    /// Idempotency key. Carries the business order number, so the agency
    /// recognizes a re-dispatch of the same order and does not create a
    /// second delivery.
    pub request_id: String,
    /// Store's branch code registered with the agency.
    pub branch_code: String,
    pub sender_phone: String,
    pub recipient_phone: String,
    pub dest_address: String,
    pub dest_address_detail: String,
    pub dest_address_road: String,
    pub dest_address_detail_road: String,
    /// Coordinates as strings, per the courier contract.
    pub latitude: String,
    pub longitude: String,
    pub payment_method: String,
    /// Declared order value in integer currency units.
    pub delivery_value: i64,
    /// Seconds until the order is ready for pickup.
    pub pickup_in_secs: u32,
    pub contactless: bool,
    /// Business order number, echoed back in courier dashboards.
    pub client_order_no: String,
    pub items: Vec<SubmitItem>,
}

impl SubmitRequest {
    /// SHA-256 over the serialized request, hex encoded. Stable across the
    /// retries of one dispatch, recorded for audit.
    pub fn payload_hash(&self) -> String {
        let serialized = serde_json::to_string(self).unwrap_or_default();
        let digest = Sha256::digest(serialized.as_bytes());
        format!("{:x}", digest)
    }
}

/// One surcharge line in a fee breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtraFeeDetail {
    #[serde(rename = "type")]
    pub fee_type: String,
    pub amount: i64,
    pub title: String,
}

/// Successful submission result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryQuote {
    /// Courier-side delivery id, used for cancel and track.
    pub delivery_id: String,
    /// Base delivery fee in integer currency units.
    pub base_fee: i64,
    /// Sum of all surcharges.
    pub extra_fee: i64,
    /// Total fee charged (base plus surcharges).
    pub sum_total: i64,
    /// Surcharge breakdown, if the agency itemizes one.
    pub extra_fee_details: Vec<ExtraFeeDetail>,
    /// Estimated distance in meters.
    pub distance_meters: f64,
    /// Remaining prepaid balance, if the agency reports one.
    pub balance: Option<i64>,
}

/// Current courier-side view of a delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackResult {
    pub status: DeliveryStatus,
    pub agent_name: Option<String>,
    pub agent_phone: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
}

/// Trait for courier agency gateways.
///
/// Implementations retry transient failures internally with the identical
/// payload; callers see a single Ok or a final error.
#[async_trait]
pub trait CourierGateway: Send + Sync {
    /// Agency name for logging/audit, uppercase (e.g. "VROONG").
    fn name(&self) -> &str;

    /// Submit a delivery request.
    async fn submit(&self, request: &SubmitRequest) -> Result<DeliveryQuote, CourierError>;

    /// Cancel a delivery. Canceling a delivery the agency already considers
    /// canceled is Ok, so cancel is safe to repeat.
    async fn cancel(&self, delivery_id: &str, reason: &str) -> Result<(), CourierError>;

    /// Fetch the courier-side state of a delivery.
    async fn track(&self, delivery_id: &str) -> Result<TrackResult, CourierError>;
}
