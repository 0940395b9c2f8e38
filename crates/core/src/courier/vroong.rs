//! Vroong courier gateway implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::VroongConfig;

use super::retry::with_retries;
use super::{
    CourierError, CourierGateway, DeliveryQuote, DeliveryStatus, ExtraFeeDetail, SubmitRequest,
    TrackResult,
};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Vroong gateway implementation.
pub struct VroongGateway {
    client: Client,
    config: VroongConfig,
}

impl VroongGateway {
    /// Create a new Vroong gateway.
    pub fn new(config: VroongConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// POST a JSON body with the Vroong auth headers.
    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<R, CourierError> {
        let url = format!("{}{}", self.base_url(), endpoint);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.config.api_key)
            .header("secret", &self.config.api_secret)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CourierError::Timeout
                } else if e.is_connect() {
                    CourierError::ConnectionFailed(e.to_string())
                } else {
                    CourierError::ApiError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CourierError::ApiError(format!("HTTP {}", status)));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| CourierError::ApiError(format!("Failed to parse response: {}", e)))
    }
}

/// Vroong submit request body.
#[derive(Debug, Serialize)]
struct VroongSubmitPayload<'a> {
    request_id: &'a str,
    branch_code: &'a str,
    sender_phone: &'a str,
    recipient_phone: &'a str,
    dest_address: &'a str,
    dest_address_detail: &'a str,
    dest_address_road: &'a str,
    dest_address_detail_road: &'a str,
    dest_lat: &'a str,
    dest_lng: &'a str,
    payment_method: &'a str,
    delivery_value: i64,
    pickup_in: u32,
    contactless: bool,
    client_order_no: &'a str,
    item_detail: Vec<VroongItemDetail<'a>>,
}

#[derive(Debug, Serialize)]
struct VroongItemDetail<'a> {
    #[serde(rename = "type")]
    item_type: &'a str,
    name: &'a str,
    quantity: u32,
    unit_price: i64,
    stock_code: &'a str,
}

impl<'a> VroongSubmitPayload<'a> {
    fn from_request(request: &'a SubmitRequest) -> Self {
        Self {
            request_id: &request.request_id,
            branch_code: &request.branch_code,
            sender_phone: &request.sender_phone,
            recipient_phone: &request.recipient_phone,
            dest_address: &request.dest_address,
            dest_address_detail: &request.dest_address_detail,
            dest_address_road: &request.dest_address_road,
            dest_address_detail_road: &request.dest_address_detail_road,
            dest_lat: &request.latitude,
            dest_lng: &request.longitude,
            payment_method: &request.payment_method,
            delivery_value: request.delivery_value,
            pickup_in: request.pickup_in_secs,
            contactless: request.contactless,
            client_order_no: &request.client_order_no,
            item_detail: request
                .items
                .iter()
                .map(|item| VroongItemDetail {
                    item_type: "FOOD",
                    name: &item.name,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    stock_code: &item.stock_code,
                })
                .collect(),
        }
    }
}

/// Vroong submit response body.
#[derive(Debug, Deserialize)]
struct VroongSubmitResponse {
    result: String,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    delivery_id: Option<String>,
    #[serde(default)]
    base_fee: Option<i64>,
    #[serde(default)]
    extra_fee: Option<i64>,
    #[serde(default)]
    sum_total: Option<i64>,
    #[serde(default)]
    extra_fee_details: Vec<ExtraFeeDetail>,
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    balance: Option<i64>,
}

impl VroongSubmitResponse {
    fn into_quote(self) -> Result<DeliveryQuote, CourierError> {
        if !self.result.eq_ignore_ascii_case("SUCCESS") {
            return Err(rejection(self.error_type, self.error_code, self.error_message));
        }
        let delivery_id = self
            .delivery_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CourierError::ApiError("SUCCESS without delivery_id".to_string()))?;

        Ok(DeliveryQuote {
            delivery_id,
            base_fee: self.base_fee.unwrap_or(0),
            extra_fee: self.extra_fee.unwrap_or(0),
            sum_total: self.sum_total.unwrap_or(0),
            extra_fee_details: self.extra_fee_details,
            distance_meters: self.distance.unwrap_or(0.0),
            balance: self.balance,
        })
    }
}

#[derive(Debug, Serialize)]
struct VroongCancelPayload<'a> {
    delivery_id: &'a str,
    reason: &'a str,
}

#[derive(Debug, Deserialize)]
struct VroongCancelResponse {
    result: String,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

impl VroongCancelResponse {
    fn into_ack(self) -> Result<(), CourierError> {
        if self.result.eq_ignore_ascii_case("SUCCESS") {
            return Ok(());
        }
        Err(rejection(self.error_type, self.error_code, self.error_message))
    }
}

/// Canceling a delivery the agency already canceled reaches the state the
/// caller asked for, so that rejection is absorbed into an Ok.
fn absorb_already_canceled(
    result: Result<(), CourierError>,
    delivery_id: &str,
) -> Result<(), CourierError> {
    match result {
        Err(CourierError::Rejected { ref error_code, .. })
            if error_code.eq_ignore_ascii_case("ALREADY_CANCELED") =>
        {
            warn!(delivery_id, "Vroong delivery was already canceled");
            Ok(())
        }
        other => other,
    }
}

#[derive(Debug, Serialize)]
struct VroongTrackPayload<'a> {
    delivery_id: &'a str,
}

/// Vroong track response body.
#[derive(Debug, Deserialize)]
struct VroongTrackResponse {
    result: String,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    agent_name: Option<String>,
    #[serde(default)]
    agent_phone: Option<String>,
    #[serde(default)]
    submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    assigned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    picked_up_at: Option<DateTime<Utc>>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    canceled_at: Option<DateTime<Utc>>,
}

impl VroongTrackResponse {
    fn into_track_result(self) -> Result<TrackResult, CourierError> {
        if !self.result.eq_ignore_ascii_case("SUCCESS") {
            if self
                .error_code
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case("NOT_FOUND"))
            {
                return Err(CourierError::DeliveryNotFound(
                    self.error_message.unwrap_or_default(),
                ));
            }
            return Err(rejection(self.error_type, self.error_code, self.error_message));
        }

        let raw_status = self.status.unwrap_or_default();
        Ok(TrackResult {
            status: parse_vroong_status(&raw_status)?,
            agent_name: self.agent_name.filter(|s| !s.is_empty()),
            agent_phone: self.agent_phone.filter(|s| !s.is_empty()),
            submitted_at: self.submitted_at,
            assigned_at: self.assigned_at,
            picked_up_at: self.picked_up_at,
            completed_at: self.completed_at,
            canceled_at: self.canceled_at,
        })
    }
}

fn rejection(
    error_type: Option<String>,
    error_code: Option<String>,
    error_message: Option<String>,
) -> CourierError {
    CourierError::Rejected {
        error_type: error_type.unwrap_or_else(|| "UNKNOWN".to_string()),
        error_code: error_code.unwrap_or_else(|| "UNKNOWN".to_string()),
        message: error_message.unwrap_or_default(),
    }
}

/// Parse a Vroong delivery status string, case-insensitively.
fn parse_vroong_status(status: &str) -> Result<DeliveryStatus, CourierError> {
    match status.to_ascii_uppercase().as_str() {
        "SUBMITTED" => Ok(DeliveryStatus::Submitted),
        "ASSIGNED" | "AGENT_ASSIGNED" => Ok(DeliveryStatus::Assigned),
        "PICKED_UP" | "AGENT_PICKED_UP" => Ok(DeliveryStatus::PickedUp),
        "COMPLETED" | "DELIVERED" => Ok(DeliveryStatus::Completed),
        "CANCELED" | "CANCELLED" => Ok(DeliveryStatus::Canceled),
        other => Err(CourierError::UnknownStatus(other.to_string())),
    }
}

#[async_trait]
impl CourierGateway for VroongGateway {
    fn name(&self) -> &str {
        "VROONG"
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<DeliveryQuote, CourierError> {
        let quote = with_retries(
            "vroong submit",
            self.config.max_retries,
            RETRY_BASE_DELAY,
            |_| async {
                let payload = VroongSubmitPayload::from_request(request);
                let response: VroongSubmitResponse =
                    self.post_json("/api/delivery/submit", &payload).await?;
                response.into_quote()
            },
        )
        .await?;

        debug!(
            request_id = %request.request_id,
            delivery_id = %quote.delivery_id,
            fee = quote.sum_total,
            "Vroong delivery submitted"
        );
        Ok(quote)
    }

    async fn cancel(&self, delivery_id: &str, reason: &str) -> Result<(), CourierError> {
        let result = with_retries(
            "vroong cancel",
            self.config.max_retries,
            RETRY_BASE_DELAY,
            |_| async {
                let payload = VroongCancelPayload {
                    delivery_id,
                    reason,
                };
                let response: VroongCancelResponse =
                    self.post_json("/api/delivery/cancel", &payload).await?;
                response.into_ack()
            },
        )
        .await;

        absorb_already_canceled(result, delivery_id)
    }

    async fn track(&self, delivery_id: &str) -> Result<TrackResult, CourierError> {
        let payload = VroongTrackPayload { delivery_id };
        let response: VroongTrackResponse =
            self.post_json("/api/delivery/track", &payload).await?;
        response.into_track_result()
    }
}
