//! The order lifecycle engine.
//!
//! Owns every status mutation. Manual triggers come from store operators via
//! the API; courier triggers are applied from tracked delivery state by the
//! reconciliation scheduler. All writes go through the store's
//! compare-and-swap, so a lost race never clobbers another writer.

use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::courier::{
    CourierError, CourierRegistry, DeliveryQuote, DeliveryStatus, SubmitItem, SubmitRequest,
    TrackResult,
};
use crate::order::{
    ActingUser, NewDeliveryAttempt, NewOrder, Order, OrderStatus, OrderStore, OrderStoreError,
    OrderType, StatusPatch,
};

use super::{EngineError, Trigger};

/// How many times a lost compare-and-swap race is retried before the
/// conflict is surfaced to the caller.
const MAX_CONFLICT_RETRIES: u32 = 3;

/// Cancel reason recorded when the store rejects a waiting order.
pub const REJECT_REASON: &str = "rejected by store";

/// Cancel reason recorded when the courier reports a cancellation.
pub const COURIER_CANCEL_REASON: &str = "canceled by courier";

/// Reason sent to the courier when a dispatch loses the commit race and the
/// just-created delivery has to be withdrawn.
const DISPATCH_ROLLBACK_REASON: &str = "order state changed during dispatch";

/// The order lifecycle engine.
pub struct OrderLifecycle {
    store: Arc<dyn OrderStore>,
    couriers: Arc<CourierRegistry>,
}

impl OrderLifecycle {
    pub fn new(store: Arc<dyn OrderStore>, couriers: Arc<CourierRegistry>) -> Self {
        Self { store, couriers }
    }

    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    pub fn couriers(&self) -> &Arc<CourierRegistry> {
        &self.couriers
    }

    /// Intake a new order for the actor's own store. Starts in WAITING.
    pub fn create_order(
        &self,
        actor: &ActingUser,
        new_order: NewOrder,
    ) -> Result<Order, EngineError> {
        if new_order.store_id != actor.store_id {
            return Err(EngineError::PermissionDenied {
                user_id: actor.id.clone(),
                store_id: new_order.store_id,
            });
        }

        let order = self.store.create(new_order)?;
        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            platform = %order.order_platform,
            "Order created"
        );
        Ok(order)
    }

    /// Accept a waiting order, recording the estimated cooking time.
    pub fn accept(
        &self,
        actor: &ActingUser,
        order_id: &str,
        cooking_time_mins: u32,
    ) -> Result<Order, EngineError> {
        self.apply_manual(actor, order_id, Trigger::Accept, |patch| {
            patch.with_cooking_time(cooking_time_mins)
        })
    }

    /// Reject a waiting order.
    pub fn reject(&self, actor: &ActingUser, order_id: &str) -> Result<Order, EngineError> {
        self.apply_manual(actor, order_id, Trigger::Reject, |patch| {
            patch.with_cancel_reason(REJECT_REASON)
        })
    }

    /// Notify the customer that a pickup order is ready.
    pub fn call_customer(&self, actor: &ActingUser, order_id: &str) -> Result<Order, EngineError> {
        let order = self.load_authorized(actor, order_id)?;
        self.require_order_type(&order, OrderType::Pickup, Trigger::CallCustomer)?;
        self.apply_manual(actor, order_id, Trigger::CallCustomer, |patch| patch)
    }

    /// Hand a pickup order over to the customer.
    pub fn complete_pickup(
        &self,
        actor: &ActingUser,
        order_id: &str,
    ) -> Result<Order, EngineError> {
        let order = self.load_authorized(actor, order_id)?;
        self.require_order_type(&order, OrderType::Pickup, Trigger::CompletePickup)?;
        self.apply_manual(actor, order_id, Trigger::CompletePickup, |patch| patch)
    }

    /// Cancel an order. If a delivery is already in flight with a registered
    /// agency, the courier is canceled first; only after the courier agrees
    /// does the local status move.
    pub async fn cancel(
        &self,
        actor: &ActingUser,
        order_id: &str,
        reason: &str,
    ) -> Result<Order, EngineError> {
        let order = self.load_authorized(actor, order_id)?;
        if !Trigger::Cancel.allowed_from(order.status) {
            return Err(EngineError::InvalidTransition {
                order_id: order_id.to_string(),
                from: order.status,
                trigger: Trigger::Cancel,
            });
        }

        if let (Some(agency), Some(delivery_id)) = (&order.delivery_agency, &order.delivery_id) {
            match self.couriers.get(agency) {
                Some(gateway) => {
                    self.cancel_courier(&order, gateway.as_ref(), delivery_id, reason)
                        .await?
                }
                None => {
                    // The agency was configured when this order was
                    // dispatched but is not anymore. The local record still
                    // has to be cancelable.
                    warn!(
                        order_id,
                        agency = %agency,
                        "No gateway registered for agency, canceling locally only"
                    );
                }
            }
        }

        self.apply_manual(actor, order_id, Trigger::Cancel, |patch| {
            patch.with_cancel_reason(reason)
        })
    }

    /// Submit an order to a courier agency and commit the dispatch.
    ///
    /// The courier call happens without holding any lock; the result is then
    /// committed with a compare-and-swap against the status read at the
    /// start. If the commit loses the race, the just-created delivery is
    /// withdrawn best-effort and the conflict is surfaced.
    pub async fn dispatch(
        &self,
        actor: &ActingUser,
        order_id: &str,
        agency: &str,
        pickup_in_secs: u32,
    ) -> Result<(Order, DeliveryQuote), EngineError> {
        let order = self.load_authorized(actor, order_id)?;
        self.require_order_type(&order, OrderType::Delivery, Trigger::Dispatch)?;
        if !Trigger::Dispatch.allowed_from(order.status) {
            return Err(EngineError::InvalidTransition {
                order_id: order_id.to_string(),
                from: order.status,
                trigger: Trigger::Dispatch,
            });
        }

        let gateway = self
            .couriers
            .get(agency)
            .ok_or_else(|| EngineError::UnsupportedAgency(agency.to_string()))?;
        let agency_name = gateway.name().to_string();

        let request = self.build_submit_request(&order, pickup_in_secs)?;
        let payload_hash = request.payload_hash();

        let quote = match gateway.submit(&request).await {
            Ok(quote) => quote,
            Err(e) => {
                self.record_attempt(&order.id, &agency_name, "submit", None, &payload_hash, &e);
                return Err(e.into());
            }
        };

        self.store.record_attempt(NewDeliveryAttempt {
            order_id: order.id.clone(),
            agency: agency_name.clone(),
            operation: "submit".to_string(),
            delivery_id: Some(quote.delivery_id.clone()),
            payload_hash,
            result_code: "SUCCESS".to_string(),
        })?;

        let patch = StatusPatch::to_status(Trigger::Dispatch.target()).with_dispatch(
            agency_name.clone(),
            quote.delivery_id.clone(),
            pickup_in_secs,
            Utc::now(),
        );

        match self.store.update_status(&order.id, order.status, patch) {
            Ok(updated) => {
                info!(
                    order_id = %updated.id,
                    agency = %agency_name,
                    delivery_id = %quote.delivery_id,
                    fee = quote.sum_total,
                    "Order dispatched"
                );
                Ok((updated, quote))
            }
            Err(e) => {
                // The order moved while the courier call was in flight. The
                // delivery exists on the courier side and must be withdrawn
                // before the conflict is reported.
                warn!(
                    order_id = %order.id,
                    delivery_id = %quote.delivery_id,
                    "Dispatch commit lost a race, withdrawing courier delivery"
                );
                if let Err(cancel_err) = gateway
                    .cancel(&quote.delivery_id, DISPATCH_ROLLBACK_REASON)
                    .await
                {
                    warn!(
                        order_id = %order.id,
                        delivery_id = %quote.delivery_id,
                        error = %cancel_err,
                        "Failed to withdraw courier delivery after lost dispatch race"
                    );
                }
                let _ = self.store.record_attempt(NewDeliveryAttempt {
                    order_id: order.id.clone(),
                    agency: agency_name,
                    operation: "cancel".to_string(),
                    delivery_id: Some(quote.delivery_id.clone()),
                    payload_hash: hash_str(&quote.delivery_id),
                    result_code: "ROLLBACK".to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Apply a courier-side delivery report to the local order.
    ///
    /// Returns the updated order, or `None` when the report requires no
    /// change (nothing to apply, or a race the next reconciliation pass
    /// will converge).
    pub fn apply_courier_report(
        &self,
        order_id: &str,
        report: &TrackResult,
    ) -> Result<Option<Order>, EngineError> {
        let order = self
            .store
            .get(order_id)?
            .ok_or_else(|| EngineError::NotFound(order_id.to_string()))?;

        let trigger = match report.status {
            DeliveryStatus::Submitted | DeliveryStatus::Assigned => return Ok(None),
            DeliveryStatus::PickedUp => Trigger::CourierPickedUp,
            DeliveryStatus::Completed => Trigger::CourierCompleted,
            DeliveryStatus::Canceled => Trigger::CourierCanceled,
        };

        if !trigger.allowed_from(order.status) {
            // Already converged, or the order reached a terminal status
            // through another path.
            return Ok(None);
        }

        let mut patch = StatusPatch::to_status(trigger.target());
        if trigger == Trigger::CourierCanceled {
            patch = patch.with_cancel_reason(COURIER_CANCEL_REASON);
        }

        match self.store.update_status(&order.id, order.status, patch) {
            Ok(updated) => {
                info!(
                    order_id = %updated.id,
                    trigger = %trigger,
                    status = %updated.status,
                    "Courier report applied"
                );
                Ok(Some(updated))
            }
            Err(OrderStoreError::Conflict { .. }) => {
                debug!(order_id, "Courier report lost a race, deferring to next pass");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn load_authorized(&self, actor: &ActingUser, order_id: &str) -> Result<Order, EngineError> {
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
        Ok(order)
    }

    fn require_order_type(
        &self,
        order: &Order,
        expected: OrderType,
        trigger: Trigger,
    ) -> Result<(), EngineError> {
        if order.order_type != expected {
            return Err(EngineError::InvalidTransition {
                order_id: order.id.clone(),
                from: order.status,
                trigger,
            });
        }
        Ok(())
    }

    /// Read-check-write loop for transitions that involve no courier call.
    /// A lost race is retried against the fresh status; legality is
    /// re-checked every round.
    fn apply_manual(
        &self,
        actor: &ActingUser,
        order_id: &str,
        trigger: Trigger,
        build: impl Fn(StatusPatch) -> StatusPatch,
    ) -> Result<Order, EngineError> {
        for _ in 0..MAX_CONFLICT_RETRIES {
            let order = self.load_authorized(actor, order_id)?;
            if !trigger.allowed_from(order.status) {
                return Err(EngineError::InvalidTransition {
                    order_id: order_id.to_string(),
                    from: order.status,
                    trigger,
                });
            }

            let patch = build(StatusPatch::to_status(trigger.target()));
            match self.store.update_status(order_id, order.status, patch) {
                Ok(updated) => {
                    info!(
                        order_id,
                        trigger = %trigger,
                        from = %order.status,
                        to = %updated.status,
                        "Order transitioned"
                    );
                    return Ok(updated);
                }
                Err(OrderStoreError::Conflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::Conflict(format!(
            "order {} kept changing concurrently",
            order_id
        )))
    }

    async fn cancel_courier(
        &self,
        order: &Order,
        gateway: &dyn crate::courier::CourierGateway,
        delivery_id: &str,
        reason: &str,
    ) -> Result<(), EngineError> {
        let agency = gateway.name().to_string();
        match gateway.cancel(delivery_id, reason).await {
            Ok(()) => {
                self.store.record_attempt(NewDeliveryAttempt {
                    order_id: order.id.clone(),
                    agency,
                    operation: "cancel".to_string(),
                    delivery_id: Some(delivery_id.to_string()),
                    payload_hash: hash_str(delivery_id),
                    result_code: "SUCCESS".to_string(),
                })?;
                Ok(())
            }
            Err(CourierError::DeliveryNotFound(_)) => {
                // Nothing left to cancel on the courier side.
                warn!(
                    order_id = %order.id,
                    delivery_id,
                    "Courier no longer knows the delivery, canceling locally"
                );
                Ok(())
            }
            Err(e) => {
                self.record_attempt(
                    &order.id,
                    &agency,
                    "cancel",
                    Some(delivery_id),
                    &hash_str(delivery_id),
                    &e,
                );
                Err(e.into())
            }
        }
    }

    fn build_submit_request(
        &self,
        order: &Order,
        pickup_in_secs: u32,
    ) -> Result<SubmitRequest, EngineError> {
        let profile = self
            .store
            .get_store_profile(&order.store_id)?
            .ok_or_else(|| {
                EngineError::NotFound(format!("store profile {}", order.store_id))
            })?;
        let customer = self
            .store
            .get_customer(&order.customer_id)?
            .ok_or_else(|| EngineError::NotFound(format!("customer {}", order.customer_id)))?;
        let address = self
            .store
            .get_address(&order.address_id)?
            .ok_or_else(|| EngineError::NotFound(format!("address {}", order.address_id)))?;

        Ok(SubmitRequest {
            // The agency deduplicates on request_id, so a re-dispatch of the
            // same order after a transient failure must carry the same key.
            request_id: order.order_number.clone(),
            branch_code: profile.branch_code,
            sender_phone: profile.phone_number,
            recipient_phone: customer.phone_number,
            dest_address: address.dest_address,
            dest_address_detail: address.dest_address_detail,
            dest_address_road: address.dest_address_road,
            dest_address_detail_road: address.dest_address_detail_road,
            latitude: address.latitude,
            longitude: address.longitude,
            payment_method: order.payment_method.clone(),
            delivery_value: order.payment_amount,
            pickup_in_secs,
            contactless: order.contactless,
            client_order_no: order.order_number.clone(),
            items: order
                .lines
                .iter()
                .map(|line| SubmitItem {
                    name: line.menu_name.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    stock_code: line.stock_code.clone(),
                })
                .collect(),
        })
    }

    /// Best-effort audit write for a failed courier call.
    fn record_attempt(
        &self,
        order_id: &str,
        agency: &str,
        operation: &str,
        delivery_id: Option<&str>,
        payload_hash: &str,
        error: &CourierError,
    ) {
        let attempt = NewDeliveryAttempt {
            order_id: order_id.to_string(),
            agency: agency.to_string(),
            operation: operation.to_string(),
            delivery_id: delivery_id.map(String::from),
            payload_hash: payload_hash.to_string(),
            result_code: error_result_code(error),
        };
        if let Err(e) = self.store.record_attempt(attempt) {
            warn!(order_id, error = %e, "Failed to record courier attempt");
        }
    }
}

fn error_result_code(error: &CourierError) -> String {
    match error {
        CourierError::Timeout => "TIMEOUT".to_string(),
        CourierError::ConnectionFailed(_) => "CONNECTION_FAILED".to_string(),
        CourierError::ApiError(_) => "API_ERROR".to_string(),
        CourierError::Rejected { error_code, .. } => error_code.clone(),
        CourierError::DeliveryNotFound(_) => "NOT_FOUND".to_string(),
        CourierError::UnknownStatus(_) => "UNKNOWN_STATUS".to_string(),
    }
}

fn hash_str(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}
