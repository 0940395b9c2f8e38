//! Mock courier gateway for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::courier::{
    CourierError, CourierGateway, DeliveryQuote, DeliveryStatus, SubmitRequest, TrackResult,
};

/// Mock implementation of the [`CourierGateway`] trait.
///
/// Records every call for assertions. Queued results are consumed first;
/// with an empty queue, submit succeeds with a generated delivery id, cancel
/// succeeds, and track reports `Submitted`.
///
/// Locks are only held for the duration of a queue pop or a push, never
/// across an await point.
pub struct MockCourierGateway {
    name: String,
    delivery_counter: AtomicU32,
    submit_results: Mutex<VecDeque<Result<DeliveryQuote, CourierError>>>,
    cancel_results: Mutex<VecDeque<Result<(), CourierError>>>,
    track_results: Mutex<VecDeque<Result<TrackResult, CourierError>>>,
    submit_calls: Mutex<Vec<SubmitRequest>>,
    /// Recorded (delivery_id, reason) pairs.
    cancel_calls: Mutex<Vec<(String, String)>>,
    track_calls: Mutex<Vec<String>>,
}

impl MockCourierGateway {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delivery_counter: AtomicU32::new(0),
            submit_results: Mutex::new(VecDeque::new()),
            cancel_results: Mutex::new(VecDeque::new()),
            track_results: Mutex::new(VecDeque::new()),
            submit_calls: Mutex::new(Vec::new()),
            cancel_calls: Mutex::new(Vec::new()),
            track_calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue the result for the next submit call.
    pub fn push_submit_result(&self, result: Result<DeliveryQuote, CourierError>) {
        self.submit_results.lock().unwrap().push_back(result);
    }

    /// Queue the result for the next cancel call.
    pub fn push_cancel_result(&self, result: Result<(), CourierError>) {
        self.cancel_results.lock().unwrap().push_back(result);
    }

    /// Queue the result for the next track call.
    pub fn push_track_result(&self, result: Result<TrackResult, CourierError>) {
        self.track_results.lock().unwrap().push_back(result);
    }

    /// Queue a successful track result with just a status.
    pub fn push_track_status(&self, status: DeliveryStatus) {
        self.push_track_result(Ok(TrackResult {
            status,
            agent_name: None,
            agent_phone: None,
            submitted_at: None,
            assigned_at: None,
            picked_up_at: None,
            completed_at: None,
            canceled_at: None,
        }));
    }

    pub fn submit_calls(&self) -> Vec<SubmitRequest> {
        self.submit_calls.lock().unwrap().clone()
    }

    pub fn cancel_calls(&self) -> Vec<(String, String)> {
        self.cancel_calls.lock().unwrap().clone()
    }

    pub fn track_calls(&self) -> Vec<String> {
        self.track_calls.lock().unwrap().clone()
    }

    fn next_delivery_id(&self) -> String {
        let n = self.delivery_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("mock-delivery-{}", n)
    }
}

#[async_trait]
impl CourierGateway for MockCourierGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<DeliveryQuote, CourierError> {
        self.submit_calls.lock().unwrap().push(request.clone());

        if let Some(result) = self.submit_results.lock().unwrap().pop_front() {
            return result;
        }
        Ok(DeliveryQuote {
            delivery_id: self.next_delivery_id(),
            base_fee: 3_000,
            extra_fee: 500,
            sum_total: 3_500,
            extra_fee_details: Vec::new(),
            distance_meters: 2_000.0,
            balance: Some(100_000),
        })
    }

    async fn cancel(&self, delivery_id: &str, reason: &str) -> Result<(), CourierError> {
        self.cancel_calls
            .lock()
            .unwrap()
            .push((delivery_id.to_string(), reason.to_string()));

        if let Some(result) = self.cancel_results.lock().unwrap().pop_front() {
            return result;
        }
        Ok(())
    }

    async fn track(&self, delivery_id: &str) -> Result<TrackResult, CourierError> {
        self.track_calls.lock().unwrap().push(delivery_id.to_string());

        if let Some(result) = self.track_results.lock().unwrap().pop_front() {
            return result;
        }
        Ok(TrackResult {
            status: DeliveryStatus::Submitted,
            agent_name: None,
            agent_phone: None,
            submitted_at: None,
            assigned_at: None,
            picked_up_at: None,
            completed_at: None,
            canceled_at: None,
        })
    }
}
