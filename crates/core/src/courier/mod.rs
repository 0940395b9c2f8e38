//! Courier agency gateways.
//!
//! One gateway per supported agency, behind [`CourierGateway`]. Gateways own
//! the agency wire formats and status vocabularies; everything above them
//! speaks [`DeliveryStatus`] and agency-neutral requests.

mod registry;
pub mod retry;
mod types;
mod vroong;

pub use registry::CourierRegistry;
pub use types::{
    CourierError, CourierGateway, DeliveryQuote, DeliveryStatus, ExtraFeeDetail, SubmitItem,
    SubmitRequest, TrackResult,
};
pub use vroong::VroongGateway;
