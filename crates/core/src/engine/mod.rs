//! Order lifecycle engine: transition legality, authorization and the
//! courier-coupled dispatch/cancel flows.

mod lifecycle;
mod types;

pub use lifecycle::{OrderLifecycle, COURIER_CANCEL_REASON, REJECT_REASON};
pub use types::{EngineError, Trigger};
