//! Orders: domain types, storage trait and the SQLite implementation.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteOrderStore;
pub use store::{
    DeliveryAttempt, NewDeliveryAttempt, NewOrder, OrderSearchCriteria, OrderStore,
    OrderStoreError, StatusPatch,
};
pub use types::{
    ActingUser, Address, Customer, Order, OrderLine, OrderStatus, OrderType, StoreProfile,
};
