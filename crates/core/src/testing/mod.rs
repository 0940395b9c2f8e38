//! Testing utilities and mock implementations for end-to-end tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use orderflow_core::testing::{fixtures, MockCourierGateway};
//!
//! let gateway = MockCourierGateway::new("VROONG");
//! gateway.push_track_status(DeliveryStatus::PickedUp);
//!
//! // Use in a CourierRegistry...
//! ```

mod mock_gateway;

pub use mock_gateway::MockCourierGateway;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::order::{
        Address, Customer, NewOrder, OrderLine, OrderStore, OrderType, StoreProfile,
    };

    /// A store profile with reasonable defaults.
    pub fn store_profile(store_id: &str) -> StoreProfile {
        StoreProfile {
            id: store_id.to_string(),
            owner_user_id: "user-1".to_string(),
            name: "Chicken Place".to_string(),
            branch_code: "BR-01".to_string(),
            phone_number: "02-555-0001".to_string(),
        }
    }

    /// A customer belonging to the given store.
    pub fn customer(customer_id: &str, store_id: &str) -> Customer {
        Customer {
            id: customer_id.to_string(),
            store_id: store_id.to_string(),
            phone_number: "010-1234-5678".to_string(),
            nickname: "regular".to_string(),
        }
    }

    /// A delivery address for the given customer.
    pub fn address(address_id: &str, customer_id: &str) -> Address {
        Address {
            id: address_id.to_string(),
            customer_id: customer_id.to_string(),
            dest_address: "123 Samseong-dong".to_string(),
            dest_address_detail: "Apt 101".to_string(),
            dest_address_road: "12 Teheran-ro".to_string(),
            dest_address_detail_road: "Apt 101".to_string(),
            latitude: "37.508".to_string(),
            longitude: "127.062".to_string(),
        }
    }

    /// A new delivery order for the given store with a unique order number.
    pub fn new_order(store_id: &str) -> NewOrder {
        NewOrder {
            order_datetime: Utc::now(),
            order_number: format!("ON-{}", Uuid::new_v4()),
            order_platform: "BAEMIN".to_string(),
            payment_method: "PREPAID".to_string(),
            payment_amount: 18_000,
            order_type: OrderType::Delivery,
            lines: vec![OrderLine {
                menu_name: "Fried Chicken".to_string(),
                quantity: 1,
                unit_price: 18_000,
                stock_code: "menu-1".to_string(),
            }],
            customer_id: "cust-1".to_string(),
            store_id: store_id.to_string(),
            address_id: "addr-1".to_string(),
            contactless: false,
        }
    }

    /// Seed the store profile, customer and address `new_order` references.
    pub fn seed_references(store: &dyn OrderStore, store_id: &str) {
        store.put_store_profile(&store_profile(store_id)).unwrap();
        store.put_customer(&customer("cust-1", store_id)).unwrap();
        store.put_address(&address("addr-1", "cust-1")).unwrap();
    }
}
