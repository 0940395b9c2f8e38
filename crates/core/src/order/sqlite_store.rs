//! SQLite-backed order store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{
    Address, Customer, DeliveryAttempt, NewDeliveryAttempt, NewOrder, Order, OrderLine,
    OrderSearchCriteria, OrderStatus, OrderStore, OrderStoreError, OrderType, StatusPatch,
    StoreProfile,
};

/// SQLite-backed order store.
pub struct SqliteOrderStore {
    conn: Mutex<Connection>,
}

impl SqliteOrderStore {
    /// Create a new SQLite order store, creating the database file and tables
    /// if needed.
    pub fn new(path: &Path) -> Result<Self, OrderStoreError> {
        let conn = Connection::open(path).map_err(|e| OrderStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite order store (useful for testing).
    pub fn in_memory() -> Result<Self, OrderStoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| OrderStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), OrderStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                order_datetime TEXT NOT NULL,
                order_number TEXT NOT NULL,
                order_platform TEXT NOT NULL,
                payment_method TEXT NOT NULL,
                payment_amount INTEGER NOT NULL,
                order_type TEXT NOT NULL,
                lines TEXT NOT NULL,
                customer_id TEXT NOT NULL,
                store_id TEXT NOT NULL,
                address_id TEXT NOT NULL,
                contactless INTEGER NOT NULL,
                status TEXT NOT NULL,
                cancel_reason TEXT,
                delivery_agency TEXT,
                delivery_id TEXT,
                estimated_cooking_time_mins INTEGER,
                rider_request_time TEXT,
                pickup_in_secs INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_number_platform
                ON orders(order_number, order_platform);
            CREATE INDEX IF NOT EXISTS idx_orders_store ON orders(store_id, order_datetime);
            CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);

            CREATE TABLE IF NOT EXISTS delivery_attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id TEXT NOT NULL,
                agency TEXT NOT NULL,
                operation TEXT NOT NULL,
                delivery_id TEXT,
                payload_hash TEXT NOT NULL,
                result_code TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_attempts_order ON delivery_attempts(order_id);

            CREATE TABLE IF NOT EXISTS stores (
                id TEXT PRIMARY KEY,
                owner_user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                branch_code TEXT NOT NULL,
                phone_number TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS customers (
                id TEXT PRIMARY KEY,
                store_id TEXT NOT NULL,
                phone_number TEXT NOT NULL,
                nickname TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS addresses (
                id TEXT PRIMARY KEY,
                customer_id TEXT NOT NULL,
                dest_address TEXT NOT NULL,
                dest_address_detail TEXT NOT NULL,
                dest_address_road TEXT NOT NULL,
                dest_address_detail_road TEXT NOT NULL,
                latitude TEXT NOT NULL,
                longitude TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| OrderStoreError::Database(e.to_string()))?;

        Ok(())
    }

    const ORDER_COLUMNS: &'static str = "id, order_datetime, order_number, order_platform, \
         payment_method, payment_amount, order_type, lines, customer_id, store_id, address_id, \
         contactless, status, cancel_reason, delivery_agency, delivery_id, \
         estimated_cooking_time_mins, rider_request_time, pickup_in_secs, created_at, updated_at";

    fn build_search_clause(
        store_id: &str,
        criteria: &OrderSearchCriteria,
    ) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = vec!["o.store_id = ?".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(store_id.to_string())];

        if let Some(date) = criteria.order_date {
            conditions.push("date(o.order_datetime) = ?".to_string());
            params.push(Box::new(date.format("%Y-%m-%d").to_string()));
        }
        if let Some(ref fragment) = criteria.menu_name {
            // Line items are a JSON array; a substring match on the column
            // covers menu-name fragments.
            conditions.push("o.lines LIKE ?".to_string());
            params.push(Box::new(format!("%{}%", fragment)));
        }
        if let Some(ref fragment) = criteria.customer_phone {
            conditions.push(
                "o.customer_id IN (SELECT id FROM customers WHERE phone_number LIKE ?)".to_string(),
            );
            params.push(Box::new(format!("%{}%", fragment)));
        }
        if let Some(ref fragment) = criteria.order_number {
            conditions.push("o.order_number LIKE ?".to_string());
            params.push(Box::new(format!("%{}%", fragment)));
        }
        if let Some(ref platform) = criteria.order_platform {
            conditions.push("o.order_platform = ?".to_string());
            params.push(Box::new(platform.clone()));
        }
        if let Some(ref method) = criteria.payment_method {
            conditions.push("o.payment_method = ?".to_string());
            params.push(Box::new(method.clone()));
        }
        if let Some(order_type) = criteria.order_type {
            conditions.push("o.order_type = ?".to_string());
            params.push(Box::new(order_type.as_str().to_string()));
        }
        if let Some(status) = criteria.status {
            conditions.push("o.status = ?".to_string());
            params.push(Box::new(status.as_str().to_string()));
        }
        if let Some(amount) = criteria.payment_amount {
            conditions.push("o.payment_amount = ?".to_string());
            params.push(Box::new(amount));
        }

        (format!("WHERE {}", conditions.join(" AND ")), params)
    }

    fn row_to_order(row: &rusqlite::Row) -> rusqlite::Result<Order> {
        let id: String = row.get(0)?;
        let order_datetime_str: String = row.get(1)?;
        let order_number: String = row.get(2)?;
        let order_platform: String = row.get(3)?;
        let payment_method: String = row.get(4)?;
        let payment_amount: i64 = row.get(5)?;
        let order_type_str: String = row.get(6)?;
        let lines_json: String = row.get(7)?;
        let customer_id: String = row.get(8)?;
        let store_id: String = row.get(9)?;
        let address_id: String = row.get(10)?;
        let contactless: bool = row.get(11)?;
        let status_str: String = row.get(12)?;
        let cancel_reason: Option<String> = row.get(13)?;
        let delivery_agency: Option<String> = row.get(14)?;
        let delivery_id: Option<String> = row.get(15)?;
        let estimated_cooking_time_mins: Option<u32> = row.get(16)?;
        let rider_request_time_str: Option<String> = row.get(17)?;
        let pickup_in_secs: Option<u32> = row.get(18)?;
        let created_at_str: String = row.get(19)?;
        let updated_at_str: String = row.get(20)?;

        let lines: Vec<OrderLine> = serde_json::from_str(&lines_json).unwrap_or_default();

        Ok(Order {
            id,
            order_datetime: parse_timestamp(&order_datetime_str),
            order_number,
            order_platform,
            payment_method,
            payment_amount,
            order_type: OrderType::parse(&order_type_str).unwrap_or(OrderType::Delivery),
            lines,
            customer_id,
            store_id,
            address_id,
            contactless,
            status: OrderStatus::parse(&status_str).unwrap_or(OrderStatus::Waiting),
            cancel_reason,
            delivery_agency,
            delivery_id,
            estimated_cooking_time_mins,
            rider_request_time: rider_request_time_str.as_deref().map(parse_timestamp),
            pickup_in_secs,
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }

    fn get_order_locked(
        conn: &Connection,
        id: &str,
    ) -> Result<Option<Order>, OrderStoreError> {
        let sql = format!(
            "SELECT {} FROM orders WHERE id = ?",
            Self::ORDER_COLUMNS
        );
        let result = conn.query_row(&sql, params![id], Self::row_to_order);
        match result {
            Ok(order) => Ok(Some(order)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(OrderStoreError::Database(e.to_string())),
        }
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl OrderStore for SqliteOrderStore {
    fn create(&self, order: NewOrder) -> Result<Order, OrderStoreError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let status = OrderStatus::Waiting;

        let lines_json = serde_json::to_string(&order.lines)
            .map_err(|e| OrderStoreError::Database(e.to_string()))?;

        let result = conn.execute(
            "INSERT INTO orders (id, order_datetime, order_number, order_platform, \
             payment_method, payment_amount, order_type, lines, customer_id, store_id, \
             address_id, contactless, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                order.order_datetime.to_rfc3339(),
                order.order_number,
                order.order_platform,
                order.payment_method,
                order.payment_amount,
                order.order_type.as_str(),
                lines_json,
                order.customer_id,
                order.store_id,
                order.address_id,
                order.contactless,
                status.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        );

        if let Err(e) = result {
            let msg = e.to_string();
            if msg.contains("UNIQUE") {
                return Err(OrderStoreError::DuplicateOrderNumber {
                    order_number: order.order_number,
                    platform: order.order_platform,
                });
            }
            return Err(OrderStoreError::Database(msg));
        }

        Ok(Order {
            id,
            order_datetime: order.order_datetime,
            order_number: order.order_number,
            order_platform: order.order_platform,
            payment_method: order.payment_method,
            payment_amount: order.payment_amount,
            order_type: order.order_type,
            lines: order.lines,
            customer_id: order.customer_id,
            store_id: order.store_id,
            address_id: order.address_id,
            contactless: order.contactless,
            status,
            cancel_reason: None,
            delivery_agency: None,
            delivery_id: None,
            estimated_cooking_time_mins: None,
            rider_request_time: None,
            pickup_in_secs: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<Order>, OrderStoreError> {
        let conn = self.conn.lock().unwrap();
        Self::get_order_locked(&conn, id)
    }

    fn list_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, OrderStoreError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().unwrap();

        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM orders WHERE status IN ({}) ORDER BY order_datetime ASC",
            Self::ORDER_COLUMNS,
            placeholders
        );

        let params: Vec<Box<dyn rusqlite::ToSql>> = statuses
            .iter()
            .map(|s| Box::new(s.as_str().to_string()) as Box<dyn rusqlite::ToSql>)
            .collect();
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| OrderStoreError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_order)
            .map_err(|e| OrderStoreError::Database(e.to_string()))?;

        let mut orders = Vec::new();
        for row in rows {
            orders.push(row.map_err(|e| OrderStoreError::Database(e.to_string()))?);
        }
        Ok(orders)
    }

    fn search(
        &self,
        store_id: &str,
        criteria: &OrderSearchCriteria,
    ) -> Result<Vec<Order>, OrderStoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_search_clause(store_id, criteria);
        let sql = format!(
            "SELECT {} FROM orders o {} ORDER BY o.order_datetime DESC LIMIT ? OFFSET ?",
            Self::ORDER_COLUMNS,
            where_clause
        );

        let mut all_params = params;
        all_params.push(Box::new(criteria.limit));
        all_params.push(Box::new(criteria.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| OrderStoreError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_order)
            .map_err(|e| OrderStoreError::Database(e.to_string()))?;

        let mut orders = Vec::new();
        for row in rows {
            orders.push(row.map_err(|e| OrderStoreError::Database(e.to_string()))?);
        }
        Ok(orders)
    }

    fn count(
        &self,
        store_id: &str,
        criteria: &OrderSearchCriteria,
    ) -> Result<i64, OrderStoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_search_clause(store_id, criteria);
        let sql = format!("SELECT COUNT(*) FROM orders o {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| OrderStoreError::Database(e.to_string()))
    }

    fn update_status(
        &self,
        id: &str,
        expected: OrderStatus,
        patch: StatusPatch,
    ) -> Result<Order, OrderStoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        // Conditional write: lands only if status still matches what the
        // caller read. Unset patch fields keep their stored value.
        let changed = conn
            .execute(
                "UPDATE orders SET \
                 status = ?, \
                 cancel_reason = COALESCE(?, cancel_reason), \
                 delivery_agency = COALESCE(?, delivery_agency), \
                 delivery_id = COALESCE(?, delivery_id), \
                 estimated_cooking_time_mins = COALESCE(?, estimated_cooking_time_mins), \
                 rider_request_time = COALESCE(?, rider_request_time), \
                 pickup_in_secs = COALESCE(?, pickup_in_secs), \
                 updated_at = ? \
                 WHERE id = ? AND status = ?",
                params![
                    patch.status.as_str(),
                    patch.cancel_reason,
                    patch.delivery_agency,
                    patch.delivery_id,
                    patch.estimated_cooking_time_mins,
                    patch.rider_request_time.map(|t| t.to_rfc3339()),
                    patch.pickup_in_secs,
                    now.to_rfc3339(),
                    id,
                    expected.as_str(),
                ],
            )
            .map_err(|e| OrderStoreError::Database(e.to_string()))?;

        if changed == 0 {
            // Distinguish a lost race from a missing order.
            return match Self::get_order_locked(&conn, id)? {
                Some(order) => Err(OrderStoreError::Conflict {
                    order_id: id.to_string(),
                    expected,
                    actual: order.status,
                }),
                None => Err(OrderStoreError::NotFound(id.to_string())),
            };
        }

        Self::get_order_locked(&conn, id)?.ok_or_else(|| OrderStoreError::NotFound(id.to_string()))
    }

    fn record_attempt(&self, attempt: NewDeliveryAttempt) -> Result<(), OrderStoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO delivery_attempts \
             (order_id, agency, operation, delivery_id, payload_hash, result_code, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                attempt.order_id,
                attempt.agency,
                attempt.operation,
                attempt.delivery_id,
                attempt.payload_hash,
                attempt.result_code,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| OrderStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn list_attempts(&self, order_id: &str) -> Result<Vec<DeliveryAttempt>, OrderStoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, order_id, agency, operation, delivery_id, payload_hash, \
                 result_code, created_at FROM delivery_attempts WHERE order_id = ? ORDER BY id ASC",
            )
            .map_err(|e| OrderStoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![order_id], |row| {
                let created_at_str: String = row.get(7)?;
                Ok(DeliveryAttempt {
                    id: row.get(0)?,
                    order_id: row.get(1)?,
                    agency: row.get(2)?,
                    operation: row.get(3)?,
                    delivery_id: row.get(4)?,
                    payload_hash: row.get(5)?,
                    result_code: row.get(6)?,
                    created_at: parse_timestamp(&created_at_str),
                })
            })
            .map_err(|e| OrderStoreError::Database(e.to_string()))?;

        let mut attempts = Vec::new();
        for row in rows {
            attempts.push(row.map_err(|e| OrderStoreError::Database(e.to_string()))?);
        }
        Ok(attempts)
    }

    fn get_store_profile(&self, id: &str) -> Result<Option<StoreProfile>, OrderStoreError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            "SELECT id, owner_user_id, name, branch_code, phone_number FROM stores WHERE id = ?",
            params![id],
            |row| {
                Ok(StoreProfile {
                    id: row.get(0)?,
                    owner_user_id: row.get(1)?,
                    name: row.get(2)?,
                    branch_code: row.get(3)?,
                    phone_number: row.get(4)?,
                })
            },
        );

        match result {
            Ok(profile) => Ok(Some(profile)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(OrderStoreError::Database(e.to_string())),
        }
    }

    fn put_store_profile(&self, profile: &StoreProfile) -> Result<(), OrderStoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO stores (id, owner_user_id, name, branch_code, phone_number) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET owner_user_id = excluded.owner_user_id, \
             name = excluded.name, branch_code = excluded.branch_code, \
             phone_number = excluded.phone_number",
            params![
                profile.id,
                profile.owner_user_id,
                profile.name,
                profile.branch_code,
                profile.phone_number,
            ],
        )
        .map_err(|e| OrderStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_customer(&self, id: &str) -> Result<Option<Customer>, OrderStoreError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            "SELECT id, store_id, phone_number, nickname FROM customers WHERE id = ?",
            params![id],
            |row| {
                Ok(Customer {
                    id: row.get(0)?,
                    store_id: row.get(1)?,
                    phone_number: row.get(2)?,
                    nickname: row.get(3)?,
                })
            },
        );

        match result {
            Ok(customer) => Ok(Some(customer)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(OrderStoreError::Database(e.to_string())),
        }
    }

    fn put_customer(&self, customer: &Customer) -> Result<(), OrderStoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO customers (id, store_id, phone_number, nickname) VALUES (?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET store_id = excluded.store_id, \
             phone_number = excluded.phone_number, nickname = excluded.nickname",
            params![
                customer.id,
                customer.store_id,
                customer.phone_number,
                customer.nickname
            ],
        )
        .map_err(|e| OrderStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_address(&self, id: &str) -> Result<Option<Address>, OrderStoreError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            "SELECT id, customer_id, dest_address, dest_address_detail, dest_address_road, \
             dest_address_detail_road, latitude, longitude FROM addresses WHERE id = ?",
            params![id],
            |row| {
                Ok(Address {
                    id: row.get(0)?,
                    customer_id: row.get(1)?,
                    dest_address: row.get(2)?,
                    dest_address_detail: row.get(3)?,
                    dest_address_road: row.get(4)?,
                    dest_address_detail_road: row.get(5)?,
                    latitude: row.get(6)?,
                    longitude: row.get(7)?,
                })
            },
        );

        match result {
            Ok(address) => Ok(Some(address)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(OrderStoreError::Database(e.to_string())),
        }
    }

    fn put_address(&self, address: &Address) -> Result<(), OrderStoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO addresses (id, customer_id, dest_address, dest_address_detail, \
             dest_address_road, dest_address_detail_road, latitude, longitude) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET customer_id = excluded.customer_id, \
             dest_address = excluded.dest_address, \
             dest_address_detail = excluded.dest_address_detail, \
             dest_address_road = excluded.dest_address_road, \
             dest_address_detail_road = excluded.dest_address_detail_road, \
             latitude = excluded.latitude, longitude = excluded.longitude",
            params![
                address.id,
                address.customer_id,
                address.dest_address,
                address.dest_address_detail,
                address.dest_address_road,
                address.dest_address_detail_road,
                address.latitude,
                address.longitude,
            ],
        )
        .map_err(|e| OrderStoreError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteOrderStore {
        SqliteOrderStore::in_memory().unwrap()
    }

    fn create_test_order() -> NewOrder {
        NewOrder {
            order_datetime: Utc::now(),
            order_number: format!("ON-{}", uuid::Uuid::new_v4()),
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
            store_id: "store-1".to_string(),
            address_id: "addr-1".to_string(),
            contactless: false,
        }
    }

    #[test]
    fn test_create_order_starts_waiting() {
        let store = create_test_store();
        let order = store.create(create_test_order()).unwrap();

        assert!(!order.id.is_empty());
        assert_eq!(order.status, OrderStatus::Waiting);
        assert!(order.cancel_reason.is_none());
        assert!(order.delivery_id.is_none());
    }

    #[test]
    fn test_get_order_roundtrip() {
        let store = create_test_store();
        let created = store.create(create_test_order()).unwrap();

        let fetched = store.get(&created.id).unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.order_number, created.order_number);
        assert_eq!(fetched.lines, created.lines);
        assert_eq!(fetched.status, OrderStatus::Waiting);
    }

    #[test]
    fn test_get_nonexistent_order() {
        let store = create_test_store();
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_order_number_rejected() {
        let store = create_test_store();
        let mut order = create_test_order();
        order.order_number = "ON-1".to_string();
        store.create(order.clone()).unwrap();

        let result = store.create(order);
        assert!(matches!(
            result,
            Err(OrderStoreError::DuplicateOrderNumber { .. })
        ));
    }

    #[test]
    fn test_same_order_number_different_platform_allowed() {
        let store = create_test_store();
        let mut order = create_test_order();
        order.order_number = "ON-1".to_string();
        store.create(order.clone()).unwrap();

        order.order_platform = "COUPANG_EATS".to_string();
        assert!(store.create(order).is_ok());
    }

    #[test]
    fn test_update_status_cas_success() {
        let store = create_test_store();
        let order = store.create(create_test_order()).unwrap();

        let updated = store
            .update_status(
                &order.id,
                OrderStatus::Waiting,
                StatusPatch::to_status(OrderStatus::Processing).with_cooking_time(15),
            )
            .unwrap();

        assert_eq!(updated.status, OrderStatus::Processing);
        assert_eq!(updated.estimated_cooking_time_mins, Some(15));
    }

    #[test]
    fn test_update_status_cas_conflict() {
        let store = create_test_store();
        let order = store.create(create_test_order()).unwrap();

        store
            .update_status(
                &order.id,
                OrderStatus::Waiting,
                StatusPatch::to_status(OrderStatus::Processing),
            )
            .unwrap();

        // A writer that still believes the order is WAITING loses.
        let result = store.update_status(
            &order.id,
            OrderStatus::Waiting,
            StatusPatch::to_status(OrderStatus::Canceled).with_cancel_reason("late"),
        );

        match result {
            Err(OrderStoreError::Conflict {
                expected, actual, ..
            }) => {
                assert_eq!(expected, OrderStatus::Waiting);
                assert_eq!(actual, OrderStatus::Processing);
            }
            other => panic!("expected Conflict, got {:?}", other),
        }

        // The losing patch must not have leaked any field.
        let fetched = store.get(&order.id).unwrap().unwrap();
        assert_eq!(fetched.status, OrderStatus::Processing);
        assert!(fetched.cancel_reason.is_none());
    }

    #[test]
    fn test_update_status_nonexistent() {
        let store = create_test_store();
        let result = store.update_status(
            "missing",
            OrderStatus::Waiting,
            StatusPatch::to_status(OrderStatus::Processing),
        );
        assert!(matches!(result, Err(OrderStoreError::NotFound(_))));
    }

    #[test]
    fn test_patch_keeps_unset_fields() {
        let store = create_test_store();
        let order = store.create(create_test_order()).unwrap();

        store
            .update_status(
                &order.id,
                OrderStatus::Waiting,
                StatusPatch::to_status(OrderStatus::Processing).with_cooking_time(20),
            )
            .unwrap();

        let updated = store
            .update_status(
                &order.id,
                OrderStatus::Processing,
                StatusPatch::to_status(OrderStatus::RequestDelivery).with_dispatch(
                    "VROONG",
                    "D123",
                    600,
                    Utc::now(),
                ),
            )
            .unwrap();

        // Cooking time survives the dispatch patch.
        assert_eq!(updated.estimated_cooking_time_mins, Some(20));
        assert_eq!(updated.delivery_agency.as_deref(), Some("VROONG"));
        assert_eq!(updated.delivery_id.as_deref(), Some("D123"));
        assert_eq!(updated.pickup_in_secs, Some(600));
        assert!(updated.rider_request_time.is_some());
    }

    #[test]
    fn test_list_by_status() {
        let store = create_test_store();
        let o1 = store.create(create_test_order()).unwrap();
        let o2 = store.create(create_test_order()).unwrap();
        store.create(create_test_order()).unwrap();

        store
            .update_status(
                &o1.id,
                OrderStatus::Waiting,
                StatusPatch::to_status(OrderStatus::Processing),
            )
            .unwrap();
        store
            .update_status(
                &o1.id,
                OrderStatus::Processing,
                StatusPatch::to_status(OrderStatus::RequestDelivery),
            )
            .unwrap();
        store
            .update_status(
                &o2.id,
                OrderStatus::Waiting,
                StatusPatch::to_status(OrderStatus::Processing),
            )
            .unwrap();

        let in_flight = store
            .list_by_status(&[OrderStatus::RequestDelivery, OrderStatus::Delivering])
            .unwrap();
        assert_eq!(in_flight.len(), 1);
        assert_eq!(in_flight[0].id, o1.id);

        assert!(store.list_by_status(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_search_scoped_to_store() {
        let store = create_test_store();
        store.create(create_test_order()).unwrap();

        let mut other = create_test_order();
        other.store_id = "store-2".to_string();
        store.create(other).unwrap();

        let results = store
            .search("store-1", &OrderSearchCriteria::new())
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].store_id, "store-1");
    }

    #[test]
    fn test_search_by_order_number_fragment() {
        let store = create_test_store();
        let mut order = create_test_order();
        order.order_number = "B12345".to_string();
        store.create(order).unwrap();
        store.create(create_test_order()).unwrap();

        let criteria = OrderSearchCriteria::new().with_order_number("234");
        let results = store.search("store-1", &criteria).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].order_number, "B12345");
    }

    #[test]
    fn test_search_by_menu_name_fragment() {
        let store = create_test_store();
        store.create(create_test_order()).unwrap();

        let mut pizza = create_test_order();
        pizza.lines = vec![OrderLine {
            menu_name: "Margherita Pizza".to_string(),
            quantity: 2,
            unit_price: 12_000,
            stock_code: "menu-9".to_string(),
        }];
        store.create(pizza).unwrap();

        let criteria = OrderSearchCriteria::new().with_menu_name("Pizza");
        let results = store.search("store-1", &criteria).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].lines[0].menu_name, "Margherita Pizza");
    }

    #[test]
    fn test_search_by_customer_phone_fragment() {
        let store = create_test_store();
        store
            .put_customer(&Customer {
                id: "cust-1".to_string(),
                store_id: "store-1".to_string(),
                phone_number: "010-1234-5678".to_string(),
                nickname: "regular".to_string(),
            })
            .unwrap();
        store
            .put_customer(&Customer {
                id: "cust-2".to_string(),
                store_id: "store-1".to_string(),
                phone_number: "010-9999-0000".to_string(),
                nickname: "other".to_string(),
            })
            .unwrap();

        store.create(create_test_order()).unwrap();
        let mut other = create_test_order();
        other.customer_id = "cust-2".to_string();
        store.create(other).unwrap();

        let criteria = OrderSearchCriteria::new().with_customer_phone("1234");
        let results = store.search("store-1", &criteria).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].customer_id, "cust-1");
    }

    #[test]
    fn test_search_by_status_and_type() {
        let store = create_test_store();
        let order = store.create(create_test_order()).unwrap();
        let mut pickup = create_test_order();
        pickup.order_type = OrderType::Pickup;
        store.create(pickup).unwrap();

        store
            .update_status(
                &order.id,
                OrderStatus::Waiting,
                StatusPatch::to_status(OrderStatus::Processing),
            )
            .unwrap();

        let criteria = OrderSearchCriteria::new().with_status(OrderStatus::Processing);
        let results = store.search("store-1", &criteria).unwrap();
        assert_eq!(results.len(), 1);

        let criteria = OrderSearchCriteria::new().with_order_type(OrderType::Pickup);
        let results = store.search("store-1", &criteria).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].order_type, OrderType::Pickup);
    }

    #[test]
    fn test_search_pagination_and_count() {
        let store = create_test_store();
        for _ in 0..5 {
            store.create(create_test_order()).unwrap();
        }

        let criteria = OrderSearchCriteria::new().with_limit(2).with_offset(0);
        assert_eq!(store.search("store-1", &criteria).unwrap().len(), 2);

        let criteria = OrderSearchCriteria::new().with_limit(2).with_offset(4);
        assert_eq!(store.search("store-1", &criteria).unwrap().len(), 1);

        assert_eq!(
            store.count("store-1", &OrderSearchCriteria::new()).unwrap(),
            5
        );
    }

    #[test]
    fn test_record_and_list_attempts() {
        let store = create_test_store();
        let order = store.create(create_test_order()).unwrap();

        store
            .record_attempt(NewDeliveryAttempt {
                order_id: order.id.clone(),
                agency: "VROONG".to_string(),
                operation: "submit".to_string(),
                delivery_id: Some("D123".to_string()),
                payload_hash: "abcd".to_string(),
                result_code: "SUCCESS".to_string(),
            })
            .unwrap();
        store
            .record_attempt(NewDeliveryAttempt {
                order_id: order.id.clone(),
                agency: "VROONG".to_string(),
                operation: "cancel".to_string(),
                delivery_id: Some("D123".to_string()),
                payload_hash: "ef01".to_string(),
                result_code: "SUCCESS".to_string(),
            })
            .unwrap();

        let attempts = store.list_attempts(&order.id).unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].operation, "submit");
        assert_eq!(attempts[1].operation, "cancel");
    }

    #[test]
    fn test_store_customer_address_roundtrip() {
        let store = create_test_store();

        let profile = StoreProfile {
            id: "store-1".to_string(),
            owner_user_id: "user-1".to_string(),
            name: "Chicken Place".to_string(),
            branch_code: "BR-01".to_string(),
            phone_number: "02-555-0001".to_string(),
        };
        store.put_store_profile(&profile).unwrap();
        assert_eq!(store.get_store_profile("store-1").unwrap(), Some(profile));

        let customer = Customer {
            id: "cust-1".to_string(),
            store_id: "store-1".to_string(),
            phone_number: "010-1234-5678".to_string(),
            nickname: "regular".to_string(),
        };
        store.put_customer(&customer).unwrap();
        assert_eq!(store.get_customer("cust-1").unwrap(), Some(customer));

        let address = Address {
            id: "addr-1".to_string(),
            customer_id: "cust-1".to_string(),
            dest_address: "123 Samseong-dong".to_string(),
            dest_address_detail: "Apt 101".to_string(),
            dest_address_road: "12 Teheran-ro".to_string(),
            dest_address_detail_road: "Apt 101".to_string(),
            latitude: "37.508".to_string(),
            longitude: "127.062".to_string(),
        };
        store.put_address(&address).unwrap();
        assert_eq!(store.get_address("addr-1").unwrap(), Some(address));

        assert!(store.get_store_profile("missing").unwrap().is_none());
        assert!(store.get_customer("missing").unwrap().is_none());
        assert!(store.get_address("missing").unwrap().is_none());
    }

    #[test]
    fn test_file_based_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("orders.db");

        let store = SqliteOrderStore::new(&db_path).unwrap();
        let order = store.create(create_test_order()).unwrap();

        assert!(db_path.exists());
        assert!(store.get(&order.id).unwrap().is_some());
    }
}
