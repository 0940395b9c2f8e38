use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, orders};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/couriers", get(handlers::list_couriers))
        .route("/scheduler", get(handlers::scheduler_status))
        // Orders
        .route("/orders", post(orders::create_order))
        .route("/orders", get(orders::search_orders))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}", delete(orders::cancel_order))
        .route("/orders/{id}/accept", post(orders::accept_order))
        .route("/orders/{id}/reject", post(orders::reject_order))
        .route("/orders/{id}/call-customer", post(orders::call_customer))
        .route("/orders/{id}/complete-pickup", post(orders::complete_pickup))
        .route("/orders/{id}/dispatch", post(orders::dispatch_order))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use orderflow_core::courier::CourierRegistry;
    use orderflow_core::order::{OrderStore, SqliteOrderStore};
    use orderflow_core::query::OrderQueryService;
    use orderflow_core::testing::{fixtures, MockCourierGateway};
    use orderflow_core::{Config, OrderLifecycle};

    const STORE_ID: &str = "store-1";

    fn test_app() -> (Router, Arc<MockCourierGateway>) {
        let store: Arc<dyn OrderStore> = Arc::new(SqliteOrderStore::in_memory().unwrap());
        fixtures::seed_references(store.as_ref(), STORE_ID);

        let gateway = Arc::new(MockCourierGateway::new("VROONG"));
        let mut registry = CourierRegistry::new();
        registry.register(Arc::clone(&gateway) as _);

        let engine = Arc::new(OrderLifecycle::new(
            Arc::clone(&store),
            Arc::new(registry),
        ));
        let query = OrderQueryService::new(store);

        let state = Arc::new(AppState::new(
            Config::default(),
            engine,
            query,
            None,
        ));
        (create_router(state), gateway)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
        authed: bool,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if authed {
            builder = builder
                .header("x-user-id", "user-1")
                .header("x-store-id", STORE_ID);
        }
        let request = match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&value).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn create_order_body(order_type: &str) -> Value {
        json!({
            "order_number": "ON-1001",
            "order_platform": "BAEMIN",
            "payment_method": "PREPAID",
            "payment_amount": 18000,
            "order_type": order_type,
            "lines": [
                {"menu_name": "Fried Chicken", "quantity": 1, "unit_price": 18000, "stock_code": "menu-1"}
            ],
            "customer_id": "cust-1",
            "address_id": "addr-1"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app();
        let (status, body) = send(&app, Method::GET, "/api/v1/health", None, false).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_couriers_lists_registered_agencies() {
        let (app, _) = test_app();
        let (status, body) = send(&app, Method::GET, "/api/v1/couriers", None, false).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["agencies"], json!(["VROONG"]));
    }

    #[tokio::test]
    async fn test_create_order_requires_identity_headers() {
        let (app, _) = test_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/orders",
            Some(create_order_body("DELIVERY")),
            false,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains("x-user-id"));
    }

    #[tokio::test]
    async fn test_create_order_rejects_empty_lines() {
        let (app, _) = test_app();
        let mut body = create_order_body("DELIVERY");
        body["lines"] = json!([]);
        let (status, _) = send(&app, Method::POST, "/api/v1/orders", Some(body), true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_accept_dispatch_flow() {
        let (app, gateway) = test_app();

        let (status, created) = send(
            &app,
            Method::POST,
            "/api/v1/orders",
            Some(create_order_body("DELIVERY")),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "WAITING");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, accepted) = send(
            &app,
            Method::POST,
            &format!("/api/v1/orders/{}/accept", id),
            Some(json!({"cooking_time_mins": 20})),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(accepted["status"], "PROCESSING");

        let (status, dispatched) = send(
            &app,
            Method::POST,
            &format!("/api/v1/orders/{}/dispatch", id),
            Some(json!({"agency": "VROONG", "pickup_in_secs": 1200})),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dispatched["order"]["status"], "REQUEST_DELIVERY");
        assert_eq!(dispatched["order"]["delivery_agency"], "VROONG");
        assert!(dispatched["quote"]["delivery_id"].as_str().is_some());
        assert_eq!(gateway.submit_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_accept_from_wrong_state_is_bad_request() {
        let (app, _) = test_app();

        let (_, created) = send(
            &app,
            Method::POST,
            "/api/v1/orders",
            Some(create_order_body("DELIVERY")),
            true,
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let accept_uri = format!("/api/v1/orders/{}/accept", id);
        let accept_body = json!({"cooking_time_mins": 20});
        let (status, _) = send(&app, Method::POST, &accept_uri, Some(accept_body.clone()), true).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, Method::POST, &accept_uri, Some(accept_body), true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("PROCESSING"));
    }

    #[tokio::test]
    async fn test_get_unknown_order_is_not_found() {
        let (app, _) = test_app();
        let (status, _) = send(&app, Method::GET, "/api/v1/orders/nope", None, true).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_agency_is_bad_request() {
        let (app, _) = test_app();

        let (_, created) = send(
            &app,
            Method::POST,
            "/api/v1/orders",
            Some(create_order_body("DELIVERY")),
            true,
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();
        send(
            &app,
            Method::POST,
            &format!("/api/v1/orders/{}/accept", id),
            Some(json!({"cooking_time_mins": 15})),
            true,
        )
        .await;

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/v1/orders/{}/dispatch", id),
            Some(json!({"agency": "BAROGO", "pickup_in_secs": 900})),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cancel_waiting_order() {
        let (app, _) = test_app();

        let (_, created) = send(
            &app,
            Method::POST,
            "/api/v1/orders",
            Some(create_order_body("DELIVERY")),
            true,
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, canceled) = send(
            &app,
            Method::DELETE,
            &format!("/api/v1/orders/{}", id),
            Some(json!({"reason": "customer changed mind"})),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(canceled["status"], "CANCELED");
        assert_eq!(canceled["cancel_reason"], "customer changed mind");
    }

    #[tokio::test]
    async fn test_pickup_flow_via_call_customer() {
        let (app, _) = test_app();

        let (_, created) = send(
            &app,
            Method::POST,
            "/api/v1/orders",
            Some(create_order_body("PICKUP")),
            true,
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();
        send(
            &app,
            Method::POST,
            &format!("/api/v1/orders/{}/accept", id),
            Some(json!({"cooking_time_mins": 10})),
            true,
        )
        .await;

        let (status, called) = send(
            &app,
            Method::POST,
            &format!("/api/v1/orders/{}/call-customer", id),
            None,
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(called["status"], "CUSTOMER_CALL");

        let (status, completed) = send(
            &app,
            Method::POST,
            &format!("/api/v1/orders/{}/complete-pickup", id),
            None,
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(completed["status"], "COMPLETED");
    }

    #[tokio::test]
    async fn test_search_orders_paginates() {
        let (app, _) = test_app();

        for i in 0..3 {
            let mut body = create_order_body("DELIVERY");
            body["order_number"] = json!(format!("ON-{}", i));
            let (status, _) = send(&app, Method::POST, "/api/v1/orders", Some(body), true).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, page) = send(
            &app,
            Method::GET,
            "/api/v1/orders?limit=2&status=WAITING",
            None,
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 3);
        assert_eq!(page["orders"].as_array().unwrap().len(), 2);
        assert_eq!(page["limit"], 2);
    }

    #[tokio::test]
    async fn test_foreign_store_cannot_read_order() {
        let (app, _) = test_app();

        let (_, created) = send(
            &app,
            Method::POST,
            "/api/v1/orders",
            Some(create_order_body("DELIVERY")),
            true,
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let request = Request::builder()
            .method(Method::GET)
            .uri(format!("/api/v1/orders/{}", id))
            .header("x-user-id", "user-2")
            .header("x-store-id", "store-2")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_config_endpoint_serves_sanitized_config() {
        let (app, _) = test_app();
        let (status, body) = send(&app, Method::GET, "/api/v1/config", None, false).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["server"]["port"], 8080);
    }
}
