//! End-to-end flows through the HTTP router

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::*;
use serde_json::json;
use uuid::Uuid;

async fn pay_full(app: &TestApp, token: &str) -> String {
    let reply = app
        .post("/api/payments", token, payment_body("full-payment", card(), 117.5))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.data()["payment"]["transactionId"]
        .as_str()
        .unwrap()
        .to_string()
}

// ============================================================================
// Two-step checkout
// ============================================================================

#[tokio::test]
async fn test_payment_then_order_links_both() {
    let app = TestApp::new();

    let payment = app
        .post(
            "/api/payments",
            &app.customer,
            payment_body("full-payment", card(), 117.5),
        )
        .await;
    assert_eq!(payment.status, StatusCode::CREATED);
    assert_eq!(payment.body["success"], true);
    let payment = &payment.data()["payment"];
    assert_eq!(payment["status"], "completed");
    assert_eq!(payment["amount"].as_f64(), Some(117.5));
    assert_eq!(payment["paymentMethod"]["type"], "card");
    assert!(payment["paymentMethod"].get("cvv").is_none());
    let txn = payment["transactionId"].as_str().unwrap().to_string();

    let order = app
        .post("/api/orders", &app.customer, order_body(Some(&txn)))
        .await;
    assert_eq!(order.status, StatusCode::CREATED, "{}", order.body);
    let order = &order.data()["order"];
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total"].as_f64(), Some(117.5));
    assert_eq!(order["paymentDetails"]["transactionId"], txn.as_str());
    let order_number = order["orderNumber"].as_str().unwrap();
    assert!(order_number.starts_with("ORD"));

    let linked = app
        .get(&format!("/api/payments/{txn}"), &app.customer)
        .await;
    assert_eq!(linked.status, StatusCode::OK);
    assert_eq!(
        linked.data()["payment"]["metadata"]["orderDetails"]["orderNumber"],
        order_number
    );
}

#[tokio::test]
async fn test_installment_payment_split() {
    let app = TestApp::new();
    let mut body = payment_body(
        "installment-payment",
        json!({ "type": "mobile_money", "phoneNumber": "0241234567", "network": "MTN" }),
        70.5,
    );
    body["metadata"]["installmentPercentage"] = json!(60);

    let reply = app.post("/api/payments", &app.customer, body).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    let plan = &reply.data()["payment"]["metadata"]["plan"];
    assert_eq!(plan["kind"], "installment-payment");
    assert_eq!(plan["amountPaid"].as_f64(), Some(70.5));
    assert_eq!(plan["remainingBalance"].as_f64(), Some(47.0));
}

#[tokio::test]
async fn test_refetch_is_stable() {
    let app = TestApp::new();
    let txn = pay_full(&app, &app.customer).await;
    let created = app
        .post("/api/orders", &app.customer, order_body(Some(&txn)))
        .await;
    let id = created.data()["order"]["id"].as_str().unwrap().to_string();
    let number = created.data()["order"]["orderNumber"]
        .as_str()
        .unwrap()
        .to_string();

    let by_id = app.get(&format!("/api/orders/{id}"), &app.customer).await;
    let by_number = app
        .get(&format!("/api/orders/{number}"), &app.customer)
        .await;
    assert_eq!(by_id.status, StatusCode::OK);
    assert_eq!(by_id.data(), by_number.data());
    assert_eq!(by_id.data()["order"], created.data()["order"]);
}

#[tokio::test]
async fn test_my_orders_lists_only_own() {
    let app = TestApp::new();
    app.post("/api/orders", &app.customer, order_body(None)).await;
    app.post("/api/orders", &app.customer, order_body(None)).await;
    app.post("/api/orders", &app.other, order_body(None)).await;

    let reply = app
        .get("/api/orders/my-orders?page=1&limit=1", &app.customer)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.data()["orders"].as_array().unwrap().len(), 1);
    assert_eq!(reply.data()["pagination"]["total"], 2);
    assert_eq!(reply.data()["pagination"]["pages"], 2);
}

// ============================================================================
// Access control
// ============================================================================

#[tokio::test]
async fn test_missing_session_is_401() {
    let app = TestApp::new();
    let reply = app
        .send(Method::GET, "/api/orders/my-orders", None, None, None)
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["success"], false);
}

#[tokio::test]
async fn test_invalid_token_is_401() {
    let app = TestApp::new();
    let reply = app.get("/api/payments/my-payments", "not-a-token").await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_is_accepted() {
    let app = TestApp::new();
    let cookie = format!("theme=dark; medsupply_session={}", app.customer);
    let request = axum::http::Request::builder()
        .uri("/api/orders/my-orders")
        .header(axum::http::header::COOKIE, cookie)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_other_users_order_is_403_without_data() {
    let app = TestApp::new();
    let created = app
        .post("/api/orders", &app.customer, order_body(None))
        .await;
    let id = created.data()["order"]["id"].as_str().unwrap().to_string();

    let reply = app.get(&format!("/api/orders/{id}"), &app.other).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["success"], false);
    assert!(reply.body.get("data").is_none());

    let admin = app.get(&format!("/api/orders/{id}"), &app.admin).await;
    assert_eq!(admin.status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_order_is_404() {
    let app = TestApp::new();
    let reply = app
        .get(&format!("/api/orders/{}", Uuid::new_v4()), &app.customer)
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["message"], "Order not found");
}

#[tokio::test]
async fn test_admin_routes_reject_customers() {
    let app = TestApp::new();
    let stats = app.get("/api/orders/stats/overview", &app.customer).await;
    assert_eq!(stats.status, StatusCode::FORBIDDEN);

    let reconcile = app
        .post("/api/payments/reconcile", &app.customer, json!({}))
        .await;
    assert_eq!(reconcile.status, StatusCode::FORBIDDEN);
}

// ============================================================================
// Status changes
// ============================================================================

#[tokio::test]
async fn test_cancel_only_while_pending() {
    let app = TestApp::new();
    let first = app
        .post("/api/orders", &app.customer, order_body(None))
        .await;
    let first_id = first.data()["order"]["id"].as_str().unwrap().to_string();

    let cancelled = app
        .patch(
            &format!("/api/orders/{first_id}/cancel"),
            &app.customer,
            json!({ "reason": "Ordered twice" }),
        )
        .await;
    assert_eq!(cancelled.status, StatusCode::OK, "{}", cancelled.body);
    assert_eq!(cancelled.data()["order"]["status"], "cancelled");
    assert_eq!(cancelled.data()["order"]["cancelledReason"], "Ordered twice");

    let second = app
        .post("/api/orders", &app.customer, order_body(None))
        .await;
    let second_id = second.data()["order"]["id"].as_str().unwrap().to_string();
    let moved = app
        .patch(
            &format!("/api/orders/{second_id}/status"),
            &app.admin,
            json!({ "status": "processing" }),
        )
        .await;
    assert_eq!(moved.status, StatusCode::OK, "{}", moved.body);

    let refused = app
        .send(
            Method::PATCH,
            &format!("/api/orders/{second_id}/cancel"),
            Some(&app.customer),
            None,
            None,
        )
        .await;
    assert_eq!(refused.status, StatusCode::BAD_REQUEST);

    let still = app
        .get(&format!("/api/orders/{second_id}"), &app.customer)
        .await;
    assert_eq!(still.data()["order"]["status"], "processing");
}

#[tokio::test]
async fn test_admin_marks_order_delivered() {
    let app = TestApp::new();
    let created = app
        .post("/api/orders", &app.customer, order_body(None))
        .await;
    let id = created.data()["order"]["id"].as_str().unwrap().to_string();
    let tracking = created.data()["order"]["tracking"].as_array().unwrap().len();
    assert!(created.data()["order"]["deliveredAt"].is_null());

    let delivered = app
        .patch(
            &format!("/api/orders/{id}/status"),
            &app.admin,
            json!({ "status": "delivered" }),
        )
        .await;
    assert_eq!(delivered.status, StatusCode::OK, "{}", delivered.body);
    let order = &delivered.data()["order"];
    assert_eq!(order["status"], "delivered");
    assert!(order["deliveredAt"].is_string(), "{order}");
    assert_eq!(order["tracking"].as_array().unwrap().len(), tracking);
}

#[tokio::test]
async fn test_admin_refunds_payment() {
    let app = TestApp::new();
    let txn = pay_full(&app, &app.customer).await;

    let reply = app
        .patch(
            &format!("/api/payments/{txn}/status"),
            &app.admin,
            json!({ "status": "refunded", "refundReason": "Damaged in transit" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.data()["payment"]["status"], "refunded");
    assert_eq!(reply.data()["payment"]["refundAmount"].as_f64(), Some(117.5));
}

#[tokio::test]
async fn test_order_stats() {
    let app = TestApp::new();
    app.post("/api/orders", &app.customer, order_body(None)).await;
    app.post("/api/orders", &app.other, order_body(None)).await;

    let reply = app.get("/api/orders/stats/overview", &app.admin).await;
    assert_eq!(reply.status, StatusCode::OK);
    let stats = &reply.data()["stats"];
    assert_eq!(stats["totalOrders"], 2);
    assert_eq!(stats["pending"], 2);
    assert_eq!(stats["totalRevenue"].as_f64(), Some(235.0));
    assert_eq!(stats["averageOrderValue"].as_f64(), Some(117.5));
}

// ============================================================================
// Unified checkout and idempotency
// ============================================================================

#[tokio::test]
async fn test_checkout_creates_pair_and_replays() {
    let app = TestApp::new();
    let body = checkout_body(json!({
        "paymentType": "full-payment",
        "paymentMethod": "pay-online",
        "onlineMethod": card()
    }));

    let first = app
        .send(
            Method::POST,
            "/api/checkout",
            Some(&app.customer),
            Some(body.clone()),
            Some("checkout-key-0001"),
        )
        .await;
    assert_eq!(first.status, StatusCode::CREATED, "{}", first.body);
    let order = &first.data()["order"];
    let payment = &first.data()["payment"];
    assert_eq!(order["total"].as_f64(), Some(117.5));
    assert_eq!(order["paymentDetails"]["transactionId"], payment["transactionId"]);
    assert_eq!(payment["metadata"]["orderDetails"]["orderId"], order["id"]);

    let replay = app
        .send(
            Method::POST,
            "/api/checkout",
            Some(&app.customer),
            Some(body),
            Some("checkout-key-0001"),
        )
        .await;
    assert_eq!(replay.status, StatusCode::OK);
    assert_eq!(replay.data()["order"]["id"], order["id"]);
    assert_eq!(app.store.order_count(), 1);
    assert_eq!(app.store.payment_count(), 1);
}

#[tokio::test]
async fn test_payment_idempotency_header_replays() {
    let app = TestApp::new();
    let body = payment_body("full-payment", card(), 117.5);

    let first = app
        .send(
            Method::POST,
            "/api/payments",
            Some(&app.customer),
            Some(body.clone()),
            Some("payment-key-0001"),
        )
        .await;
    let second = app
        .send(
            Method::POST,
            "/api/payments",
            Some(&app.customer),
            Some(body),
            Some("payment-key-0001"),
        )
        .await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(
        first.data()["payment"]["transactionId"],
        second.data()["payment"]["transactionId"]
    );
    assert_eq!(app.store.payment_count(), 1);
}

#[tokio::test]
async fn test_reconcile_flags_orphan_payments() {
    let app = TestApp::new();
    let reply = app
        .post(
            "/api/payments",
            &app.customer,
            payment_body("full-payment", card(), 117.5),
        )
        .await;
    let id: Uuid = reply.data()["payment"]["id"].as_str().unwrap().parse().unwrap();
    app.store
        .set_payment_created_at(id, Utc::now() - Duration::hours(1));

    let report = app
        .post("/api/payments/reconcile", &app.admin, json!({}))
        .await;
    assert_eq!(report.status, StatusCode::OK, "{}", report.body);
    assert_eq!(report.data()["flagged"], 1);
    assert_eq!(report.data()["payments"][0]["metadata"]["needsReview"], true);
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::new();
    let health = app.send(Method::GET, "/health", None, None, None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "healthy");

    let ready = app.send(Method::GET, "/ready", None, None, None).await;
    assert_eq!(ready.status, StatusCode::OK);

    app.store.set_unavailable(true);
    let down = app.send(Method::GET, "/ready", None, None, None).await;
    assert_eq!(down.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(down.body["components"][0]["name"], "database");
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = TestApp::new();
    let request = axum::http::Request::builder()
        .uri("/api/orders/my-orders")
        .header(axum::http::header::AUTHORIZATION, format!("Bearer {}", app.customer))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
