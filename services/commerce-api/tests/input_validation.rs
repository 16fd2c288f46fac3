//! Input validation tests
//!
//! Every rejected request must come back as a 400 envelope that names the
//! offending fields, and nothing may be written.

mod common;

use axum::http::{Method, StatusCode};
use common::*;
use serde_json::json;

// ============================================================================
// Payments
// ============================================================================

#[tokio::test]
async fn test_payment_rejects_zero_amount_and_short_card() {
    let app = TestApp::new();
    let mut body = payment_body("full-payment", card(), 0.0);
    body["paymentMethod"]["cardNumber"] = json!("12");

    let reply = app.post("/api/payments", &app.customer, body).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["success"], false);
    let fields = reply.fields();
    assert!(fields.contains(&"amount".to_string()), "{fields:?}");
    assert!(fields.contains(&"paymentMethod.cardNumber".to_string()), "{fields:?}");
    assert_eq!(app.store.payment_count(), 0);
}

#[tokio::test]
async fn test_installment_requires_percentage() {
    let app = TestApp::new();
    let body = payment_body("installment-payment", card(), 70.5);

    let reply = app.post("/api/payments", &app.customer, body).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.fields(), vec!["metadata.installmentPercentage"]);
}

#[tokio::test]
async fn test_payment_amount_must_match_items() {
    let app = TestApp::new();
    let body = payment_body("full-payment", card(), 99.0);

    let reply = app.post("/api/payments", &app.customer, body).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.fields(), vec!["amount"]);
}

#[tokio::test]
async fn test_short_idempotency_key_is_rejected() {
    let app = TestApp::new();
    let reply = app
        .send(
            Method::POST,
            "/api/payments",
            Some(&app.customer),
            Some(payment_body("full-payment", card(), 117.5)),
            Some("abc"),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.store.payment_count(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let app = TestApp::new();
    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/payments")
        .header(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {}", app.customer),
        )
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("{\"amount\": "))
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_payment_type_is_400() {
    let app = TestApp::new();
    let body = payment_body("layaway", card(), 117.5);
    let reply = app.post("/api/payments", &app.customer, body).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Orders
// ============================================================================

#[tokio::test]
async fn test_order_item_and_shipping_fields() {
    let app = TestApp::new();
    let mut body = order_body(None);
    body["items"][0]["quantity"] = json!(0);
    body["shippingDetails"]["email"] = json!("not-an-email");

    let reply = app.post("/api/orders", &app.customer, body).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let fields = reply.fields();
    assert!(fields.contains(&"items[0].quantity".to_string()), "{fields:?}");
    assert!(fields.contains(&"shippingDetails.email".to_string()), "{fields:?}");
    assert_eq!(app.store.order_count(), 0);
}

#[tokio::test]
async fn test_order_empty_items() {
    let app = TestApp::new();
    let mut body = order_body(None);
    body["items"] = json!([]);

    let reply = app.post("/api/orders", &app.customer, body).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.fields().contains(&"items".to_string()));
}

#[tokio::test]
async fn test_order_totals_must_add_up() {
    let app = TestApp::new();
    let mut body = order_body(None);
    body["total"] = json!(90.0);

    let reply = app.post("/api/orders", &app.customer, body).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.fields(), vec!["total"]);
}

#[tokio::test]
async fn test_order_with_foreign_transaction() {
    let app = TestApp::new();
    let payment = app
        .post(
            "/api/payments",
            &app.other,
            payment_body("full-payment", card(), 117.5),
        )
        .await;
    let txn = payment.data()["payment"]["transactionId"]
        .as_str()
        .unwrap()
        .to_string();

    let reply = app
        .post("/api/orders", &app.customer, order_body(Some(&txn)))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.fields(), vec!["paymentDetails.transactionId"]);
}

#[tokio::test]
async fn test_list_rejects_unknown_status_filter() {
    let app = TestApp::new();
    let reply = app
        .get("/api/orders/my-orders?status=lost", &app.customer)
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.fields(), vec!["status"]);
}

#[tokio::test]
async fn test_list_rejects_malformed_page() {
    let app = TestApp::new();
    for uri in [
        "/api/orders/my-orders?page=abc",
        "/api/payments/my-payments?page=abc",
    ] {
        let reply = app.get(uri, &app.customer).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(reply.body["success"], false, "{uri}");
        let message = reply.body["message"].as_str().unwrap_or_default();
        assert!(message.starts_with("Invalid query string"), "{message}");
    }
}

#[tokio::test]
async fn test_order_rejects_oversized_price() {
    let app = TestApp::new();
    let mut body = order_body(None);
    body["items"][0]["price"] = json!(1e28);
    body["items"][0]["quantity"] = json!(10);

    let reply = app.post("/api/orders", &app.customer, body).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.fields(), vec!["items[0].price"]);
    assert_eq!(app.store.order_count(), 0);
}

#[tokio::test]
async fn test_order_details_must_match_linked_payment() {
    let app = TestApp::new();
    let payment = app
        .post(
            "/api/payments",
            &app.customer,
            payment_body("credit", json!({ "type": "credit" }), 117.5),
        )
        .await;
    assert_eq!(payment.status, StatusCode::CREATED, "{}", payment.body);
    let txn = payment.data()["payment"]["transactionId"]
        .as_str()
        .unwrap()
        .to_string();

    let reply = app
        .post("/api/orders", &app.customer, order_body(Some(&txn)))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        reply.fields(),
        vec!["paymentDetails.type", "paymentDetails.method"]
    );
    assert_eq!(app.store.order_count(), 0);
}

#[tokio::test]
async fn test_status_update_rejects_backward_move() {
    let app = TestApp::new();
    let created = app
        .post("/api/orders", &app.customer, order_body(None))
        .await;
    let id = created.data()["order"]["id"].as_str().unwrap().to_string();
    app.patch(
        &format!("/api/orders/{id}/status"),
        &app.admin,
        json!({ "status": "shipped" }),
    )
    .await;

    let reply = app
        .patch(
            &format!("/api/orders/{id}/status"),
            &app.admin,
            json!({ "status": "pending" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_rejects_malformed_body() {
    let app = TestApp::new();
    let created = app
        .post("/api/orders", &app.customer, order_body(None))
        .await;
    let id = created.data()["order"]["id"].as_str().unwrap().to_string();

    let reply = app
        .patch(
            &format!("/api/orders/{id}/cancel"),
            &app.customer,
            json!({ "reason": 42 }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
async fn test_checkout_online_without_method() {
    let app = TestApp::new();
    let body = checkout_body(json!({
        "paymentType": "full-payment",
        "paymentMethod": "pay-online"
    }));

    let reply = app.post("/api/checkout", &app.customer, body).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.fields(), vec!["payment.onlineMethod"]);
    assert_eq!(app.store.order_count(), 0);
    assert_eq!(app.store.payment_count(), 0);
}

#[tokio::test]
async fn test_checkout_claimed_totals_mismatch() {
    let app = TestApp::new();
    let mut body = checkout_body(json!({
        "paymentType": "full-payment",
        "paymentMethod": "pay-on-delivery"
    }));
    body["totals"] = json!({ "subtotal": 100.0, "deliveryFee": 0.0, "tax": 12.5, "total": 112.5 });

    let reply = app.post("/api/checkout", &app.customer, body).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.fields(), vec!["totals.deliveryFee", "totals.total"]);
}
