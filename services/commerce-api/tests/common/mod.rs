//! In-process test server backed by the in-memory store

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use commerce_api::{build_router, AppState, Config};
use medsupply_auth_core::AuthConfig;
use medsupply_db::memory::MemoryStore;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret-0123456789abcdef";

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub router: Router,
    pub customer: String,
    pub other: String,
    pub admin: String,
}

pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn fields(&self) -> Vec<String> {
        self.body["errors"]
            .as_array()
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|e| e["field"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl TestApp {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let config = Config::new("memory", AuthConfig::new(SECRET));
        let state = AppState::new(store.repositories(), config).unwrap();

        let token = |email: &str, role: &str| {
            let caller = store.insert_user(email, role, true).caller().unwrap();
            state.auth.issue(caller.user_id).unwrap()
        };
        let customer = token("ridge@example.com", "user");
        let other = token("osu@example.com", "user");
        let admin = token("ops@example.com", "admin");

        Self {
            router: build_router(state, None),
            store,
            customer,
            other,
            admin,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        idempotency_key: Option<&str>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(key) = idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        Reply { status, body }
    }

    pub async fn get(&self, uri: &str, token: &str) -> Reply {
        self.send(Method::GET, uri, Some(token), None, None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Reply {
        self.send(Method::POST, uri, Some(token), Some(body), None).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> Reply {
        self.send(Method::PATCH, uri, Some(token), Some(body), None)
            .await
    }
}

pub fn shipping() -> Value {
    json!({
        "pharmacyName": "Ridge Pharmacy",
        "phone": "0241234567",
        "email": "orders@ridge.example",
        "location": "Accra",
        "street": "12 Castle Road"
    })
}

/// Subtotal 100.00, total 117.50
pub fn items() -> Value {
    json!([
        { "productId": "prod-paracetamol", "name": "Paracetamol 500mg", "quantity": 2, "price": 30.0 },
        { "productId": "prod-gloves", "name": "Nitrile Gloves", "quantity": 1, "price": 40.0 }
    ])
}

pub fn card() -> Value {
    json!({
        "type": "card",
        "cardNumber": "4111111111111111",
        "cardName": "Ama Mensah",
        "expiryDate": "12/29",
        "cvv": "123"
    })
}

pub fn payment_body(plan: &str, method: Value, amount: f64) -> Value {
    json!({
        "amount": amount,
        "currency": "GHS",
        "paymentType": plan,
        "paymentMethod": method,
        "description": "Pharmacy restock",
        "metadata": {
            "orderId": "client-ref-1",
            "shippingDetails": shipping(),
            "items": items()
        }
    })
}

pub fn order_body(transaction_id: Option<&str>) -> Value {
    json!({
        "items": items(),
        "subtotal": 100.0,
        "deliveryFee": 5.0,
        "tax": 12.5,
        "total": 117.5,
        "currency": "GHS",
        "shippingDetails": shipping(),
        "paymentDetails": {
            "type": "full-payment",
            "method": "card",
            "amount": 117.5,
            "transactionId": transaction_id
        }
    })
}

pub fn checkout_body(payment: Value) -> Value {
    json!({
        "items": items(),
        "shippingDetails": shipping(),
        "payment": payment,
        "currency": "GHS"
    })
}
