//! Shared fixtures for checkout-core tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use medsupply_checkout_core::{CheckoutConfig, CommerceServices, IdSource, RandomIds};
use medsupply_db::memory::MemoryStore;
use medsupply_types::{
    Caller, CheckoutPaymentInput, CheckoutRequest, CreateOrderRequest, CreatePaymentRequest,
    OrderItem, OrderNumber, OrderPaymentInput, PaymentChannel, PaymentMetadataInput,
    PaymentMethodInput, PaymentMethodKind, PaymentPlan, ShippingDetails, TransactionId,
};
use rust_decimal::Decimal;

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Id source that hands out queued order numbers before falling back to
/// random ones
#[derive(Default)]
pub struct QueuedIds {
    pub order_numbers: Mutex<VecDeque<String>>,
}

impl QueuedIds {
    pub fn with_order_numbers(numbers: &[&str]) -> Self {
        Self {
            order_numbers: Mutex::new(numbers.iter().map(|n| n.to_string()).collect()),
        }
    }
}

impl IdSource for QueuedIds {
    fn order_number(&self, now: DateTime<Utc>) -> OrderNumber {
        match self.order_numbers.lock().unwrap().pop_front() {
            Some(n) => OrderNumber(n),
            None => RandomIds.order_number(now),
        }
    }

    fn transaction_id(&self, now: DateTime<Utc>) -> TransactionId {
        RandomIds.transaction_id(now)
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub services: CommerceServices,
    pub customer: Caller,
    pub other: Caller,
    pub admin: Caller,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(Arc::new(RandomIds), CheckoutConfig::default())
    }

    pub fn with(ids: Arc<dyn IdSource>, config: CheckoutConfig) -> Self {
        let store = MemoryStore::new();
        let services = CommerceServices::with_ids(&store.repositories(), ids, config);
        let customer = store.insert_user("ridge@example.com", "user", true).caller().unwrap();
        let other = store.insert_user("osu@example.com", "user", true).caller().unwrap();
        let admin = store.insert_user("ops@example.com", "admin", true).caller().unwrap();
        Self {
            store,
            services,
            customer,
            other,
            admin,
        }
    }
}

/// Two items, subtotal 100.00, total 117.50
pub fn items() -> Vec<OrderItem> {
    vec![
        OrderItem {
            product_id: "prod-paracetamol".into(),
            name: "Paracetamol 500mg".into(),
            quantity: 2,
            price: dec("30.00"),
            category: Some("analgesics".into()),
            image: None,
        },
        OrderItem {
            product_id: "prod-gloves".into(),
            name: "Nitrile Gloves".into(),
            quantity: 1,
            price: dec("40.00"),
            category: None,
            image: None,
        },
    ]
}

pub fn shipping() -> ShippingDetails {
    ShippingDetails {
        pharmacy_name: "Ridge Pharmacy".into(),
        phone: "0241234567".into(),
        email: "orders@ridge.example".into(),
        location: "Accra".into(),
        street: Some("12 Castle Road".into()),
        gps_address: None,
    }
}

pub fn card() -> PaymentMethodInput {
    PaymentMethodInput::Card {
        card_number: "4111111111111111".into(),
        card_name: "Ama Mensah".into(),
        expiry_date: "12/29".into(),
        cvv: "123".into(),
    }
}

pub fn payment_request(
    plan: PaymentPlan,
    method: PaymentMethodInput,
    amount: &str,
) -> CreatePaymentRequest {
    CreatePaymentRequest {
        amount: dec(amount),
        currency: "GHS".into(),
        payment_type: plan,
        payment_method: method,
        description: "Pharmacy restock".into(),
        metadata: PaymentMetadataInput {
            order_id: "client-ref-1".into(),
            shipping_details: shipping(),
            items: items(),
            items_summary: None,
            installment_percentage: None,
        },
        idempotency_key: None,
    }
}

pub fn order_request(transaction_id: Option<&str>) -> CreateOrderRequest {
    CreateOrderRequest {
        items: items(),
        subtotal: dec("100.00"),
        delivery_fee: dec("5.00"),
        tax: dec("12.50"),
        total: dec("117.50"),
        currency: "GHS".into(),
        shipping_details: shipping(),
        payment_details: OrderPaymentInput {
            payment_type: PaymentPlan::FullPayment,
            method: PaymentMethodKind::Card,
            amount: dec("117.50"),
            currency: "GHS".into(),
            status: None,
            transaction_id: transaction_id.map(str::to_string),
        },
        notes: None,
    }
}

pub fn checkout_request(payment: CheckoutPaymentInput) -> CheckoutRequest {
    CheckoutRequest {
        items: items(),
        shipping_details: shipping(),
        payment,
        currency: "GHS".into(),
        totals: None,
        notes: Some("Deliver before noon".into()),
        idempotency_key: None,
    }
}

pub fn pay_online_full() -> CheckoutPaymentInput {
    CheckoutPaymentInput {
        payment_type: PaymentPlan::FullPayment,
        payment_method: Some(PaymentChannel::PayOnline),
        installment_percentage: None,
        online_method: Some(card()),
    }
}
