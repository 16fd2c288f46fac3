//! Client-side checkout orchestration
//!
//! Drives the two-step flow a storefront performs: record the payment, then
//! place the order carrying the payment's transaction id. A submission that
//! arrives while another is running is ignored, which is what keeps a
//! double-clicked "Place order" button from charging twice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use medsupply_types::{
    items_summary, AmountOverflow, CheckoutPaymentInput, CreateOrderRequest, CreatePaymentRequest, Order,
    OrderId, OrderItem, OrderNumber, OrderPaymentInput, Payment, PaymentMetadataInput,
    PaymentStatus, PlanSelection, ShippingDetails, Totals, TransactionId,
};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{BackendError, CheckoutError};

/// The two writes a checkout needs from the server
#[async_trait]
pub trait CheckoutBackend: Send + Sync {
    async fn create_payment(&self, req: &CreatePaymentRequest) -> Result<Payment, BackendError>;

    async fn create_order(&self, req: &CreateOrderRequest) -> Result<Order, BackendError>;
}

/// What the customer filled in on the checkout page
#[derive(Debug, Clone)]
pub struct CheckoutForm {
    pub shipping_details: ShippingDetails,
    pub payment: CheckoutPaymentInput,
    pub currency: String,
    pub notes: Option<String>,
}

/// Shown on the confirmation page
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub transaction_id: TransactionId,
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub amount: Decimal,
    pub payment_status: PaymentStatus,
}

/// Result of a submit call
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Submitted(Confirmation),
    /// Another submission was running; nothing was sent
    AlreadyInFlight,
}

/// Clears the in-flight flag when dropped
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Cart plus checkout submission
pub struct CheckoutOrchestrator<B> {
    backend: B,
    cart: Mutex<Vec<OrderItem>>,
    in_flight: AtomicBool,
}

impl<B: CheckoutBackend> CheckoutOrchestrator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cart: Mutex::new(Vec::new()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn cart(&self) -> MutexGuard<'_, Vec<OrderItem>> {
        self.cart.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an item, merging quantities for a product already in the cart
    pub fn add_item(&self, item: OrderItem) {
        let mut cart = self.cart();
        match cart.iter_mut().find(|i| i.product_id == item.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => cart.push(item),
        }
    }

    pub fn remove_item(&self, product_id: &str) {
        self.cart().retain(|i| i.product_id != product_id);
    }

    /// Set a line's quantity; zero removes it
    pub fn set_quantity(&self, product_id: &str, quantity: u32) {
        let mut cart = self.cart();
        if quantity == 0 {
            cart.retain(|i| i.product_id != product_id);
        } else if let Some(item) = cart.iter_mut().find(|i| i.product_id == product_id) {
            item.quantity = quantity;
        }
    }

    pub fn items(&self) -> Vec<OrderItem> {
        self.cart().clone()
    }

    pub fn totals(&self) -> Result<Totals, AmountOverflow> {
        Totals::from_items(&self.cart())
    }

    pub fn clear(&self) {
        self.cart().clear();
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run the checkout for the current cart
    pub async fn submit(&self, form: CheckoutForm) -> Result<SubmitOutcome, CheckoutError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Checkout already in flight, ignoring submit");
            return Ok(SubmitOutcome::AlreadyInFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let items = self.items();
        if items.is_empty() {
            return Err(CheckoutError::invalid("items", "Your cart is empty"));
        }
        let selection = form.payment.resolve().map_err(CheckoutError::Validation)?;
        let totals = Totals::from_items(&items)
            .map_err(|e| CheckoutError::invalid("items", e.to_string()))?;

        let payment_req = payment_request(&form, &selection, &items, &totals);
        let payment = self.backend.create_payment(&payment_req).await?;

        let order_req = order_request(&form, &payment, items, &totals);
        let order = match self.backend.create_order(&order_req).await {
            Ok(order) => order,
            Err(source) => {
                warn!(
                    transaction_id = %payment.transaction_id,
                    error = %source,
                    "Order failed after payment was recorded"
                );
                return Err(CheckoutError::PartialFailure {
                    transaction_id: payment.transaction_id.0,
                    source,
                });
            }
        };

        self.clear();
        info!(
            order_number = %order.order_number,
            transaction_id = %payment.transaction_id,
            "Checkout submitted"
        );
        Ok(SubmitOutcome::Submitted(Confirmation {
            transaction_id: payment.transaction_id,
            order_id: order.id,
            order_number: order.order_number,
            amount: payment.amount,
            payment_status: payment.status,
        }))
    }
}

fn payment_request(
    form: &CheckoutForm,
    selection: &PlanSelection,
    items: &[OrderItem],
    totals: &Totals,
) -> CreatePaymentRequest {
    let quote = selection.quote(totals);
    let summary = items_summary(items);
    let installment_percentage = match selection {
        PlanSelection::Installment { percentage, .. } => Some(percentage.value()),
        _ => None,
    };
    CreatePaymentRequest {
        amount: quote.amount,
        currency: form.currency.clone(),
        payment_type: selection.plan(),
        payment_method: quote.method.clone(),
        description: quote.description(&summary),
        metadata: PaymentMetadataInput {
            order_id: OrderNumber::generate(Utc::now()).0,
            shipping_details: form.shipping_details.clone(),
            items: items.to_vec(),
            items_summary: Some(summary),
            installment_percentage,
        },
        idempotency_key: Some(Uuid::new_v4().to_string()),
    }
}

fn order_request(
    form: &CheckoutForm,
    payment: &Payment,
    items: Vec<OrderItem>,
    totals: &Totals,
) -> CreateOrderRequest {
    CreateOrderRequest {
        items,
        subtotal: totals.subtotal,
        delivery_fee: totals.delivery_fee,
        tax: totals.tax,
        total: totals.total,
        currency: form.currency.clone(),
        shipping_details: form.shipping_details.clone(),
        payment_details: OrderPaymentInput {
            payment_type: payment.payment_type,
            method: payment.payment_method.kind(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            status: Some(payment.status),
            transaction_id: Some(payment.transaction_id.0.clone()),
        },
        notes: form.notes.clone(),
    }
}

impl<B> std::fmt::Debug for CheckoutOrchestrator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutOrchestrator")
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
