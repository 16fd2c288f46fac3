//! Unified checkout: payment and order written together

use std::sync::Arc;

use chrono::{DateTime, Utc};
use medsupply_db::{
    CheckoutRepository, CreateOrder, CreatePayment, OrderRepository, Repositories,
    IDEMPOTENCY_KEY, ORDER_NUMBER_KEY, TRANSACTION_ID_KEY,
};
use medsupply_types::{
    items_summary, Caller, CheckoutReceipt, CheckoutRequest, Order, OrderId, OrderLink,
    OrderPaymentDetails, OrderStatus, Payment, PaymentMetadata, Totals, TrackingEntry,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::ids::IdSource;
use crate::orders::check_totals;
use crate::payments::{check_idempotency_key, PaymentService, Recorded};
use crate::{CheckoutConfig, CheckoutError};

/// Writes a linked payment and order in one transaction
pub struct CheckoutService {
    checkouts: Arc<dyn CheckoutRepository>,
    orders: Arc<dyn OrderRepository>,
    payments: Arc<PaymentService>,
    ids: Arc<dyn IdSource>,
    config: CheckoutConfig,
}

impl CheckoutService {
    pub fn new(
        repos: &Repositories,
        payments: Arc<PaymentService>,
        ids: Arc<dyn IdSource>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            checkouts: repos.checkouts.clone(),
            orders: repos.orders.clone(),
            payments,
            ids,
            config,
        }
    }

    pub async fn checkout(
        &self,
        caller: &Caller,
        req: CheckoutRequest,
        idempotency_key: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Recorded<CheckoutReceipt>, CheckoutError> {
        let key = check_idempotency_key(idempotency_key.or_else(|| req.idempotency_key.clone()))?;
        if let Some(key) = key.as_deref() {
            if let Some(receipt) = self.replay(caller, key).await? {
                return Ok(Recorded::replayed(receipt));
            }
        }

        let selection = req.check().map_err(CheckoutError::Validation)?;
        let totals = Totals::from_items(&req.items)
            .map_err(|e| CheckoutError::invalid("items", e.to_string()))?;
        if let Some(claimed) = &req.totals {
            check_totals(&self.config, &totals, claimed, "totals.")?;
        }
        let quote = selection.quote(&totals);
        let summary = items_summary(&req.items);

        let mut attempts = 0;
        let (payment_row, order_row) = loop {
            attempts += 1;
            let order_id = OrderId::new();
            let order_number = self.ids.order_number(now);
            let transaction_id = self.ids.transaction_id(now);

            let payment = CreatePayment {
                id: Uuid::new_v4(),
                transaction_id: transaction_id.0.clone(),
                user_id: caller.user_id.0,
                amount: quote.amount,
                currency: req.currency.clone(),
                payment_type: selection.plan(),
                payment_method: quote.method.sanitize(),
                status: quote.status,
                description: quote.description(&summary),
                metadata: PaymentMetadata {
                    order_id: order_number.0.clone(),
                    plan: quote.plan.clone(),
                    shipping_details: req.shipping_details.clone(),
                    items: req.items.clone(),
                    items_summary: summary.clone(),
                    order_details: Some(OrderLink {
                        order_id,
                        order_number: order_number.clone(),
                        status: OrderStatus::Pending,
                        linked_at: now,
                    }),
                    needs_review: false,
                },
                idempotency_key: key.clone(),
                created_at: now,
            };
            let order = CreateOrder {
                id: order_id.0,
                order_number: order_number.0,
                user_id: caller.user_id.0,
                items: req.items.clone(),
                totals,
                currency: req.currency.clone(),
                shipping_details: req.shipping_details.clone(),
                payment_details: OrderPaymentDetails {
                    payment_type: selection.plan(),
                    method: quote.method.kind(),
                    amount: quote.amount,
                    currency: req.currency.clone(),
                    status: quote.status,
                    transaction_id: Some(transaction_id),
                },
                tracking: vec![TrackingEntry::placed(now)],
                status: OrderStatus::Pending,
                notes: req.notes.clone(),
                created_at: now,
            };

            match self.checkouts.create_checkout(payment, order).await {
                Ok(rows) => break rows,
                Err(e)
                    if e.is_unique_violation_of(ORDER_NUMBER_KEY)
                        || e.is_unique_violation_of(TRANSACTION_ID_KEY) =>
                {
                    warn!(attempts, error = %e, "Checkout identifier collision, retrying");
                    if attempts >= self.config.id_attempts {
                        return Err(CheckoutError::IdsExhausted("checkout identifier"));
                    }
                }
                Err(e) if e.is_unique_violation_of(IDEMPOTENCY_KEY) => {
                    let key = key.as_deref().unwrap_or_default();
                    return match self.replay(caller, key).await? {
                        Some(receipt) => Ok(Recorded::replayed(receipt)),
                        None => Err(e.into()),
                    };
                }
                Err(e) => return Err(e.into()),
            }
        };

        let receipt = CheckoutReceipt {
            payment: Payment::try_from(payment_row)?,
            order: Order::try_from(order_row)?,
        };

        metrics::counter!(
            "commerce_payments_created_total",
            "plan" => receipt.payment.payment_type.as_str()
        )
        .increment(1);
        metrics::counter!("commerce_orders_created_total").increment(1);
        info!(
            order_number = %receipt.order.order_number,
            transaction_id = %receipt.payment.transaction_id,
            total = %receipt.order.total,
            "Checkout completed"
        );
        Ok(Recorded::fresh(receipt))
    }

    async fn replay(
        &self,
        caller: &Caller,
        key: &str,
    ) -> Result<Option<CheckoutReceipt>, CheckoutError> {
        let Some(payment) = self.payments.by_idempotency_key(caller, key).await? else {
            return Ok(None);
        };
        let Some(link) = payment.metadata.order_details.clone() else {
            return Err(CheckoutError::InvalidState(
                "Idempotency key was already used for a payment without an order".to_string(),
            ));
        };
        let row = self
            .orders
            .find_by_id(link.order_id.0)
            .await?
            .ok_or(CheckoutError::NotFound("Order"))?;
        Ok(Some(CheckoutReceipt {
            payment,
            order: Order::try_from(row)?,
        }))
    }
}

impl std::fmt::Debug for CheckoutService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
