//! Order service

use std::sync::Arc;

use chrono::{DateTime, Utc};
use medsupply_db::{
    CheckoutRepository, CreateOrder, DbResult, LinkOrder, OrderRepository, OrderRow,
    OrderStatusChange, PaymentRepository, Repositories, ORDER_NUMBER_KEY,
};
use medsupply_types::validation::field_error;
use medsupply_types::{
    round2, CancelOrderRequest, Caller, CreateOrderRequest, ListQuery, Order, OrderId,
    OrderLink, OrderNumber, OrderPage, OrderPaymentDetails, OrderPaymentInput, OrderStats,
    OrderStatus, PageInfo, Payment, PaymentStatus, Totals, TrackingEntry,
    UpdateOrderStatusRequest, AMOUNT_TOLERANCE,
};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ids::IdSource;
use crate::{CheckoutConfig, CheckoutError};

/// Reason recorded when an admin cancels without giving one
pub const ADMIN_CANCEL_REASON: &str = "Cancelled by administrator";

/// Creates, reads and moves orders through their lifecycle
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    checkouts: Arc<dyn CheckoutRepository>,
    ids: Arc<dyn IdSource>,
    config: CheckoutConfig,
}

impl OrderService {
    pub fn new(repos: &Repositories, ids: Arc<dyn IdSource>, config: CheckoutConfig) -> Self {
        Self {
            orders: repos.orders.clone(),
            payments: repos.payments.clone(),
            checkouts: repos.checkouts.clone(),
            ids,
            config,
        }
    }

    /// Place an order for the caller.
    ///
    /// When `paymentDetails.transactionId` is given it must name an unlinked
    /// payment of the same user whose plan, method, amount and currency match
    /// the request. The order is written and linked onto it in one unit.
    pub async fn create(
        &self,
        caller: &Caller,
        req: CreateOrderRequest,
        now: DateTime<Utc>,
    ) -> Result<Order, CheckoutError> {
        req.check().map_err(CheckoutError::Validation)?;

        let totals = Totals::from_items(&req.items)
            .map_err(|e| CheckoutError::invalid("items", e.to_string()))?;
        check_totals(&self.config, &totals, &req.claimed_totals(), "")?;

        let payment = match req.payment_details.transaction_id.as_deref() {
            Some(transaction_id) => Some(self.payment_for_order(caller, transaction_id).await?),
            None => None,
        };

        let payment_details = match &payment {
            Some(payment) => linked_payment_details(payment, &req.payment_details)?,
            None => OrderPaymentDetails {
                payment_type: req.payment_details.payment_type,
                method: req.payment_details.method,
                amount: round2(req.payment_details.amount),
                currency: req.payment_details.currency.clone(),
                status: req.payment_details.status.unwrap_or(PaymentStatus::Pending),
                transaction_id: None,
            },
        };

        let mut attempts = 0;
        let row = loop {
            attempts += 1;
            let order = CreateOrder {
                id: Uuid::new_v4(),
                order_number: self.ids.order_number(now).0,
                user_id: caller.user_id.0,
                items: req.items.clone(),
                totals,
                currency: req.currency.clone(),
                shipping_details: req.shipping_details.clone(),
                payment_details: payment_details.clone(),
                tracking: vec![TrackingEntry::placed(now)],
                status: OrderStatus::Pending,
                notes: req.notes.clone(),
                created_at: now,
            };
            let written = match &payment {
                Some(payment) => self.create_linked(payment, order, now).await,
                None => self.orders.create(order).await.map(Some),
            };
            match written {
                Ok(Some(row)) => break row,
                // Linked elsewhere since `payment_for_order` read it
                Ok(None) => {
                    let transaction_id = payment
                        .as_ref()
                        .map(|p| p.transaction_id.as_str())
                        .unwrap_or_default();
                    return Err(already_linked(transaction_id));
                }
                Err(e) if e.is_unique_violation_of(ORDER_NUMBER_KEY) => {
                    warn!(attempts, "Order number collision, retrying");
                    if attempts >= self.config.id_attempts {
                        return Err(CheckoutError::IdsExhausted("order number"));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        };
        let order = Order::try_from(row)?;

        metrics::counter!("commerce_orders_created_total").increment(1);
        info!(
            order_number = %order.order_number,
            user_id = %order.user_id,
            total = %order.total,
            "Order created"
        );
        Ok(order)
    }

    async fn create_linked(
        &self,
        payment: &Payment,
        order: CreateOrder,
        now: DateTime<Utc>,
    ) -> DbResult<Option<OrderRow>> {
        let link = LinkOrder {
            payment_id: payment.id.0,
            link: OrderLink {
                order_id: OrderId(order.id),
                order_number: OrderNumber(order.order_number.clone()),
                status: order.status,
                linked_at: now,
            },
        };
        let written = self.checkouts.create_linked_order(order, link).await?;
        Ok(written.map(|(row, _)| row))
    }

    async fn payment_for_order(
        &self,
        caller: &Caller,
        transaction_id: &str,
    ) -> Result<Payment, CheckoutError> {
        let unknown = || {
            CheckoutError::invalid(
                "paymentDetails.transactionId",
                "No payment with this transaction id belongs to you",
            )
        };
        let row = self
            .payments
            .find_by_transaction_id(transaction_id)
            .await?
            .ok_or_else(unknown)?;
        let payment = Payment::try_from(row)?;
        if payment.user_id != caller.user_id {
            return Err(unknown());
        }
        if payment.is_linked() {
            return Err(already_linked(transaction_id));
        }
        Ok(payment)
    }

    /// Fetch by UUID or order number, applying the owner-or-admin rule
    pub async fn get(&self, caller: &Caller, id: &str) -> Result<Order, CheckoutError> {
        let order = self.find(id).await?;
        if !caller.can_access(order.user_id) {
            return Err(CheckoutError::Forbidden);
        }
        Ok(order)
    }

    async fn find(&self, id: &str) -> Result<Order, CheckoutError> {
        let row: Option<OrderRow> = match Uuid::parse_str(id) {
            Ok(uuid) => self.orders.find_by_id(uuid).await?,
            Err(_) => self.orders.find_by_order_number(id).await?,
        };
        let row = row.ok_or(CheckoutError::NotFound("Order"))?;
        Ok(Order::try_from(row)?)
    }

    /// The caller's own orders, newest first
    pub async fn list(&self, caller: &Caller, query: &ListQuery) -> Result<OrderPage, CheckoutError> {
        let status = query
            .status_filter::<OrderStatus>()
            .map_err(CheckoutError::Validation)?;
        let status = status.map(OrderStatus::as_str);
        let pagination = query.pagination().normalized();

        let rows = self
            .orders
            .list_for_user(
                caller.user_id.0,
                status,
                pagination.limit() as i64,
                pagination.offset() as i64,
            )
            .await?;
        let total = self.orders.count_for_user(caller.user_id.0, status).await?;

        let orders = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(OrderPage {
            orders,
            pagination: PageInfo::new(total.max(0) as u64, &pagination),
        })
    }

    /// Admin status change
    pub async fn update_status(
        &self,
        id: &str,
        req: UpdateOrderStatusRequest,
        now: DateTime<Utc>,
    ) -> Result<Order, CheckoutError> {
        req.check().map_err(CheckoutError::Validation)?;
        let order = self.find(id).await?;
        let from = order.status;
        let to = req.status;

        if from == to {
            if req.tracking_update.is_none() {
                return Err(CheckoutError::InvalidState(format!(
                    "Order is already {from}"
                )));
            }
        } else if !from.can_transition_to(to) {
            return Err(CheckoutError::InvalidState(format!(
                "Cannot change order status from {from} to {to}"
            )));
        }

        let tracking = req
            .tracking_update
            .map(|update| {
                TrackingEntry::new(update.status.unwrap_or_else(|| to.as_str().to_string()), now)
                    .with_description(update.description)
                    .with_location(update.location)
            })
            .into_iter()
            .collect();

        let cancelling = to == OrderStatus::Cancelled && from != to;
        let change = OrderStatusChange {
            expected: from,
            status: to,
            tracking,
            delivered_at: (to == OrderStatus::Delivered && from != to).then_some(now),
            cancelled_at: cancelling.then_some(now),
            cancelled_reason: cancelling.then(|| {
                req.cancelled_reason
                    .clone()
                    .unwrap_or_else(|| ADMIN_CANCEL_REASON.to_string())
            }),
            estimated_delivery: req.estimated_delivery,
            updated_at: now,
        };

        let row = self
            .orders
            .update_status(order.id.0, change)
            .await?
            .ok_or(CheckoutError::Conflict("Order"))?;
        if cancelling {
            metrics::counter!("commerce_orders_cancelled_total").increment(1);
        }
        info!(order_number = %order.order_number, %from, %to, "Order status updated");
        Ok(Order::try_from(row)?)
    }

    /// Cancel a pending order on behalf of its owner or an admin
    pub async fn cancel(
        &self,
        caller: &Caller,
        id: &str,
        req: CancelOrderRequest,
        now: DateTime<Utc>,
    ) -> Result<Order, CheckoutError> {
        req.check().map_err(CheckoutError::Validation)?;
        let order = self.get(caller, id).await?;
        let not_pending = || {
            CheckoutError::InvalidState("Only pending orders can be cancelled".to_string())
        };
        if order.status != OrderStatus::Pending {
            return Err(not_pending());
        }

        let reason = req.reason_or_default();
        let change = OrderStatusChange {
            expected: OrderStatus::Pending,
            status: OrderStatus::Cancelled,
            tracking: vec![TrackingEntry::cancelled(now, &reason)],
            delivered_at: None,
            cancelled_at: Some(now),
            cancelled_reason: Some(reason),
            estimated_delivery: None,
            updated_at: now,
        };
        let row = self
            .orders
            .update_status(order.id.0, change)
            .await?
            .ok_or_else(not_pending)?;

        metrics::counter!("commerce_orders_cancelled_total").increment(1);
        info!(order_number = %order.order_number, "Order cancelled");
        Ok(Order::try_from(row)?)
    }

    /// Dashboard aggregates across all orders
    pub async fn stats(&self) -> Result<OrderStats, CheckoutError> {
        let row = self.orders.stats().await?;
        let average_order_value = if row.revenue_orders > 0 {
            round2(row.revenue / Decimal::from(row.revenue_orders))
        } else {
            Decimal::ZERO
        };
        let count = |n: i64| n.max(0) as u64;
        Ok(OrderStats {
            total_orders: count(row.total_orders),
            pending: count(row.pending),
            processing: count(row.processing),
            shipped: count(row.shipped),
            delivered: count(row.delivered),
            cancelled: count(row.cancelled),
            refunded: count(row.refunded),
            total_revenue: round2(row.revenue),
            average_order_value,
        })
    }
}

/// Reject claimed totals that disagree with the recomputed ones
fn already_linked(transaction_id: &str) -> CheckoutError {
    CheckoutError::InvalidState(format!(
        "Payment {transaction_id} is already linked to an order"
    ))
}

/// Payment details of an order placed against `payment`, taken from the
/// payment itself. Claims that contradict it are field errors.
fn linked_payment_details(
    payment: &Payment,
    claimed: &OrderPaymentInput,
) -> Result<OrderPaymentDetails, CheckoutError> {
    let method = payment.payment_method.kind();
    let mut errors = Vec::new();
    if claimed.payment_type != payment.payment_type {
        errors.push(field_error(
            "paymentDetails.type",
            format!("Linked payment is a {} payment", payment.payment_type.as_str()),
        ));
    }
    if claimed.method != method {
        errors.push(field_error(
            "paymentDetails.method",
            format!("Linked payment was made by {}", method.as_str()),
        ));
    }
    if (round2(claimed.amount) - payment.amount).abs() > AMOUNT_TOLERANCE {
        errors.push(field_error(
            "paymentDetails.amount",
            format!("Linked payment is for {}", payment.amount),
        ));
    }
    if !claimed.currency.eq_ignore_ascii_case(&payment.currency) {
        errors.push(field_error(
            "paymentDetails.currency",
            format!("Linked payment is in {}", payment.currency),
        ));
    }
    if !errors.is_empty() {
        return Err(CheckoutError::Validation(errors));
    }

    Ok(OrderPaymentDetails {
        payment_type: payment.payment_type,
        method,
        amount: payment.amount,
        currency: payment.currency.clone(),
        status: payment.status,
        transaction_id: Some(payment.transaction_id.clone()),
    })
}

pub(crate) fn check_totals(
    config: &CheckoutConfig,
    computed: &Totals,
    claimed: &Totals,
    prefix: &str,
) -> Result<(), CheckoutError> {
    if !config.strict_totals {
        return Ok(());
    }
    let mismatched = computed.mismatches(claimed);
    if mismatched.is_empty() {
        return Ok(());
    }
    let errors = mismatched
        .into_iter()
        .map(|name| {
            let expected = match name {
                "subtotal" => computed.subtotal,
                "deliveryFee" => computed.delivery_fee,
                "tax" => computed.tax,
                _ => computed.total,
            };
            field_error(
                &format!("{prefix}{name}"),
                format!("Expected {expected} from the item prices"),
            )
        })
        .collect();
    Err(CheckoutError::Validation(errors))
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
