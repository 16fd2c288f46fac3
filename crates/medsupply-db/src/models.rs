//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive.
//! JSONB columns are typed through `sqlx::types::Json`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use medsupply_types::{
    Caller, Order, OrderId, OrderItem, OrderLink, OrderNumber, OrderPaymentDetails, OrderStatus,
    Payment, PaymentId, PaymentMetadata, PaymentMethod, PaymentPlan, PaymentStatus, Role,
    ShippingDetails, Totals, TrackingEntry, TransactionId, UserId,
};

use crate::error::DbError;

/// User row from the database
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    /// Convert to domain UserId
    pub fn user_id(&self) -> UserId {
        UserId(self.id)
    }

    /// Identity and role of this user as a request caller
    pub fn caller(&self) -> Result<Caller, DbError> {
        let role: Role = self
            .role
            .parse()
            .map_err(|e| DbError::Decode(format!("user {}: {e}", self.id)))?;
        Ok(Caller {
            user_id: self.user_id(),
            role,
        })
    }
}

/// Order row from the database
#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub items: Json<Vec<OrderItem>>,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub shipping_details: Json<ShippingDetails>,
    pub payment_details: Json<OrderPaymentDetails>,
    pub tracking: Json<Vec<TrackingEntry>>,
    pub status: String,
    pub notes: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const ORDER_COLUMNS: &str = "id, order_number, user_id, items, subtotal, delivery_fee, \
     tax, total, currency, shipping_details, payment_details, tracking, status, notes, \
     estimated_delivery, delivered_at, cancelled_at, cancelled_reason, created_at, updated_at";

impl TryFrom<OrderRow> for Order {
    type Error = DbError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status: OrderStatus = row
            .status
            .parse()
            .map_err(|e| DbError::Decode(format!("order {}: {e}", row.id)))?;

        Ok(Order {
            id: OrderId(row.id),
            order_number: OrderNumber(row.order_number),
            user_id: UserId(row.user_id),
            items: row.items.0,
            subtotal: row.subtotal,
            delivery_fee: row.delivery_fee,
            tax: row.tax,
            total: row.total,
            currency: row.currency,
            shipping_details: row.shipping_details.0,
            payment_details: row.payment_details.0,
            tracking: row.tracking.0,
            status,
            notes: row.notes,
            estimated_delivery: row.estimated_delivery,
            delivered_at: row.delivered_at,
            cancelled_at: row.cancelled_at,
            cancelled_reason: row.cancelled_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Payment row from the database
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub transaction_id: String,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_type: String,
    pub payment_method: Json<PaymentMethod>,
    pub status: String,
    pub description: String,
    pub metadata: Json<PaymentMetadata>,
    pub gateway_response: Option<Json<serde_json::Value>>,
    pub refund_amount: Option<Decimal>,
    pub refund_reason: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const PAYMENT_COLUMNS: &str = "id, transaction_id, user_id, amount, currency, \
     payment_type, payment_method, status, description, metadata, gateway_response, \
     refund_amount, refund_reason, idempotency_key, created_at, updated_at";

impl TryFrom<PaymentRow> for Payment {
    type Error = DbError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let decode = |e: medsupply_types::ParseEnumError| {
            DbError::Decode(format!("payment {}: {e}", row.id))
        };
        let payment_type: PaymentPlan = row.payment_type.parse().map_err(decode)?;
        let status: PaymentStatus = row.status.parse().map_err(decode)?;

        Ok(Payment {
            id: PaymentId(row.id),
            transaction_id: TransactionId(row.transaction_id),
            user_id: UserId(row.user_id),
            amount: row.amount,
            currency: row.currency,
            payment_type,
            payment_method: row.payment_method.0,
            status,
            description: row.description,
            metadata: row.metadata.0,
            gateway_response: row.gateway_response.map(|j| j.0),
            refund_amount: row.refund_amount,
            refund_reason: row.refund_reason,
            idempotency_key: row.idempotency_key,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Aggregates over the orders table
#[derive(Debug, Clone, Default, FromRow)]
pub struct OrderStatsRow {
    pub total_orders: i64,
    pub pending: i64,
    pub processing: i64,
    pub shipped: i64,
    pub delivered: i64,
    pub cancelled: i64,
    pub refunded: i64,
    /// Sum of totals over orders that still count as sales
    pub revenue: Decimal,
    /// Number of orders summed into `revenue`
    pub revenue_orders: i64,
}

/// Create order input
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    pub totals: Totals,
    pub currency: String,
    pub shipping_details: ShippingDetails,
    pub payment_details: OrderPaymentDetails,
    pub tracking: Vec<TrackingEntry>,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CreateOrder> for OrderRow {
    fn from(order: CreateOrder) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            user_id: order.user_id,
            items: Json(order.items),
            subtotal: order.totals.subtotal,
            delivery_fee: order.totals.delivery_fee,
            tax: order.totals.tax,
            total: order.totals.total,
            currency: order.currency,
            shipping_details: Json(order.shipping_details),
            payment_details: Json(order.payment_details),
            tracking: Json(order.tracking),
            status: order.status.as_str().to_string(),
            notes: order.notes,
            estimated_delivery: None,
            delivered_at: None,
            cancelled_at: None,
            cancelled_reason: None,
            created_at: order.created_at,
            updated_at: order.created_at,
        }
    }
}

/// Create payment input
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub id: Uuid,
    pub transaction_id: String,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_type: PaymentPlan,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub description: String,
    pub metadata: PaymentMetadata,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CreatePayment> for PaymentRow {
    fn from(payment: CreatePayment) -> Self {
        Self {
            id: payment.id,
            transaction_id: payment.transaction_id,
            user_id: payment.user_id,
            amount: payment.amount,
            currency: payment.currency,
            payment_type: payment.payment_type.as_str().to_string(),
            payment_method: Json(payment.payment_method),
            status: payment.status.as_str().to_string(),
            description: payment.description,
            metadata: Json(payment.metadata),
            gateway_response: None,
            refund_amount: None,
            refund_reason: None,
            idempotency_key: payment.idempotency_key,
            created_at: payment.created_at,
            updated_at: payment.created_at,
        }
    }
}

/// Compare-and-set order status change
#[derive(Debug, Clone)]
pub struct OrderStatusChange {
    /// Status the order must still have for the change to apply
    pub expected: OrderStatus,
    pub status: OrderStatus,
    /// Entries appended to the tracking history, possibly none
    pub tracking: Vec<TrackingEntry>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_reason: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl OrderStatusChange {
    pub(crate) fn apply(&self, row: &mut OrderRow) {
        row.status = self.status.as_str().to_string();
        row.tracking.0.extend(self.tracking.iter().cloned());
        if self.delivered_at.is_some() {
            row.delivered_at = self.delivered_at;
        }
        if self.cancelled_at.is_some() {
            row.cancelled_at = self.cancelled_at;
        }
        if self.cancelled_reason.is_some() {
            row.cancelled_reason.clone_from(&self.cancelled_reason);
        }
        if self.estimated_delivery.is_some() {
            row.estimated_delivery = self.estimated_delivery;
        }
        row.updated_at = self.updated_at;
    }
}

/// Compare-and-set payment status change
#[derive(Debug, Clone)]
pub struct PaymentStatusChange {
    pub expected: PaymentStatus,
    pub status: PaymentStatus,
    pub refund_amount: Option<Decimal>,
    pub refund_reason: Option<String>,
    pub gateway_response: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentStatusChange {
    pub(crate) fn apply(&self, row: &mut PaymentRow) {
        row.status = self.status.as_str().to_string();
        if self.refund_amount.is_some() {
            row.refund_amount = self.refund_amount;
        }
        if self.refund_reason.is_some() {
            row.refund_reason.clone_from(&self.refund_reason);
        }
        if let Some(response) = &self.gateway_response {
            row.gateway_response = Some(Json(response.clone()));
        }
        row.updated_at = self.updated_at;
    }
}

/// Link written onto a payment once its order exists
#[derive(Debug, Clone)]
pub struct LinkOrder {
    pub payment_id: Uuid,
    pub link: OrderLink,
}

impl LinkOrder {
    pub(crate) fn apply(&self, row: &mut PaymentRow) {
        row.metadata.0.order_id = self.link.order_number.as_str().to_string();
        row.metadata.0.order_details = Some(self.link.clone());
        row.updated_at = self.link.linked_at;
    }
}
