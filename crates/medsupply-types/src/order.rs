//! Order types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ParseEnumError;
use crate::ids::{OrderId, OrderNumber, TransactionId};
use crate::payment::{PaymentMethodKind, PaymentPlan, PaymentStatus};
use crate::user::UserId;
use crate::validation::unit_price;

/// Tracking label seeded on every new order
pub const TRACKING_ORDER_PLACED: &str = "Order Placed";

/// Tracking label appended when an order is cancelled
pub const TRACKING_ORDER_CANCELLED: &str = "Order Cancelled";

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed, awaiting processing
    Pending,
    /// Being prepared
    Processing,
    /// Handed to the courier
    Shipped,
    /// Received by the pharmacy
    Delivered,
    /// Cancelled by the customer or an admin
    Cancelled,
    /// Money returned
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        Self::Pending,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
        Self::Refunded,
    ];

    /// Position on the forward fulfilment path, `None` for side states
    const fn fulfilment_rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Processing => Some(1),
            Self::Shipped => Some(2),
            Self::Delivered => Some(3),
            Self::Cancelled | Self::Refunded => None,
        }
    }

    /// Cancelled and refunded orders never change again
    pub const fn is_absorbing(self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }

    /// Whether an admin may move an order from `self` to `next`.
    ///
    /// Fulfilment only moves forward (skipping steps is allowed). Cancellation
    /// is possible until delivery, refunds from any non-absorbing state.
    /// Re-asserting the current status is allowed so a tracking entry can be
    /// appended without changing state.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self.is_absorbing() {
            return false;
        }
        if self == next {
            return true;
        }
        match next {
            Self::Cancelled => self != Self::Delivered,
            Self::Refunded => true,
            _ => match (self.fulfilment_rank(), next.fulfilment_rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseEnumError::new("order status", s))
    }
}

/// A cart line captured on an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[validate(length(min = 1, max = 64, message = "Product id is required"))]
    pub product_id: String,
    #[validate(length(min = 1, max = 200, message = "Product name is required"))]
    pub name: String,
    #[validate(range(min = 1, max = 10000, message = "Quantity must be between 1 and 10000"))]
    pub quantity: u32,
    #[validate(custom(function = "unit_price"))]
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 500))]
    pub image: Option<String>,
}

impl OrderItem {
    /// Price times quantity, `None` on overflow
    pub fn line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Human readable one-line summary, e.g. `2 x Paracetamol, 1 x Gloves`
pub fn items_summary(items: &[OrderItem]) -> String {
    items
        .iter()
        .map(|item| format!("{} x {}", item.quantity, item.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where and to whom an order ships
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    #[validate(length(min = 2, max = 200, message = "Pharmacy name is required"))]
    pub pharmacy_name: String,
    #[validate(length(min = 7, max = 20, message = "Phone number must be 7 to 20 characters"))]
    pub phone: String,
    #[validate(email(message = "Email address is invalid"))]
    pub email: String,
    #[validate(length(min = 2, max = 200, message = "Location is required"))]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 200))]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 32))]
    pub gps_address: Option<String>,
}

/// Payment summary stored on an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPaymentDetails {
    #[serde(rename = "type")]
    pub payment_type: PaymentPlan,
    pub method: PaymentMethodKind,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    #[serde(default)]
    pub transaction_id: Option<TransactionId>,
}

/// One step of an order's tracking history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEntry {
    pub status: String,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl TrackingEntry {
    pub fn new(status: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            status: status.into(),
            date,
            description: None,
            location: None,
        }
    }

    /// The seed entry of every new order
    pub fn placed(date: DateTime<Utc>) -> Self {
        Self::new(TRACKING_ORDER_PLACED, date)
    }

    /// Entry appended when an order is cancelled
    pub fn cancelled(date: DateTime<Utc>, reason: &str) -> Self {
        Self {
            description: Some(reason.to_string()),
            ..Self::new(TRACKING_ORDER_CANCELLED, date)
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }
}

/// A persisted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub shipping_details: ShippingDetails,
    pub payment_details: OrderPaymentDetails,
    pub tracking: Vec<TrackingEntry>,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate figures for the admin dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total_orders: u64,
    pub pending: u64,
    pub processing: u64,
    pub shipped: u64,
    pub delivered: u64,
    pub cancelled: u64,
    pub refunded: u64,
    /// Sum of totals over orders that were not cancelled or refunded
    pub total_revenue: Decimal,
    pub average_order_value: Decimal,
}
