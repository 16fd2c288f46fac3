//! Request bodies accepted by the commerce API
//!
//! Every request exposes `check()`, which runs the derived field rules and
//! the cross-field rules and returns flattened field errors.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::{FieldError, Pagination};
use crate::checkout::{Channel, PlanSelection};
use crate::money::{InstallmentPercentage, Totals, DEFAULT_CURRENCY};
use crate::order::{OrderItem, OrderStatus, ShippingDetails};
use crate::payment::{PaymentMethodInput, PaymentMethodKind, PaymentPlan, PaymentStatus};
use crate::validation::{field_error, flatten, non_negative, positive};

/// Reason stored when a customer cancels without giving one
pub const DEFAULT_CANCEL_REASON: &str = "Cancelled by customer";

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn run<T: Validate>(value: &T) -> Vec<FieldError> {
    match value.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => flatten(&errors),
    }
}

fn prefixed(prefix: &str, errors: Vec<FieldError>) -> impl Iterator<Item = FieldError> + '_ {
    errors.into_iter().map(move |mut e| {
        e.field = format!("{prefix}.{}", e.field);
        e
    })
}

fn into_result(mut errors: Vec<FieldError>) -> Result<(), Vec<FieldError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        Err(errors)
    }
}

/// Order snapshot carried in a payment request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMetadataInput {
    /// Client-side order reference
    #[validate(length(min = 1, max = 64, message = "Order reference is required"))]
    pub order_id: String,
    #[validate(nested)]
    pub shipping_details: ShippingDetails,
    #[validate(length(min = 1, message = "At least one item is required"), nested)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub items_summary: Option<String>,
    /// Required for installment payments
    #[serde(default)]
    pub installment_percentage: Option<u8>,
}

/// `POST /api/payments`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    #[validate(custom(function = "positive"))]
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: String,
    pub payment_type: PaymentPlan,
    pub payment_method: PaymentMethodInput,
    #[validate(length(min = 1, max = 500, message = "Description is required"))]
    pub description: String,
    #[validate(nested)]
    pub metadata: PaymentMetadataInput,
    #[serde(default)]
    #[validate(length(min = 8, max = 128))]
    pub idempotency_key: Option<String>,
}

impl CreatePaymentRequest {
    pub fn check(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = run(self);
        errors.extend(prefixed("paymentMethod", run(&self.payment_method)));

        if let Err(e) = self.selection() {
            errors.extend(e);
        }
        into_result(errors)
    }

    /// The plan this payment claims to settle
    pub fn selection(&self) -> Result<PlanSelection, Vec<FieldError>> {
        let method = self.payment_method.clone();
        let channel = || match method.kind() {
            PaymentMethodKind::Card | PaymentMethodKind::MobileMoney => {
                Ok(Channel::Online(method.clone()))
            }
            PaymentMethodKind::CashOnDelivery => Ok(Channel::PayOnDelivery),
            PaymentMethodKind::Credit => Err(vec![field_error(
                "paymentMethod.type",
                "Credit method is only valid with the credit payment type",
            )]),
        };

        match self.payment_type {
            PaymentPlan::FullPayment => Ok(PlanSelection::FullPayment(channel()?)),
            PaymentPlan::InstallmentPayment => {
                let percentage = installment(self.metadata.installment_percentage)
                    .map_err(|e| vec![e.with_prefix("metadata")])?;
                Ok(PlanSelection::Installment {
                    percentage,
                    channel: channel()?,
                })
            }
            PaymentPlan::Credit => {
                if method.kind() != PaymentMethodKind::Credit {
                    return Err(vec![field_error(
                        "paymentMethod.type",
                        "Credit payments must use the credit method",
                    )]);
                }
                Ok(PlanSelection::Credit)
            }
        }
    }
}

fn installment(value: Option<u8>) -> Result<InstallmentPercentage, FieldError> {
    let value = value.ok_or_else(|| {
        field_error(
            "installmentPercentage",
            "Installment percentage is required for installment payments",
        )
    })?;
    InstallmentPercentage::try_from(value)
        .map_err(|e| field_error("installmentPercentage", e.to_string()))
}

impl FieldError {
    fn with_prefix(mut self, prefix: &str) -> Self {
        self.field = format!("{prefix}.{}", self.field);
        self
    }
}

/// Payment summary submitted with an order
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderPaymentInput {
    #[serde(rename = "type")]
    pub payment_type: PaymentPlan,
    pub method: PaymentMethodKind,
    #[validate(custom(function = "non_negative"))]
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: String,
    #[serde(default)]
    pub status: Option<PaymentStatus>,
    #[serde(default)]
    #[validate(length(min = 1, max = 64))]
    pub transaction_id: Option<String>,
}

/// `POST /api/orders`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "At least one item is required"), nested)]
    pub items: Vec<OrderItem>,
    #[validate(custom(function = "non_negative"))]
    pub subtotal: Decimal,
    #[validate(custom(function = "non_negative"))]
    pub delivery_fee: Decimal,
    #[validate(custom(function = "non_negative"))]
    pub tax: Decimal,
    #[validate(custom(function = "non_negative"))]
    pub total: Decimal,
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: String,
    #[validate(nested)]
    pub shipping_details: ShippingDetails,
    #[validate(nested)]
    pub payment_details: OrderPaymentInput,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl CreateOrderRequest {
    pub fn check(&self) -> Result<(), Vec<FieldError>> {
        into_result(run(self))
    }

    /// Totals as submitted by the client
    pub fn claimed_totals(&self) -> Totals {
        Totals {
            subtotal: self.subtotal,
            delivery_fee: self.delivery_fee,
            tax: self.tax,
            total: self.total,
        }
    }
}

/// Tracking entry supplied with an admin status change
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TrackingUpdate {
    /// Label for the entry; the new order status is used when absent
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    pub status: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub location: Option<String>,
}

/// `PATCH /api/orders/:id/status`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    #[validate(nested)]
    pub tracking_update: Option<TrackingUpdate>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub cancelled_reason: Option<String>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
}

impl UpdateOrderStatusRequest {
    pub fn check(&self) -> Result<(), Vec<FieldError>> {
        into_result(run(self))
    }
}

/// `PATCH /api/orders/:id/cancel`
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest {
    #[serde(default)]
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

impl CancelOrderRequest {
    pub fn check(&self) -> Result<(), Vec<FieldError>> {
        into_result(run(self))
    }

    /// The supplied reason, or the default when blank
    pub fn reason_or_default(&self) -> String {
        self.reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_CANCEL_REASON)
            .to_string()
    }
}

/// `PATCH /api/payments/:id/status`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentStatusRequest {
    pub status: PaymentStatus,
    #[serde(default)]
    #[validate(custom(function = "positive"))]
    pub refund_amount: Option<Decimal>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub refund_reason: Option<String>,
    /// Stored as the payment's gateway response
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl UpdatePaymentStatusRequest {
    pub fn check(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = run(self);
        if self.refund_amount.is_some() && self.status != PaymentStatus::Refunded {
            errors.push(field_error(
                "refundAmount",
                "Refund amount is only accepted with status refunded",
            ));
        }
        into_result(errors)
    }
}

/// Whether an online checkout pays now or on delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentChannel {
    PayOnline,
    PayOnDelivery,
}

/// Payment choice made on the checkout form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPaymentInput {
    pub payment_type: PaymentPlan,
    /// Ignored for credit
    #[serde(default)]
    pub payment_method: Option<PaymentChannel>,
    #[serde(default)]
    pub installment_percentage: Option<u8>,
    /// Card or mobile money details when paying online
    #[serde(default)]
    pub online_method: Option<PaymentMethodInput>,
}

impl CheckoutPaymentInput {
    /// Resolve the form fields into a plan selection
    pub fn resolve(&self) -> Result<PlanSelection, Vec<FieldError>> {
        let channel = || -> Result<Channel, Vec<FieldError>> {
            match self.payment_method {
                None => Err(vec![field_error(
                    "payment.paymentMethod",
                    "Choose pay-online or pay-on-delivery",
                )]),
                Some(PaymentChannel::PayOnDelivery) => Ok(Channel::PayOnDelivery),
                Some(PaymentChannel::PayOnline) => {
                    let method = self.online_method.as_ref().ok_or_else(|| {
                        vec![field_error(
                            "payment.onlineMethod",
                            "Card or mobile money details are required",
                        )]
                    })?;
                    if !method.kind().is_online() {
                        return Err(vec![field_error(
                            "payment.onlineMethod.type",
                            "Online payments must use card or mobile_money",
                        )]);
                    }
                    let errors: Vec<_> = prefixed("payment.onlineMethod", run(method)).collect();
                    if !errors.is_empty() {
                        return Err(errors);
                    }
                    Ok(Channel::Online(method.clone()))
                }
            }
        };

        match self.payment_type {
            PaymentPlan::FullPayment => Ok(PlanSelection::FullPayment(channel()?)),
            PaymentPlan::InstallmentPayment => {
                let percentage = installment(self.installment_percentage)
                    .map_err(|e| vec![e.with_prefix("payment")])?;
                Ok(PlanSelection::Installment {
                    percentage,
                    channel: channel()?,
                })
            }
            PaymentPlan::Credit => Ok(PlanSelection::Credit),
        }
    }
}

/// `POST /api/checkout`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[validate(length(min = 1, message = "At least one item is required"), nested)]
    pub items: Vec<OrderItem>,
    #[validate(nested)]
    pub shipping_details: ShippingDetails,
    pub payment: CheckoutPaymentInput,
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: String,
    /// Totals shown to the customer, compared against the recomputed ones
    #[serde(default)]
    pub totals: Option<Totals>,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(length(min = 8, max = 128))]
    pub idempotency_key: Option<String>,
}

impl CheckoutRequest {
    /// Validate and resolve the payment choice in one pass
    pub fn check(&self) -> Result<PlanSelection, Vec<FieldError>> {
        let mut errors = run(self);
        match self.payment.resolve() {
            Ok(selection) if errors.is_empty() => return Ok(selection),
            Ok(_) => {}
            Err(e) => errors.extend(e),
        }
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        Err(errors)
    }
}

/// List query: `?page=&limit=&status=`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ListQuery {
    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination::new(
            self.page.unwrap_or(defaults.page),
            self.limit.unwrap_or(defaults.limit),
        )
    }

    /// Parse the status filter; an empty value means no filter
    pub fn status_filter<S>(&self) -> Result<Option<S>, Vec<FieldError>>
    where
        S: std::str::FromStr,
        S::Err: std::fmt::Display,
    {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e: S::Err| vec![field_error("status", e.to_string())]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shipping() -> serde_json::Value {
        json!({
            "pharmacyName": "Ridge Pharmacy",
            "phone": "0241234567",
            "email": "orders@ridge.example",
            "location": "Accra"
        })
    }

    fn items() -> serde_json::Value {
        json!([{ "productId": "p-1", "name": "Paracetamol", "quantity": 2, "price": 50.0 }])
    }

    #[test]
    fn test_payment_request_valid() {
        let req: CreatePaymentRequest = serde_json::from_value(json!({
            "amount": 117.5,
            "paymentType": "full-payment",
            "paymentMethod": {
                "type": "card",
                "cardNumber": "4111111111111234",
                "cardName": "Ama Owusu",
                "expiryDate": "10/29",
                "cvv": "123"
            },
            "description": "Order payment",
            "metadata": { "orderId": "cart-1", "shippingDetails": shipping(), "items": items() }
        }))
        .unwrap();
        assert_eq!(req.currency, "GHS");
        assert!(req.check().is_ok());
    }

    #[test]
    fn test_payment_request_installment_requires_percentage() {
        let req: CreatePaymentRequest = serde_json::from_value(json!({
            "amount": 70.5,
            "paymentType": "installment-payment",
            "paymentMethod": { "type": "mobile_money", "phoneNumber": "0241234567", "network": "MTN" },
            "description": "Order payment",
            "metadata": { "orderId": "cart-1", "shippingDetails": shipping(), "items": items() }
        }))
        .unwrap();
        let errors = req.check().unwrap_err();
        assert_eq!(errors[0].field, "metadata.installmentPercentage");
    }

    #[test]
    fn test_payment_request_rejects_zero_amount_and_bad_card() {
        let req: CreatePaymentRequest = serde_json::from_value(json!({
            "amount": 0,
            "paymentType": "full-payment",
            "paymentMethod": { "type": "card", "cardNumber": "12", "cardName": "A B", "expiryDate": "01/30", "cvv": "123" },
            "description": "x",
            "metadata": { "orderId": "cart-1", "shippingDetails": shipping(), "items": items() }
        }))
        .unwrap();
        let fields: Vec<String> = req.check().unwrap_err().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"amount".to_string()));
        assert!(fields.contains(&"paymentMethod.cardNumber".to_string()));
    }

    #[test]
    fn test_order_request_negative_total() {
        let req: CreateOrderRequest = serde_json::from_value(json!({
            "items": items(),
            "subtotal": 100, "deliveryFee": 5, "tax": 12.5, "total": -1,
            "shippingDetails": shipping(),
            "paymentDetails": { "type": "full-payment", "method": "card", "amount": 117.5 }
        }))
        .unwrap();
        let errors = req.check().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "total");
    }

    #[test]
    fn test_checkout_resolve() {
        let online = CheckoutPaymentInput {
            payment_type: PaymentPlan::FullPayment,
            payment_method: Some(PaymentChannel::PayOnline),
            installment_percentage: None,
            online_method: None,
        };
        assert_eq!(online.resolve().unwrap_err()[0].field, "payment.onlineMethod");

        let credit = CheckoutPaymentInput {
            payment_type: PaymentPlan::Credit,
            payment_method: None,
            installment_percentage: None,
            online_method: None,
        };
        assert_eq!(credit.resolve().unwrap(), PlanSelection::Credit);

        let installment = CheckoutPaymentInput {
            payment_type: PaymentPlan::InstallmentPayment,
            payment_method: Some(PaymentChannel::PayOnDelivery),
            installment_percentage: Some(55),
            online_method: None,
        };
        assert_eq!(
            installment.resolve().unwrap_err()[0].field,
            "payment.installmentPercentage"
        );
    }

    #[test]
    fn test_cancel_reason_default() {
        let blank = CancelOrderRequest {
            reason: Some("   ".into()),
        };
        assert_eq!(blank.reason_or_default(), DEFAULT_CANCEL_REASON);
    }

    #[test]
    fn test_list_query_status_filter() {
        let query = ListQuery {
            status: Some("shipped".into()),
            ..Default::default()
        };
        assert_eq!(
            query.status_filter::<OrderStatus>().unwrap(),
            Some(OrderStatus::Shipped)
        );
        let bad = ListQuery {
            status: Some("lost".into()),
            ..Default::default()
        };
        assert!(bad.status_filter::<OrderStatus>().is_err());
        assert_eq!(bad.pagination(), Pagination::default());
    }
}
