//! Payment types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::ParseEnumError;
use crate::ids::{OrderId, OrderNumber, PaymentId, TransactionId};
use crate::money::InstallmentPercentage;
use crate::order::{OrderItem, OrderStatus, ShippingDetails};
use crate::user::UserId;

/// Payment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    /// Recorded as charged. No gateway settles payments, so this means the
    /// charge was captured by us, not that funds arrived.
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 6] = [
        Self::Pending,
        Self::Processing,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
        Self::Refunded,
    ];

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled | Self::Refunded)
    }

    /// Whether an admin may move a payment from `self` to `next`
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Processing | Completed | Failed | Cancelled)
                | (Processing, Completed | Failed | Cancelled)
                | (Completed, Refunded)
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseEnumError::new("payment status", s))
    }
}

/// How the order is paid for over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentPlan {
    FullPayment,
    InstallmentPayment,
    Credit,
}

impl PaymentPlan {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FullPayment => "full-payment",
            Self::InstallmentPayment => "installment-payment",
            Self::Credit => "credit",
        }
    }
}

impl std::fmt::Display for PaymentPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentPlan {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::FullPayment, Self::InstallmentPayment, Self::Credit]
            .into_iter()
            .find(|plan| plan.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("payment type", s))
    }
}

/// Discriminant of a payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    Card,
    MobileMoney,
    CashOnDelivery,
    Credit,
}

impl PaymentMethodKind {
    /// Charged at checkout rather than later
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Card | Self::MobileMoney)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::MobileMoney => "mobile_money",
            Self::CashOnDelivery => "cash_on_delivery",
            Self::Credit => "credit",
        }
    }
}

impl std::fmt::Display for PaymentMethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored payment method. Card details are reduced to the last four digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PaymentMethod {
    Card {
        last4: String,
        card_name: String,
        expiry_date: String,
    },
    MobileMoney {
        phone_number: String,
        network: String,
    },
    CashOnDelivery,
    Credit,
}

impl PaymentMethod {
    pub fn kind(&self) -> PaymentMethodKind {
        match self {
            Self::Card { .. } => PaymentMethodKind::Card,
            Self::MobileMoney { .. } => PaymentMethodKind::MobileMoney,
            Self::CashOnDelivery => PaymentMethodKind::CashOnDelivery,
            Self::Credit => PaymentMethodKind::Credit,
        }
    }
}

/// Payment method as submitted by the client
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PaymentMethodInput {
    Card {
        card_number: String,
        card_name: String,
        expiry_date: String,
        cvv: String,
    },
    MobileMoney {
        phone_number: String,
        network: String,
    },
    CashOnDelivery,
    Credit,
}

impl PaymentMethodInput {
    pub fn kind(&self) -> PaymentMethodKind {
        match self {
            Self::Card { .. } => PaymentMethodKind::Card,
            Self::MobileMoney { .. } => PaymentMethodKind::MobileMoney,
            Self::CashOnDelivery => PaymentMethodKind::CashOnDelivery,
            Self::Credit => PaymentMethodKind::Credit,
        }
    }

    /// Drop everything that must not be stored
    pub fn sanitize(&self) -> PaymentMethod {
        match self {
            Self::Card {
                card_number,
                card_name,
                expiry_date,
                ..
            } => {
                let digits: String = card_number.chars().filter(char::is_ascii_digit).collect();
                let last4 = digits[digits.len().saturating_sub(4)..].to_string();
                PaymentMethod::Card {
                    last4,
                    card_name: card_name.trim().to_string(),
                    expiry_date: expiry_date.clone(),
                }
            }
            Self::MobileMoney {
                phone_number,
                network,
            } => PaymentMethod::MobileMoney {
                phone_number: phone_number.clone(),
                network: network.clone(),
            },
            Self::CashOnDelivery => PaymentMethod::CashOnDelivery,
            Self::Credit => PaymentMethod::Credit,
        }
    }
}

// Card numbers and CVVs never reach logs
impl std::fmt::Debug for PaymentMethodInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Card { card_name, .. } => f
                .debug_struct("Card")
                .field("card_name", card_name)
                .field("card_number", &"[REDACTED]")
                .finish_non_exhaustive(),
            Self::MobileMoney { network, .. } => f
                .debug_struct("MobileMoney")
                .field("network", network)
                .finish_non_exhaustive(),
            Self::CashOnDelivery => f.write_str("CashOnDelivery"),
            Self::Credit => f.write_str("Credit"),
        }
    }
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

fn is_valid_expiry(expiry: &str) -> bool {
    let Some((month, year)) = expiry.split_once('/') else {
        return false;
    };
    let month_ok = month.len() == 2 && matches!(month.parse::<u8>(), Ok(1..=12));
    let year_ok = year.len() == 2 && year.bytes().all(|b| b.is_ascii_digit());
    month_ok && year_ok
}

impl Validate for PaymentMethodInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        match self {
            Self::Card {
                card_number,
                card_name,
                expiry_date,
                cvv,
            } => {
                let digits: Vec<char> = card_number.chars().filter(|c| *c != ' ').collect();
                if !(13..=19).contains(&digits.len()) || !digits.iter().all(char::is_ascii_digit) {
                    errors.add(
                        "cardNumber",
                        field_error("card_number", "Card number must be 13 to 19 digits"),
                    );
                }
                if card_name.trim().len() < 2 {
                    errors.add(
                        "cardName",
                        field_error("card_name", "Name on card is required"),
                    );
                }
                if !is_valid_expiry(expiry_date) {
                    errors.add(
                        "expiryDate",
                        field_error("expiry_date", "Expiry date must be MM/YY"),
                    );
                }
                if !(3..=4).contains(&cvv.len()) || !cvv.bytes().all(|b| b.is_ascii_digit()) {
                    errors.add("cvv", field_error("cvv", "CVV must be 3 or 4 digits"));
                }
            }
            Self::MobileMoney {
                phone_number,
                network,
            } => {
                let digits = phone_number.trim_start_matches('+');
                if !(9..=15).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit())
                {
                    errors.add(
                        "phoneNumber",
                        field_error("phone_number", "Phone number must be 9 to 15 digits"),
                    );
                }
                if network.trim().is_empty() || network.len() > 32 {
                    errors.add(
                        "network",
                        field_error("network", "Mobile money network is required"),
                    );
                }
            }
            Self::CashOnDelivery | Self::Credit => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Plan-specific bookkeeping recorded on a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum PlanDetails {
    FullPayment,
    InstallmentPayment {
        percentage: InstallmentPercentage,
        amount_paid: Decimal,
        remaining_balance: Decimal,
    },
    Credit {
        amount_due: Decimal,
    },
}

impl PlanDetails {
    pub fn plan(&self) -> PaymentPlan {
        match self {
            Self::FullPayment => PaymentPlan::FullPayment,
            Self::InstallmentPayment { .. } => PaymentPlan::InstallmentPayment,
            Self::Credit { .. } => PaymentPlan::Credit,
        }
    }
}

/// Back-reference from a payment to the order it paid for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLink {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub status: OrderStatus,
    pub linked_at: DateTime<Utc>,
}

/// Order linkage and snapshots stored with a payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMetadata {
    /// Client-side order reference, replaced by the order number once linked
    #[validate(length(min = 1, max = 64, message = "Order reference is required"))]
    pub order_id: String,
    pub plan: PlanDetails,
    #[validate(nested)]
    pub shipping_details: ShippingDetails,
    #[validate(length(min = 1, message = "At least one item is required"), nested)]
    pub items: Vec<OrderItem>,
    #[validate(length(max = 2000))]
    pub items_summary: String,
    #[serde(default)]
    pub order_details: Option<OrderLink>,
    #[serde(default)]
    pub needs_review: bool,
}

/// A persisted payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub transaction_id: TransactionId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub currency: String,
    pub payment_type: PaymentPlan,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub description: String,
    pub metadata: PaymentMetadata,
    pub gateway_response: Option<serde_json::Value>,
    pub refund_amount: Option<Decimal>,
    pub refund_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Whether an order has been linked to this payment
    pub fn is_linked(&self) -> bool {
        self.metadata.order_details.is_some()
    }
}
