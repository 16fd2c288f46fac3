//! Checkout plan selection and payment quoting
//!
//! A checkout picks a plan (full, installment or credit) and, for the first
//! two, a channel (charge online now or pay on delivery). The quote decides
//! what a Payment records for that choice.

use rust_decimal::Decimal;

use crate::money::{InstallmentPercentage, Totals};
use crate::payment::{PaymentMethodInput, PaymentPlan, PaymentStatus, PlanDetails};

/// How a non-credit plan is settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    /// Card or mobile money, charged at checkout
    Online(PaymentMethodInput),
    /// Cash collected by the courier
    PayOnDelivery,
}

impl Channel {
    fn method(&self) -> PaymentMethodInput {
        match self {
            Self::Online(method) => method.clone(),
            Self::PayOnDelivery => PaymentMethodInput::CashOnDelivery,
        }
    }
}

/// A fully resolved payment choice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanSelection {
    FullPayment(Channel),
    Installment {
        percentage: InstallmentPercentage,
        channel: Channel,
    },
    Credit,
}

impl PlanSelection {
    pub fn plan(&self) -> PaymentPlan {
        match self {
            Self::FullPayment(_) => PaymentPlan::FullPayment,
            Self::Installment { .. } => PaymentPlan::InstallmentPayment,
            Self::Credit => PaymentPlan::Credit,
        }
    }

    /// Work out what the payment records for an order with these totals
    pub fn quote(&self, totals: &Totals) -> PaymentQuote {
        let total = totals.total;
        let (method, amount, plan) = match self {
            Self::FullPayment(channel) => (channel.method(), total, PlanDetails::FullPayment),
            Self::Installment {
                percentage,
                channel,
            } => {
                let (paid, remaining) = percentage.split(total);
                (
                    channel.method(),
                    paid,
                    PlanDetails::InstallmentPayment {
                        percentage: *percentage,
                        amount_paid: paid,
                        remaining_balance: remaining,
                    },
                )
            }
            Self::Credit => (
                PaymentMethodInput::Credit,
                total,
                PlanDetails::Credit { amount_due: total },
            ),
        };

        let status = if method.kind().is_online() {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Pending
        };

        PaymentQuote {
            method,
            amount,
            status,
            plan,
        }
    }
}

/// What a payment records for a checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentQuote {
    pub method: PaymentMethodInput,
    /// Charged now for online methods, owed later otherwise
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub plan: PlanDetails,
}

impl PaymentQuote {
    /// Human readable payment description
    pub fn description(&self, items_summary: &str) -> String {
        let label = match &self.plan {
            PlanDetails::FullPayment => "Full payment".to_string(),
            PlanDetails::InstallmentPayment { percentage, .. } => {
                format!("Installment payment ({percentage})")
            }
            PlanDetails::Credit { .. } => "Credit purchase".to_string(),
        };
        format!("{label} for {items_summary}")
    }
}
