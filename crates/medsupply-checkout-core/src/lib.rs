//! MedSupply Checkout Core - Order, payment and checkout logic
//!
//! Services sit on top of the `medsupply-db` repositories and own every
//! business rule: pricing checks, status transitions, ownership, identifier
//! retries and payment/order linking. The [`orchestrator`] module holds the
//! client-side two-step checkout flow.

pub mod checkout;
pub mod config;
pub mod error;
pub mod ids;
pub mod orchestrator;
pub mod orders;
pub mod payments;

use std::sync::Arc;

use medsupply_db::Repositories;

pub use checkout::CheckoutService;
pub use config::CheckoutConfig;
pub use error::{BackendError, CheckoutError};
pub use ids::{IdSource, RandomIds};
pub use orchestrator::{
    CheckoutBackend, CheckoutForm, CheckoutOrchestrator, Confirmation, SubmitOutcome,
};
pub use orders::{OrderService, ADMIN_CANCEL_REASON};
pub use payments::{PaymentService, Recorded};

/// The services a commerce API needs, sharing one id source and config
#[derive(Debug, Clone)]
pub struct CommerceServices {
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub checkout: Arc<CheckoutService>,
}

impl CommerceServices {
    pub fn new(repos: &Repositories, config: CheckoutConfig) -> Self {
        Self::with_ids(repos, Arc::new(RandomIds), config)
    }

    pub fn with_ids(repos: &Repositories, ids: Arc<dyn IdSource>, config: CheckoutConfig) -> Self {
        let payments = Arc::new(PaymentService::new(repos, ids.clone(), config.clone()));
        Self {
            orders: Arc::new(OrderService::new(repos, ids.clone(), config.clone())),
            checkout: Arc::new(CheckoutService::new(
                repos,
                payments.clone(),
                ids,
                config,
            )),
            payments,
        }
    }
}
