//! PostgreSQL repository implementations

mod checkout;
mod order;
mod payment;
mod user;

use std::sync::Arc;

pub use checkout::PgCheckoutRepository;
pub use order::PgOrderRepository;
pub use payment::PgPaymentRepository;
pub use user::PgUserRepository;

use crate::repo::Repositories;
use crate::DbPool;

impl Repositories {
    /// Create all repositories from a database pool
    pub fn postgres(pool: DbPool) -> Self {
        let checkouts = Arc::new(PgCheckoutRepository::new(pool.clone()));
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            orders: Arc::new(PgOrderRepository::new(pool.clone())),
            payments: Arc::new(PgPaymentRepository::new(pool)),
            health: checkouts.clone(),
            checkouts,
        }
    }
}
