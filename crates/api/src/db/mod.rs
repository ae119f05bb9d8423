//! Database access for the marketplace `PostgreSQL` schema.
//!
//! # Schema: `marketplace`
//!
//! - `user`, `user_password` - Accounts
//! - `category`, `product`, `product_image`, `product_update` - Catalog
//! - `sponsorship_unit`, `unit_image`, `unit_update` - Individually sponsorable units
//! - `cart`, `cart_item` - Shopping carts
//! - `order`, `order_item` - Order snapshots
//! - `payment` - Stripe payments
//! - `adopted_tree`, `timeline_event`, `tree_gallery_image` - Adoptions
//! - `user_profile`, `badge`, `user_badge` - Gamification
//!
//! Sessions live in `tower_sessions.session`.
//!
//! Reads that only need a pool go through the `*Repository` structs.
//! Writes that must share a transaction are free functions taking
//! `&mut PgConnection`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p nature-marketplace-cli -- migrate
//! ```

pub mod carts;
pub mod catalog;
pub mod orders;
pub mod payments;
pub mod profiles;
pub mod trees;
pub mod units;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::CartRepository;
pub use catalog::{CategoryRepository, ProductRepository};
pub use orders::OrderRepository;
pub use payments::PaymentRepository;
pub use profiles::ProfileRepository;
pub use trees::TreeRepository;
pub use units::UnitRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique slug).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_unique(err: sqlx::Error, message: &str) -> Self {
        if is_unique_violation(&err) {
            Self::Conflict(message.to_string())
        } else {
            Self::Database(err)
        }
    }
}

/// Whether a sqlx error is a `PostgreSQL` unique violation (SQLSTATE 23505).
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
