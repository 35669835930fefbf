//! Database operations for the storefront `PostgreSQL` database.
//!
//! ## Tables (schema `shop`)
//!
//! - `user`, `address` - Accounts (phone-number identity) and shipping addresses
//! - `brand`, `category`, `product`, `car`, `product_car` - Catalog and fitment
//! - `car_maintenance_task`, `user_car`, `maintenance_log` - Car notebook
//! - `cart`, `cart_item` - User and guest carts
//! - `order`, `order_item` - Orders with price snapshots
//! - `product_question`, `car_question`, `product_review` - Community content
//! - `otp_request`, `rate_limit_hit` - Authentication and abuse protection
//! - `engagement_event` - Storefront analytics
//! - `marketing_banner`, `gallery_image`, `blog_post` - Editorial content
//!
//! Sessions live in `tower_sessions.session`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p roghan-cli -- migrate
//! ```

pub mod addresses;
pub mod brands;
pub mod cars;
pub mod carts;
pub mod categories;
pub mod content;
pub mod engagement;
pub mod garage;
pub mod orders;
pub mod otp;
pub mod overview;
pub mod products;
pub mod questions;
pub mod rate_limits;
pub mod reviews;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use brands::BrandRepository;
pub use cars::CarRepository;
pub use carts::CartRepository;
pub use categories::CategoryRepository;
pub use content::ContentRepository;
pub use engagement::EngagementRepository;
pub use garage::GarageRepository;
pub use orders::OrderRepository;
pub use otp::OtpRepository;
pub use overview::OverviewRepository;
pub use products::ProductRepository;
pub use questions::QuestionRepository;
pub use rate_limits::RateLimitRepository;
pub use reviews::ReviewRepository;
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

    /// Constraint violation (e.g., duplicate slug).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map unique-constraint violations to `Conflict`, everything else to `Database`.
pub(crate) fn conflict_on_unique(what: &str) -> impl FnOnce(sqlx::Error) -> RepositoryError + '_ {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(format!("{what} already exists"));
        }
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_foreign_key_violation()
        {
            return RepositoryError::Conflict(format!("{what} is still referenced"));
        }
        RepositoryError::Database(e)
    }
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
