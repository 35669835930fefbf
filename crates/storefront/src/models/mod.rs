//! Domain models for the storefront.
//!
//! Row types derive `sqlx::FromRow` and are shared between repositories,
//! services and templates.

pub mod cart;
pub mod catalog;
pub mod community;
pub mod content;
pub mod garage;
pub mod order;
pub mod session;
pub mod user;

pub use session::{CurrentUser, keys as session_keys};
