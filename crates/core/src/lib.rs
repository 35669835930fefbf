//! Roghan Core - Shared domain types.
//!
//! This crate provides the types used across all Roghan components:
//! - `storefront` - Public shop and `/admin` back-office
//! - `cli` - Migrations, catalog seeding and role management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. The optional `postgres` feature adds sqlx
//! encode/decode implementations so the types can be bound and fetched directly.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, phone numbers, toman prices, slugs, Jalali dates and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
