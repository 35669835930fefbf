//! Core types for Roghan.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod jalali;
pub mod phone;
pub mod price;
pub mod slug;
pub mod status;

pub use id::*;
pub use jalali::JalaliDate;
pub use phone::{PhoneError, PhoneNumber};
pub use price::{PriceError, Toman};
pub use slug::{Slug, SlugError};
pub use status::*;
