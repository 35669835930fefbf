//! Prices in toman.
//!
//! The shop displays and stores every amount in toman (integer, no minor
//! unit). The payment gateway works in rials; [`Toman::to_rials`] is the only
//! place the factor of ten appears.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Toman`] amount from a form.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input string is empty.
    #[error("price cannot be empty")]
    Empty,
    /// The input is not a whole number.
    #[error("price must be a whole number")]
    NotANumber,
    /// The amount is negative.
    #[error("price cannot be negative")]
    Negative,
}

/// An amount of money in toman.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Toman(i64);

impl Toman {
    /// Zero toman.
    pub const ZERO: Self = Self(0);

    /// Create an amount from a raw toman value.
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// The raw toman value.
    #[must_use]
    pub const fn amount(self) -> i64 {
        self.0
    }

    /// The amount in rials, as expected by the payment gateway.
    #[must_use]
    pub const fn to_rials(self) -> i64 {
        self.0.saturating_mul(10)
    }

    /// Parse an amount typed into an admin form.
    ///
    /// Accepts Persian digits and thousands separators (`,`, `٬`, spaces).
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, not a whole number, or negative.
    pub fn parse(s: &str) -> Result<Self, PriceError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PriceError::Empty);
        }
        if trimmed.starts_with('-') {
            return Err(PriceError::Negative);
        }

        let mut digits = String::with_capacity(trimmed.len());
        for c in trimmed.chars() {
            match c {
                ',' | '\u{066C}' | ' ' | '_' => {}
                '0'..='9' => digits.push(c),
                '\u{06F0}'..='\u{06F9}' => {
                    digits.push(
                        char::from_digit(u32::from(c) - 0x06F0, 10)
                            .ok_or(PriceError::NotANumber)?,
                    );
                }
                _ => return Err(PriceError::NotANumber),
            }
        }

        digits
            .parse::<i64>()
            .map(Self)
            .map_err(|_| PriceError::NotANumber)
    }

    /// Format with thousands separators but without the currency label.
    #[must_use]
    pub fn grouped(self) -> String {
        let raw = self.0.unsigned_abs().to_string();
        let mut out = String::with_capacity(raw.len() + raw.len() / 3 + 1);
        if self.0 < 0 {
            out.push('-');
        }
        for (i, c) in raw.chars().enumerate() {
            if i > 0 && (raw.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(c);
        }
        out
    }

    /// Percentage saved relative to a higher "compare at" price.
    ///
    /// Returns `None` when `compare_at` is not higher than `self`.
    #[must_use]
    pub fn discount_percent_from(self, compare_at: Self) -> Option<u8> {
        if compare_at.0 <= self.0 || compare_at.0 <= 0 {
            return None;
        }
        let saved = (compare_at.0 - self.0) * 100 / compare_at.0;
        u8::try_from(saved).ok()
    }
}

impl fmt::Display for Toman {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} تومان", self.grouped())
    }
}

impl Add for Toman {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Mul<i32> for Toman {
    type Output = Self;

    fn mul(self, quantity: i32) -> Self::Output {
        Self(self.0.saturating_mul(i64::from(quantity)))
    }
}

impl Sum for Toman {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<i64> for Toman {
    fn from(amount: i64) -> Self {
        Self(amount)
    }
}

impl From<Toman> for i64 {
    fn from(price: Toman) -> Self {
        price.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Toman {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Toman {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(Self(<i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Toman {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Toman::new(1_250_000).to_string(), "1,250,000 تومان");
        assert_eq!(Toman::new(999).to_string(), "999 تومان");
        assert_eq!(Toman::new(1000).grouped(), "1,000");
        assert_eq!(Toman::ZERO.grouped(), "0");
        assert_eq!(Toman::new(-45_000).grouped(), "-45,000");
    }

    #[test]
    fn test_to_rials() {
        assert_eq!(Toman::new(185_000).to_rials(), 1_850_000);
    }

    #[test]
    fn test_parse_with_separators_and_persian_digits() {
        assert_eq!(Toman::parse("1,250,000").unwrap(), Toman::new(1_250_000));
        assert_eq!(Toman::parse("۱۲۵۰۰۰۰").unwrap(), Toman::new(1_250_000));
        assert_eq!(Toman::parse("۱٬۲۵۰٬۰۰۰").unwrap(), Toman::new(1_250_000));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Toman::parse(""), Err(PriceError::Empty));
        assert_eq!(Toman::parse("-5"), Err(PriceError::Negative));
        assert_eq!(Toman::parse("12.5"), Err(PriceError::NotANumber));
        assert_eq!(Toman::parse("abc"), Err(PriceError::NotANumber));
    }

    #[test]
    fn test_line_total_and_sum() {
        let lines = [Toman::new(100_000) * 3, Toman::new(45_000) * 2];
        let total: Toman = lines.into_iter().sum();
        assert_eq!(total, Toman::new(390_000));
    }

    #[test]
    fn test_discount_percent() {
        assert_eq!(
            Toman::new(750_000).discount_percent_from(Toman::new(1_000_000)),
            Some(25)
        );
        assert_eq!(Toman::new(100).discount_percent_from(Toman::new(100)), None);
        assert_eq!(Toman::new(200).discount_percent_from(Toman::new(100)), None);
    }
}
