//! Field-level form validation.
//!
//! Handlers parse form strings into typed values and collect failures in a
//! [`FieldErrors`] map keyed by field name. Templates render the message next
//! to the offending input.

use std::collections::BTreeMap;

use roghan_core::{PhoneError, PhoneNumber, PriceError, Slug, SlugError, Toman};

/// Validation messages keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    /// An empty error set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for a field. The first message for a field wins.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    /// Message for a field, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Whether a field has an error.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// The first message in field order, for forms reported through a flash.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.0.values().next().map(String::as_str)
    }

    /// Whether no field has an error.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return `value` if no errors were recorded, otherwise the errors.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one field failed validation.
    pub fn finish<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }

    /// Trimmed, non-empty text or a "required" error.
    pub fn required(&mut self, field: &'static str, value: &str) -> String {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.add(field, "این فیلد الزامی است.");
        }
        trimmed.to_owned()
    }

    /// Text limited to `max` characters.
    pub fn max_chars(&mut self, field: &'static str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(field, format!("حداکثر {max} کاراکتر مجاز است."));
        }
    }

    /// Parse a mobile number.
    pub fn phone(&mut self, field: &'static str, value: &str) -> Option<PhoneNumber> {
        PhoneNumber::parse(value)
            .map_err(|e| self.add(field, phone_message(&e)))
            .ok()
    }

    /// Parse a toman amount.
    pub fn price(&mut self, field: &'static str, value: &str) -> Option<Toman> {
        Toman::parse(value)
            .map_err(|e| self.add(field, price_message(&e)))
            .ok()
    }

    /// Parse an optional toman amount (empty input is `None`).
    pub fn optional_price(&mut self, field: &'static str, value: &str) -> Option<Toman> {
        if value.trim().is_empty() {
            None
        } else {
            self.price(field, value)
        }
    }

    /// Parse a slug, deriving one from `fallback_name` when the input is empty.
    pub fn slug(&mut self, field: &'static str, value: &str, fallback_name: &str) -> Option<Slug> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Some(Slug::slugify(fallback_name));
        }
        Slug::parse(trimmed)
            .map_err(|e| self.add(field, slug_message(&e)))
            .ok()
    }

    /// Parse a whole number within a range.
    pub fn int_in_range(
        &mut self,
        field: &'static str,
        value: &str,
        range: std::ops::RangeInclusive<i32>,
    ) -> Option<i32> {
        match normalize_digits(value.trim()).parse::<i32>() {
            Ok(n) if range.contains(&n) => Some(n),
            Ok(_) => {
                self.add(
                    field,
                    format!("عدد باید بین {} و {} باشد.", range.start(), range.end()),
                );
                None
            }
            Err(_) => {
                self.add(field, "یک عدد صحیح وارد کنید.");
                None
            }
        }
    }

    /// Parse an optional whole number (empty input is `None`).
    pub fn optional_int(
        &mut self,
        field: &'static str,
        value: &str,
        range: std::ops::RangeInclusive<i32>,
    ) -> Option<i32> {
        if value.trim().is_empty() {
            None
        } else {
            self.int_in_range(field, value, range)
        }
    }

    /// Ten-digit Iranian postal code.
    pub fn postal_code(&mut self, field: &'static str, value: &str) -> String {
        let digits = normalize_digits(value.trim()).replace(['-', ' '], "");
        if digits.len() != 10 || !digits.chars().all(|c| c.is_ascii_digit()) {
            self.add(field, "کد پستی باید ۱۰ رقم باشد.");
        }
        digits
    }
}

/// Map Persian and Arabic-Indic digits to ASCII, leaving other characters alone.
#[must_use]
pub fn normalize_digits(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '\u{06F0}'..='\u{06F9}' => {
                char::from_digit(u32::from(c) - 0x06F0, 10).unwrap_or(c)
            }
            '\u{0660}'..='\u{0669}' => {
                char::from_digit(u32::from(c) - 0x0660, 10).unwrap_or(c)
            }
            _ => c,
        })
        .collect()
}

/// Persian message for a phone parse failure.
#[must_use]
pub const fn phone_message(error: &PhoneError) -> &'static str {
    match error {
        PhoneError::Empty => "شماره موبایل را وارد کنید.",
        PhoneError::InvalidCharacter(_) => "شماره موبایل فقط باید شامل ارقام باشد.",
        PhoneError::NotMobile => "شماره موبایل معتبر نیست (مثال: 09121234567).",
    }
}

/// Persian message for a price parse failure.
#[must_use]
pub const fn price_message(error: &PriceError) -> &'static str {
    match error {
        PriceError::Empty => "مبلغ را وارد کنید.",
        PriceError::NotANumber => "مبلغ باید یک عدد صحیح به تومان باشد.",
        PriceError::Negative => "مبلغ نمی‌تواند منفی باشد.",
    }
}

/// Persian message for a slug parse failure.
#[must_use]
pub const fn slug_message(error: &SlugError) -> &'static str {
    match error {
        SlugError::Empty => "نامک را وارد کنید.",
        SlugError::TooLong { .. } => "نامک بیش از حد طولانی است.",
        SlugError::InvalidCharacter(_) => "نامک فقط می‌تواند شامل حروف کوچک، ارقام و خط تیره باشد.",
        SlugError::MisplacedDash => "نامک نباید با خط تیره شروع یا تمام شود.",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims_and_reports() {
        let mut errors = FieldErrors::new();
        assert_eq!(errors.required("name", "  علی  "), "علی");
        assert!(errors.is_empty());

        errors.required("city", "   ");
        assert_eq!(errors.get("city"), Some("این فیلد الزامی است."));
    }

    #[test]
    fn test_first_message_wins() {
        let mut errors = FieldErrors::new();
        errors.add("phone", "first");
        errors.add("phone", "second");
        assert_eq!(errors.get("phone"), Some("first"));
    }

    #[test]
    fn test_phone_and_price_parsing() {
        let mut errors = FieldErrors::new();
        assert!(errors.phone("phone", "۰۹۱۲ ۱۲۳ ۴۵۶۷").is_some());
        assert_eq!(errors.price("price", "۱۲۰٬۰۰۰"), Some(Toman::new(120_000)));
        assert!(errors.is_empty());

        assert!(errors.phone("phone", "02112345678").is_none());
        assert!(errors.price("price", "abc").is_none());
        assert!(errors.has("phone"));
        assert!(errors.has("price"));
    }

    #[test]
    fn test_slug_falls_back_to_name() {
        let mut errors = FieldErrors::new();
        let slug = errors.slug("slug", "", "Shell Helix HX7").unwrap();
        assert_eq!(slug.as_str(), "shell-helix-hx7");
        assert!(errors.slug("slug", "Bad Slug", "x").is_none());
        assert!(errors.has("slug"));
    }

    #[test]
    fn test_int_in_range() {
        let mut errors = FieldErrors::new();
        assert_eq!(errors.int_in_range("rating", "۴", 1..=5), Some(4));
        assert_eq!(errors.int_in_range("rating", "9", 1..=5), None);
        assert_eq!(errors.get("rating"), Some("عدد باید بین 1 و 5 باشد."));
        assert_eq!(errors.optional_int("km", "", 0..=100), None);
    }

    #[test]
    fn test_postal_code() {
        let mut errors = FieldErrors::new();
        assert_eq!(errors.postal_code("postal_code", "۱۲۳۴۵-۶۷۸۹۰"), "1234567890");
        assert!(errors.is_empty());
        errors.postal_code("postal_code", "12345");
        assert!(errors.has("postal_code"));
    }

    #[test]
    fn test_finish() {
        assert_eq!(FieldErrors::new().finish(5), Ok(5));
        let mut errors = FieldErrors::new();
        errors.add("x", "bad");
        assert!(errors.finish(5).is_err());
    }
}
