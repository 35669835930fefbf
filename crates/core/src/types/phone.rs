//! Iranian mobile phone number type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input string is empty.
    #[error("phone number cannot be empty")]
    Empty,
    /// The input contains characters other than digits, spaces, dashes or a leading `+`.
    #[error("phone number contains invalid character '{0}'")]
    InvalidCharacter(char),
    /// The number does not have the shape of an Iranian mobile number.
    #[error("phone number must be an Iranian mobile number (09xxxxxxxxx)")]
    NotMobile,
}

/// An Iranian mobile number in canonical national form (`09xxxxxxxxx`).
///
/// Parsing accepts the forms people actually type into a checkout form:
/// Persian (`۰۹۱۲...`) or Arabic-Indic digits, spaces and dashes, and the
/// `+98`, `0098` and `98` country prefixes, as well as the bare `9xxxxxxxxx` form.
///
/// ## Examples
///
/// ```
/// use roghan_core::PhoneNumber;
///
/// let phone = PhoneNumber::parse("+98 912 123 4567").unwrap();
/// assert_eq!(phone.as_str(), "09121234567");
/// assert_eq!(PhoneNumber::parse("۰۹۱۲۱۲۳۴۵۶۷").unwrap(), phone);
///
/// assert!(PhoneNumber::parse("02112345678").is_err()); // landline
/// assert!(PhoneNumber::parse("0912").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Length of the canonical national form.
    pub const LENGTH: usize = 11;

    /// Parse a `PhoneNumber` from user input.
    ///
    /// # Errors
    ///
    /// Returns an error if the input:
    /// - Is empty
    /// - Contains characters other than digits, whitespace, `-` or a leading `+`
    /// - Does not normalize to `09` followed by nine digits
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PhoneError::Empty);
        }

        let mut digits = String::with_capacity(trimmed.len());
        for (i, c) in trimmed.chars().enumerate() {
            match c {
                '+' if i == 0 => {}
                ' ' | '-' | '\u{200c}' => {}
                _ => digits.push(normalize_digit(c).ok_or(PhoneError::InvalidCharacter(c))?),
            }
        }

        let national = if let Some(rest) = digits.strip_prefix("0098") {
            format!("0{rest}")
        } else if digits.len() == 12 && digits.starts_with("98") {
            format!("0{}", &digits[2..])
        } else if digits.len() == 10 && digits.starts_with('9') {
            format!("0{digits}")
        } else {
            digits
        };

        if national.len() != Self::LENGTH || !national.starts_with("09") {
            return Err(PhoneError::NotMobile);
        }

        Ok(Self(national))
    }

    /// Returns the number in national form (`09121234567`).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `PhoneNumber` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns the number in international form (`+989121234567`).
    #[must_use]
    pub fn international(&self) -> String {
        format!("+98{}", &self.0[1..])
    }

    /// Returns the number with the middle digits hidden (`0912***4567`).
    ///
    /// Used in logs and on the "code sent to ..." page.
    #[must_use]
    pub fn masked(&self) -> String {
        format!("{}***{}", &self.0[..4], &self.0[7..])
    }
}

/// Map ASCII, Persian and Arabic-Indic digits to ASCII.
fn normalize_digit(c: char) -> Option<char> {
    match c {
        '0'..='9' => Some(c),
        '\u{06F0}'..='\u{06F9}' => char::from_digit(u32::from(c) - 0x06F0, 10),
        '\u{0660}'..='\u{0669}' => char::from_digit(u32::from(c) - 0x0660, 10),
        _ => None,
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for PhoneNumber {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PhoneNumber {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Only canonical numbers are ever written
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for PhoneNumber {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_national_form() {
        assert_eq!(
            PhoneNumber::parse("09121234567").unwrap().as_str(),
            "09121234567"
        );
    }

    #[test]
    fn test_parse_country_prefixes() {
        for input in ["+989121234567", "00989121234567", "989121234567", "9121234567"] {
            assert_eq!(
                PhoneNumber::parse(input).unwrap().as_str(),
                "09121234567",
                "input: {input}"
            );
        }
    }

    #[test]
    fn test_parse_persian_and_arabic_digits() {
        assert_eq!(
            PhoneNumber::parse("۰۹۱۲۱۲۳۴۵۶۷").unwrap().as_str(),
            "09121234567"
        );
        assert_eq!(
            PhoneNumber::parse("٠٩١٢١٢٣٤٥٦٧").unwrap().as_str(),
            "09121234567"
        );
    }

    #[test]
    fn test_parse_separators() {
        assert_eq!(
            PhoneNumber::parse(" 0912-123 4567 ").unwrap().as_str(),
            "09121234567"
        );
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(PhoneNumber::parse("   "), Err(PhoneError::Empty));
    }

    #[test]
    fn test_parse_invalid_character() {
        assert_eq!(
            PhoneNumber::parse("0912abc4567"),
            Err(PhoneError::InvalidCharacter('a'))
        );
        // A plus sign is only allowed in front
        assert_eq!(
            PhoneNumber::parse("0912+1234567"),
            Err(PhoneError::InvalidCharacter('+'))
        );
    }

    #[test]
    fn test_parse_rejects_landline_and_short_numbers() {
        assert_eq!(PhoneNumber::parse("02188776655"), Err(PhoneError::NotMobile));
        assert_eq!(PhoneNumber::parse("0912123456"), Err(PhoneError::NotMobile));
        assert_eq!(PhoneNumber::parse("091212345678"), Err(PhoneError::NotMobile));
    }

    #[test]
    fn test_international_and_masked() {
        let phone = PhoneNumber::parse("09351112233").unwrap();
        assert_eq!(phone.international(), "+989351112233");
        assert_eq!(phone.masked(), "0935***2233");
    }

    #[test]
    fn test_serde_validates_on_deserialize() {
        let phone: PhoneNumber = serde_json::from_str("\"+989121234567\"").unwrap();
        assert_eq!(phone.as_str(), "09121234567");
        assert!(serde_json::from_str::<PhoneNumber>("\"12345\"").is_err());
        assert_eq!(serde_json::to_string(&phone).unwrap(), "\"09121234567\"");
    }
}
