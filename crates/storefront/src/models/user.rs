//! Accounts and shipping addresses.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use roghan_core::{AddressId, PhoneNumber, UserId, UserRole};

use crate::validation::FieldErrors;

/// A storefront account, identified by its verified mobile number.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub phone: PhoneNumber,
    pub full_name: String,
    pub role: UserRole,
    pub phone_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A saved shipping address.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub recipient: String,
    pub phone: String,
    pub province: String,
    pub city: String,
    pub line: String,
    pub postal_code: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl Address {
    /// One-line form for order summaries.
    #[must_use]
    pub fn one_line(&self) -> String {
        format!("{}، {}، {}", self.province, self.city, self.line)
    }
}

/// Raw address form as posted by the browser.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressForm {
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub line: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub make_default: Option<String>,
}

/// A validated address ready to be stored or snapshotted into an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressInput {
    pub recipient: String,
    pub phone: PhoneNumber,
    pub province: String,
    pub city: String,
    pub line: String,
    pub postal_code: String,
    pub make_default: bool,
}

impl AddressForm {
    /// Validate every field.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages when any field is invalid.
    pub fn validate(&self) -> Result<AddressInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        let recipient = errors.required("recipient", &self.recipient);
        errors.max_chars("recipient", &recipient, 100);
        let phone = errors.phone("phone", &self.phone);
        let province = errors.required("province", &self.province);
        let city = errors.required("city", &self.city);
        let line = errors.required("line", &self.line);
        errors.max_chars("line", &line, 500);
        let postal_code = errors.postal_code("postal_code", &self.postal_code);

        match phone {
            Some(phone) => errors.finish(AddressInput {
                recipient,
                phone,
                province,
                city,
                line,
                postal_code,
                make_default: self.make_default.is_some(),
            }),
            None => Err(errors),
        }
    }
}

impl From<&Address> for AddressForm {
    fn from(address: &Address) -> Self {
        Self {
            recipient: address.recipient.clone(),
            phone: address.phone.clone(),
            province: address.province.clone(),
            city: address.city.clone(),
            line: address.line.clone(),
            postal_code: address.postal_code.clone(),
            make_default: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> AddressForm {
        AddressForm {
            recipient: "رضا کریمی".to_string(),
            phone: "09351234567".to_string(),
            province: "تهران".to_string(),
            city: "تهران".to_string(),
            line: "خیابان آزادی، پلاک ۱۲".to_string(),
            postal_code: "1234567890".to_string(),
            make_default: Some("on".to_string()),
        }
    }

    #[test]
    fn test_valid_address() {
        let input = form().validate().unwrap();
        assert_eq!(input.phone.as_str(), "09351234567");
        assert!(input.make_default);
    }

    #[test]
    fn test_invalid_address_collects_all_fields() {
        let bad = AddressForm {
            phone: "123".to_string(),
            postal_code: "12".to_string(),
            ..AddressForm::default()
        };
        let errors = bad.validate().unwrap_err();
        for field in ["recipient", "phone", "province", "city", "line", "postal_code"] {
            assert!(errors.has(field), "missing error for {field}");
        }
    }
}
