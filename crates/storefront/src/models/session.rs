//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use roghan_core::{PhoneNumber, UserId, UserRole};

use super::user::User;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user. The
/// role is refreshed from the database by the admin extractor, so a demoted
/// admin loses access on the next request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// Verified mobile number.
    pub phone: PhoneNumber,
    /// Display name (may be empty until the profile is filled in).
    pub full_name: String,
    /// Account role at sign-in time.
    pub role: UserRole,
}

impl CurrentUser {
    /// Name for the header: the full name, or the masked phone number.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.full_name.trim().is_empty() {
            self.phone.masked()
        } else {
            self.full_name.clone()
        }
    }

    /// Whether the session belongs to a back-office user.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            phone: user.phone.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the guest cart token (UUID) before sign-in.
    pub const CART_TOKEN: &str = "cart_token";

    /// Key for the product IDs on the comparison board.
    pub const COMPARE: &str = "compare";

    /// Key for the one-shot flash message shown after a redirect.
    pub const FLASH: &str = "flash";

    /// Key for the phone number waiting on a login code.
    pub const PENDING_LOGIN_PHONE: &str = "pending_login_phone";

    /// Key for the new phone number waiting on a change-phone code.
    pub const PENDING_PHONE_CHANGE: &str = "pending_phone_change";

    /// Key for the page to return to after sign-in.
    pub const RETURN_TO: &str = "return_to";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(name: &str) -> CurrentUser {
        CurrentUser {
            id: UserId::new(7),
            phone: PhoneNumber::parse("09121234567").unwrap(),
            full_name: name.to_string(),
            role: UserRole::Customer,
        }
    }

    #[test]
    fn test_display_name_falls_back_to_masked_phone() {
        assert_eq!(user("").display_name(), "0912***4567");
        assert_eq!(user("  ").display_name(), "0912***4567");
        assert_eq!(user("مریم احمدی").display_name(), "مریم احمدی");
    }

    #[test]
    fn test_session_roundtrip() {
        let json = serde_json::to_string(&user("Ali")).unwrap();
        let back: CurrentUser = serde_json::from_str(&json).unwrap();
        assert_eq!(back.phone.as_str(), "09121234567");
        assert!(!back.is_admin());
    }
}
