//! Back-office access management.
//!
//! Accounts are created by signing in with an OTP on the storefront; these
//! commands only change the role of an existing account.

use roghan_core::{PhoneNumber, UserRole};
use roghan_storefront::db::RepositoryError;
use roghan_storefront::db::users::UserRepository;
use thiserror::Error;

use super::ConnectError;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The argument is not a valid Iranian mobile number.
    #[error("Invalid phone number {0}: {1}")]
    InvalidPhone(String, roghan_core::PhoneError),

    /// No account uses the number yet.
    #[error("No account with phone {0}; sign in on the storefront first")]
    UnknownUser(PhoneNumber),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Give the account owning `phone` the admin role.
///
/// # Errors
///
/// Returns an error if the number is invalid or has no account.
pub async fn promote(phone: &str) -> Result<(), AdminError> {
    set_role(phone, UserRole::Admin).await
}

/// Return the account owning `phone` to the customer role.
///
/// # Errors
///
/// Returns an error if the number is invalid or has no account.
pub async fn demote(phone: &str) -> Result<(), AdminError> {
    set_role(phone, UserRole::Customer).await
}

async fn set_role(phone: &str, role: UserRole) -> Result<(), AdminError> {
    let phone =
        PhoneNumber::parse(phone).map_err(|e| AdminError::InvalidPhone(phone.to_owned(), e))?;

    let pool = super::connect().await?;
    let user = match UserRepository::new(&pool).set_role_by_phone(&phone, role).await {
        Ok(user) => user,
        Err(RepositoryError::NotFound) => return Err(AdminError::UnknownUser(phone)),
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = %user.id, %phone, role = %role, "Role updated");
    Ok(())
}
