//! Per-request page context shared by every full-page template.
//!
//! Collects what the layout needs (CSP nonce, signed-in user, flash message,
//! cart badge, comparison count) so handlers take one extractor instead of
//! five.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{Uri, request::Parts},
};
use tower_sessions::Session;
use uuid::Uuid;

use roghan_core::ProductId;

use super::csp::CspNonce;
use crate::db::CartRepository;
use crate::db::carts::CartOwner;
use crate::flash::Flash;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// The full request URI. Nested routers see only the part after their
/// mount point in `parts.uri`.
pub(crate) fn request_uri(parts: &Parts) -> &Uri {
    parts
        .extensions
        .get::<OriginalUri>()
        .map_or(&parts.uri, |original| &original.0)
}

/// Layout data for a rendered page.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub nonce: String,
    pub user: Option<CurrentUser>,
    pub flash: Option<Flash>,
    pub cart_count: i64,
    pub compare_count: usize,
    /// Request path, for highlighting the active navigation link.
    pub path: String,
}

impl PageContext {
    /// Whether a back-office link should be shown.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(CurrentUser::is_admin)
    }

    /// Whether `prefix` is the current section.
    #[must_use]
    pub fn is_active(&self, prefix: &str) -> bool {
        if prefix == "/" {
            self.path == "/"
        } else {
            self.path.starts_with(prefix)
        }
    }
}

impl FromRequestParts<AppState> for PageContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let nonce = parts
            .extensions
            .get::<CspNonce>()
            .map(|n| n.value().to_owned())
            .unwrap_or_default();
        let path = request_uri(parts).path().to_owned();

        let Some(session) = parts.extensions.get::<Session>().cloned() else {
            return Ok(Self {
                nonce,
                path,
                ..Self::default()
            });
        };

        let user: Option<CurrentUser> = session
            .get(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten();
        let flash = Flash::take(&session).await;
        let compare_count = compare_ids(&session).await.len();

        let cart_count = match cart_owner(&session, user.as_ref()).await {
            Some(owner) => CartRepository::new(state.pool())
                .item_count(owner)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Failed to count cart items");
                    0
                }),
            None => 0,
        };

        Ok(Self {
            nonce,
            user,
            flash,
            cart_count,
            compare_count,
            path,
        })
    }
}

/// The cart owner for this session, if there can be a cart yet.
pub async fn cart_owner(session: &Session, user: Option<&CurrentUser>) -> Option<CartOwner> {
    if let Some(user) = user {
        return Some(CartOwner::User(user.id));
    }
    session
        .get::<Uuid>(session_keys::CART_TOKEN)
        .await
        .ok()
        .flatten()
        .map(CartOwner::Guest)
}

/// The cart owner for this session, minting a guest token when needed.
///
/// # Errors
///
/// Returns an error if the token cannot be stored in the session.
pub async fn cart_owner_or_create(
    session: &Session,
    user: Option<&CurrentUser>,
) -> Result<CartOwner, tower_sessions::session::Error> {
    if let Some(owner) = cart_owner(session, user).await {
        return Ok(owner);
    }
    let token = Uuid::new_v4();
    session.insert(session_keys::CART_TOKEN, token).await?;
    Ok(CartOwner::Guest(token))
}

/// Product IDs on the comparison board, oldest first.
pub async fn compare_ids(session: &Session) -> Vec<ProductId> {
    session
        .get::<Vec<ProductId>>(session_keys::COMPARE)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_section() {
        let page = PageContext {
            path: "/products/castrol-edge-5w30".to_string(),
            ..PageContext::default()
        };
        assert!(page.is_active("/products"));
        assert!(!page.is_active("/"));
        assert!(!page.is_admin());
    }
}
