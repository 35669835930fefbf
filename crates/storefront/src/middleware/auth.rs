//! Authentication middleware and extractors.
//!
//! Provides extractors for requiring a signed-in user (or a back-office
//! administrator) in route handlers.

use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, Method, StatusCode, header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use roghan_core::UserRole;

use super::page::request_uri;
use crate::db::UserRepository;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Extractor that requires a signed-in user.
///
/// If nobody is signed in, returns a redirect to the login page that comes
/// back to the requested path afterwards.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("سلام {}", user.display_name())
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Error returned when authentication is required but missing or insufficient.
pub enum AuthRejection {
    /// Redirect to the login page (for HTML requests), remembering the path.
    RedirectToLogin(String),
    /// HTMX request: ask the client to navigate to the login page.
    HtmxRedirect(String),
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Signed in but not an administrator.
    Forbidden,
    /// The role lookup failed.
    Internal,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(to) => Redirect::to(&to).into_response(),
            Self::HtmxRedirect(to) => {
                let mut response = StatusCode::UNAUTHORIZED.into_response();
                if let Ok(value) = HeaderValue::from_str(&to) {
                    response.headers_mut().insert("hx-redirect", value);
                }
                response
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => StatusCode::FORBIDDEN.into_response(),
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// Login URL that returns to `path` after sign-in.
#[must_use]
pub fn login_url(path: &str) -> String {
    if path.is_empty() || path == "/" {
        "/auth/login".to_string()
    } else {
        format!("/auth/login?next={}", urlencoding::encode(path))
    }
}

/// Where to come back to after signing in.
///
/// Form posts return to the page the form was on, taken from `Referer`.
fn return_path(parts: &Parts) -> String {
    if parts.method == Method::GET {
        return request_uri(parts)
            .path_and_query()
            .map_or("/", axum::http::uri::PathAndQuery::as_str)
            .to_owned();
    }
    parts
        .headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| url::Url::parse(v).ok())
        .map_or_else(
            || "/".to_owned(),
            |referer| match referer.query() {
                Some(query) => format!("{}?{query}", referer.path()),
                None => referer.path().to_owned(),
            },
        )
}

fn rejection_for(parts: &Parts) -> AuthRejection {
    let path = return_path(parts);
    let path = path.as_str();

    if request_uri(parts).path().starts_with("/api/") {
        AuthRejection::Unauthorized
    } else if parts.headers.contains_key("hx-request") {
        AuthRejection::HtmxRedirect(login_url(path))
    } else {
        AuthRejection::RedirectToLogin(login_url(path))
    }
}

async fn session_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match session_user(parts).await {
            Some(user) => Ok(Self(user)),
            None => Err(rejection_for(parts)),
        }
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is signed in.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_user(parts).await))
    }
}

/// Extractor that requires a back-office administrator.
///
/// The role stored in the session is only a hint: it is re-read from the
/// database on every request so a demotion takes effect immediately.
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(user) = session_user(parts).await else {
            return Err(rejection_for(parts));
        };

        let current = UserRepository::new(state.pool())
            .get_by_id(user.id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, user_id = %user.id, "Failed to load admin role");
                AuthRejection::Internal
            })?;

        match current {
            Some(db_user) if db_user.role == UserRole::Admin => {
                Ok(Self(CurrentUser::from(&db_user)))
            }
            Some(_) => {
                tracing::warn!(user_id = %user.id, path = %request_uri(parts).path(), "Non-admin tried back-office");
                Err(AuthRejection::Forbidden)
            }
            None => Err(rejection_for(parts)),
        }
    }
}

/// Helper to set the current user in the session.
///
/// The session ID is cycled first so a pre-login session ID cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Helper to clear the current user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(method: Method, uri: &str, referer: Option<&str>) -> Parts {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(referer) = referer {
            builder = builder.header(header::REFERER, referer);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_return_path_for_form_posts_uses_referer() {
        let get = parts(Method::GET, "/checkout?x=1", None);
        assert_eq!(return_path(&get), "/checkout?x=1");

        let post = parts(
            Method::POST,
            "/products/castrol-edge/questions",
            Some("https://roghan.example/products/castrol-edge?tab=qa"),
        );
        assert_eq!(return_path(&post), "/products/castrol-edge?tab=qa");

        let bare = parts(Method::POST, "/cart/add", None);
        assert_eq!(return_path(&bare), "/");
    }

    #[test]
    fn test_login_url_keeps_return_path() {
        assert_eq!(login_url("/"), "/auth/login");
        assert_eq!(
            login_url("/account/orders?page=2"),
            "/auth/login?next=%2Faccount%2Forders%3Fpage%3D2"
        );
    }
}
