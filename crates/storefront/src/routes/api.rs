//! JSON API routes.
//!
//! The only endpoint is the engagement beacon that the storefront script
//! calls for interactions the server never sees (banner clicks). Product
//! views, cart adds, compare adds and checkout starts are recorded by their
//! own handlers.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use roghan_core::{EngagementKind, ProductId};

use crate::db::EngagementRepository;
use crate::middleware::OptionalAuth;
use crate::state::AppState;

/// Error response for API endpoints.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

/// Beacon payload.
#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub kind: EngagementKind,
    #[serde(default)]
    pub product_id: Option<i64>,
}

/// Kinds a browser may report directly.
const fn accepted_from_client(kind: EngagementKind) -> bool {
    matches!(kind, EngagementKind::BannerClick)
}

/// Record an engagement event.
///
/// POST /api/events
///
/// # Errors
///
/// Returns `ApiError` for kinds the server records itself.
#[instrument(skip(state, session, user), fields(kind = %request.kind))]
pub async fn record_event(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<EventRequest>,
) -> Result<StatusCode, ApiError> {
    if !accepted_from_client(request.kind) {
        return Err(ApiError::new("event kind is recorded by the server"));
    }

    let session_key = session.id().map(|id| id.to_string());
    if let Err(e) = EngagementRepository::new(state.pool())
        .record(
            request.kind,
            request.product_id.map(ProductId::new),
            user.as_ref().map(|u| u.id),
            session_key.as_deref(),
        )
        .await
    {
        tracing::warn!(error = %e, "Failed to record beacon event");
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_only_client_side_kinds_are_accepted() {
        assert!(accepted_from_client(EngagementKind::BannerClick));
        assert!(!accepted_from_client(EngagementKind::ProductView));
        assert!(!accepted_from_client(EngagementKind::CheckoutStart));
    }

    #[test]
    fn test_event_request_parses_snake_case_kind() {
        let request: EventRequest =
            serde_json::from_str(r#"{"kind":"banner_click"}"#).unwrap();
        assert_eq!(request.kind, EngagementKind::BannerClick);
        assert!(request.product_id.is_none());
    }
}
