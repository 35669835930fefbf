//! Customer accounts and roles.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use roghan_core::{UserId, UserRole};

use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::flash::Flash;
use crate::middleware::{PageContext, RequireAdmin};
use crate::models::catalog::Pagination;
use crate::models::user::User;
use crate::state::AppState;
use crate::routes::see_other;

use super::{ListQuery, page_window, paginate};

/// User list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/users.html")]
pub struct UsersTemplate {
    pub page: PageContext,
    pub users: Vec<User>,
    pub pagination: Pagination,
    pub q: String,
    /// The signed-in admin, whose own role cannot be changed here.
    pub self_id: UserId,
}

/// Role change form.
#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub role: String,
}

/// List and search accounts.
#[instrument(skip(state, page, admin))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let (current, limit, offset) = page_window(query.page);
    let (users, total) = UserRepository::new(state.pool())
        .list(query.search(), limit, offset)
        .await?;

    Ok(UsersTemplate {
        page,
        users,
        pagination: paginate(current, total),
        q: query.search().unwrap_or_default().to_owned(),
        self_id: admin.id,
    })
}

/// Grant or revoke back-office access.
///
/// # Errors
///
/// Returns 400 for an unknown role and 403 when an admin targets their own
/// account.
#[instrument(skip(state, session, headers, form), fields(admin_id = %admin.id))]
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Form(form): Form<RoleForm>,
) -> Result<Response> {
    let user_id = UserId::new(id);
    let role: UserRole = form.role.parse().map_err(AppError::BadRequest)?;
    if user_id == admin.id {
        return Err(AppError::Forbidden(
            "admins cannot change their own role".to_string(),
        ));
    }

    UserRepository::new(state.pool()).set_role(user_id, role).await?;
    tracing::info!(user_id = %user_id, %role, "User role changed");
    let message = match role {
        UserRole::Admin => "دسترسی مدیریت داده شد.",
        UserRole::Customer => "دسترسی مدیریت گرفته شد.",
    };
    Flash::success(message).set(&session).await;
    Ok(see_other(&headers, "/admin/users"))
}
