//! Home page route handler.

use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::cache::HomeData;
use crate::error::Result;
use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    pub home: Arc<HomeData>,
}

/// Display the home page: banners, newest products, brands and latest posts.
#[instrument(skip(state, page))]
pub async fn home(State(state): State<AppState>, page: PageContext) -> Result<impl IntoResponse> {
    let home = state.catalog().home(state.pool()).await?;
    Ok(HomeTemplate { page, home })
}
