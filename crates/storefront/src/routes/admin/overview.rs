//! Back-office overview.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::db::engagement::{KindCount, ProductViews};
use crate::db::overview::{Revenue, StatusCount};
use crate::db::{EngagementRepository, OverviewRepository, QuestionRepository, ReviewRepository};
use crate::error::Result;
use crate::filters;
use crate::middleware::{PageContext, RequireAdmin};
use crate::state::AppState;

/// Window for engagement figures, in days.
const ENGAGEMENT_DAYS: i32 = 30;

/// Products listed under "most viewed".
const TOP_VIEWED: i64 = 10;

/// Stock level at or below which a product counts as running low.
const LOW_STOCK_THRESHOLD: i32 = 5;

/// Overview template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/overview.html")]
pub struct OverviewTemplate {
    pub page: PageContext,
    pub revenue: Revenue,
    pub orders_by_status: Vec<StatusCount>,
    pub top_viewed: Vec<ProductViews>,
    pub events: Vec<KindCount>,
    pub engagement_days: i32,
    pub pending_questions: i64,
    pub pending_reviews: i64,
    pub low_stock: i64,
    pub low_stock_threshold: i32,
}

/// Display sales, order and engagement figures.
#[instrument(skip(state, page, _admin))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    let pool = state.pool();
    let overview = OverviewRepository::new(pool);
    let engagement = EngagementRepository::new(pool);
    let questions = QuestionRepository::new(pool);
    let reviews = ReviewRepository::new(pool);

    let (revenue, orders_by_status, low_stock, top_viewed, events, pending_questions, pending_reviews) =
        tokio::try_join!(
            overview.revenue(),
            overview.orders_by_status(),
            overview.low_stock_count(LOW_STOCK_THRESHOLD),
            engagement.top_viewed(ENGAGEMENT_DAYS, TOP_VIEWED),
            engagement.counts_by_kind(ENGAGEMENT_DAYS),
            questions.pending_count(),
            reviews.pending_count(),
        )?;

    Ok(OverviewTemplate {
        page,
        revenue,
        orders_by_status,
        top_viewed,
        events,
        engagement_days: ENGAGEMENT_DAYS,
        pending_questions,
        pending_reviews,
        low_stock,
        low_stock_threshold: LOW_STOCK_THRESHOLD,
    })
}
