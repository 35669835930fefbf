//! Question and review moderation.

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

use roghan_core::{QuestionId, QuestionStatus, ReviewId};

use crate::db::{QuestionRepository, ReviewRepository};
use crate::error::{AppError, Result};
use crate::filters;
use crate::flash::Flash;
use crate::middleware::{PageContext, RequireAdmin};
use crate::models::community::{AnswerForm, Question, QuestionTarget, Review};
use crate::routes::products::FacetOption;
use crate::routes::see_other;
use crate::state::AppState;

// =============================================================================
// Questions
// =============================================================================

/// Question queue filters. Defaults to pending product questions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionQuery {
    pub target: Option<QuestionTarget>,
    /// `all` or a status name.
    pub status: Option<String>,
}

impl QuestionQuery {
    fn target(&self) -> QuestionTarget {
        self.target.unwrap_or(QuestionTarget::Product)
    }

    fn status(&self) -> Option<QuestionStatus> {
        match self.status.as_deref() {
            None | Some("") => Some(QuestionStatus::Pending),
            Some(s) => s.parse().ok(),
        }
    }
}

/// Question moderation template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/questions.html")]
pub struct QuestionsTemplate {
    pub page: PageContext,
    pub questions: Vec<Question>,
    pub target: QuestionTarget,
    pub target_options: Vec<FacetOption>,
    pub status_options: Vec<FacetOption>,
    /// Query string that brings the admin back to this view.
    pub return_query: String,
}

/// Status change form.
#[derive(Debug, Deserialize)]
pub struct QuestionStatusForm {
    pub status: String,
    #[serde(default)]
    pub back: String,
}

fn questions_path(back: &str) -> String {
    // `back` is a query string this page rendered; anything else is dropped.
    if back.is_empty() || back.contains(['/', '\\', '#']) {
        "/admin/questions".to_string()
    } else {
        format!("/admin/questions?{back}")
    }
}

/// Moderation queue.
#[instrument(skip(state, page, _admin))]
pub async fn questions(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<QuestionQuery>,
) -> Result<impl IntoResponse> {
    let target = query.target();
    let status = query.status();
    let questions = QuestionRepository::new(state.pool())
        .admin_list(target, status)
        .await?;

    let target_options = [QuestionTarget::Product, QuestionTarget::Car]
        .into_iter()
        .map(|t| FacetOption {
            value: t.as_str().to_string(),
            label: t.label().to_string(),
            selected: t == target,
        })
        .collect();
    let mut status_options: Vec<FacetOption> = QuestionStatus::ALL
        .iter()
        .map(|s| FacetOption {
            value: s.as_str().to_string(),
            label: s.label().to_string(),
            selected: Some(*s) == status,
        })
        .collect();
    status_options.push(FacetOption {
        value: "all".to_string(),
        label: "همه".to_string(),
        selected: status.is_none(),
    });

    Ok(QuestionsTemplate {
        page,
        questions,
        target,
        target_options,
        status_options,
        return_query: format!(
            "target={}&status={}",
            target.as_str(),
            status.map_or("all", QuestionStatus::as_str)
        ),
    })
}

/// Answer a question, optionally publishing it.
#[instrument(skip(state, session, headers, form), fields(admin_id = %admin.id))]
pub async fn answer_question(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path((target, id)): Path<(QuestionTarget, i64)>,
    Form(form): Form<AnswerForm>,
) -> Result<Response> {
    let answer = form.answer.trim();
    if answer.is_empty() {
        Flash::error("متن پاسخ خالی است.").set(&session).await;
    } else {
        QuestionRepository::new(state.pool())
            .answer(target, QuestionId::new(id), answer, form.publish.is_some())
            .await?;
        tracing::info!(question_id = id, target = target.as_str(), "Question answered");
        Flash::success("پاسخ ثبت شد.").set(&session).await;
    }
    Ok(see_other(
        &headers,
        &format!("/admin/questions?target={}#question-{id}", target.as_str()),
    ))
}

/// Publish or reject a question.
#[instrument(skip(state, session, headers, form), fields(admin_id = %admin.id))]
pub async fn set_question_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path((target, id)): Path<(QuestionTarget, i64)>,
    Form(form): Form<QuestionStatusForm>,
) -> Result<Response> {
    let status: QuestionStatus = form.status.parse().map_err(AppError::BadRequest)?;
    QuestionRepository::new(state.pool())
        .set_status(target, QuestionId::new(id), status)
        .await?;
    tracing::info!(question_id = id, target = target.as_str(), %status, "Question status changed");
    Flash::success(format!("وضعیت سؤال: {}", status.label()))
        .set(&session)
        .await;
    Ok(see_other(&headers, &questions_path(&form.back)))
}

// =============================================================================
// Reviews
// =============================================================================

/// Review list filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewQuery {
    /// `all` lists approved reviews too.
    pub show: Option<String>,
}

/// Review moderation template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/reviews.html")]
pub struct ReviewsTemplate {
    pub page: PageContext,
    pub reviews: Vec<Review>,
    pub pending_only: bool,
}

/// List reviews awaiting approval (or all with `?show=all`).
#[instrument(skip(state, page, _admin))]
pub async fn reviews(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<ReviewQuery>,
) -> Result<impl IntoResponse> {
    let pending_only = query.show.as_deref() != Some("all");
    let reviews = ReviewRepository::new(state.pool())
        .admin_list(pending_only)
        .await?;
    Ok(ReviewsTemplate {
        page,
        reviews,
        pending_only,
    })
}

/// Approve a review.
#[instrument(skip(state, session, headers), fields(admin_id = %admin.id))]
pub async fn approve_review(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response> {
    ReviewRepository::new(state.pool())
        .approve(ReviewId::new(id))
        .await?;
    tracing::info!(review_id = id, "Review approved");
    Flash::success("نظر تأیید شد.").set(&session).await;
    Ok(see_other(&headers, "/admin/reviews"))
}

/// Delete a review.
#[instrument(skip(state, session, headers), fields(admin_id = %admin.id))]
pub async fn delete_review(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response> {
    ReviewRepository::new(state.pool())
        .delete(ReviewId::new(id))
        .await?;
    tracing::info!(review_id = id, "Review deleted");
    Flash::success("نظر حذف شد.").set(&session).await;
    Ok(see_other(&headers, "/admin/reviews"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_query_defaults_to_pending_products() {
        let query = QuestionQuery::default();
        assert_eq!(query.target(), QuestionTarget::Product);
        assert_eq!(query.status(), Some(QuestionStatus::Pending));

        let all = QuestionQuery {
            target: Some(QuestionTarget::Car),
            status: Some("all".to_string()),
        };
        assert_eq!(all.status(), None);
    }

    #[test]
    fn test_questions_path_rejects_paths() {
        assert_eq!(questions_path(""), "/admin/questions");
        assert_eq!(
            questions_path("target=car&status=all"),
            "/admin/questions?target=car&status=all"
        );
        assert_eq!(questions_path("//evil.example"), "/admin/questions");
    }
}
