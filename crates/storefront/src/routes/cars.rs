//! Car finder route handlers.

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

use crate::db::questions::QuestionSubject;
use crate::db::{CarRepository, ProductRepository, QuestionRepository};
use crate::error::{AppError, Result};
use crate::filters;
use crate::flash::Flash;
use crate::middleware::{PageContext, RequireAuth};
use crate::models::catalog::{Car, MaintenanceTask, Product};
use crate::models::community::{Question, QuestionForm};
use crate::services::RateLimiter;
use crate::services::rate_limit::QUESTION_PER_USER;
use crate::state::AppState;

use super::see_other;

/// Car search query.
#[derive(Debug, Default, Deserialize)]
pub struct CarSearch {
    #[serde(default)]
    pub q: String,
}

/// Car list template.
#[derive(Template, WebTemplate)]
#[template(path = "cars/index.html")]
pub struct CarsTemplate {
    pub page: PageContext,
    pub cars: Vec<Car>,
    pub q: String,
}

/// Display the car finder.
#[instrument(skip(state, page))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    Query(search): Query<CarSearch>,
) -> Result<impl IntoResponse> {
    let q = search.q.trim().to_owned();
    let cars = CarRepository::new(state.pool())
        .list((!q.is_empty()).then_some(q.as_str()))
        .await?;
    Ok(CarsTemplate { page, cars, q })
}

/// Car detail template.
#[derive(Template, WebTemplate)]
#[template(path = "cars/show.html")]
pub struct CarTemplate {
    pub page: PageContext,
    pub car: Car,
    pub products: Vec<Product>,
    pub tasks: Vec<MaintenanceTask>,
    pub questions: Vec<Question>,
}

/// Display compatible oils, the maintenance schedule and answered questions for a car.
#[instrument(skip(state, page))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let pool = state.pool();
    let cars = CarRepository::new(pool);
    let car = cars
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("car {slug}")))?;

    let product_repo = ProductRepository::new(pool);
    let question_repo = QuestionRepository::new(pool);
    let (products, tasks, questions) = tokio::try_join!(
        product_repo.fitting_car(&car),
        cars.tasks(car.id),
        question_repo.published(QuestionSubject::Car(car.id)),
    )?;

    Ok(CarTemplate {
        page,
        car,
        products,
        tasks,
        questions,
    })
}

/// Ask a question about a car.
#[instrument(skip(state, session, headers, form), fields(user_id = %user.id))]
pub async fn ask_question(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Form(form): Form<QuestionForm>,
) -> Result<Response> {
    let pool = state.pool();
    let back = format!("/cars/{slug}#questions");
    let car = CarRepository::new(pool)
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("car {slug}")))?;

    let body = match form.validate() {
        Ok(body) => body,
        Err(errors) => {
            Flash::error(errors.get("body").unwrap_or_default()).set(&session).await;
            return Ok(see_other(&headers, &back));
        }
    };

    let decision = RateLimiter::new(pool)
        .hit(QUESTION_PER_USER, &user.id.to_string())
        .await?;
    if !decision.allowed {
        Flash::error(decision.user_message()).set(&session).await;
        return Ok(see_other(&headers, &back));
    }

    QuestionRepository::new(pool)
        .create(QuestionSubject::Car(car.id), user.id, &body)
        .await?;

    Flash::success("سؤال شما ثبت شد و پس از بررسی منتشر می‌شود.")
        .set(&session)
        .await;
    Ok(see_other(&headers, &back))
}
