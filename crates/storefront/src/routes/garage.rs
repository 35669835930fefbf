//! Car notebook route handlers.
//!
//! A signed-in customer keeps their cars here with the odometer reading and
//! the services done so far; the page shows what each car needs next.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use roghan_core::{MaintenanceLogId, UserCarId};

use crate::db::{CarRepository, GarageRepository, RepositoryError};
use crate::error::Result;
use crate::filters::{self, today_in_tehran};
use crate::flash::Flash;
use crate::middleware::{PageContext, RequireAuth};
use crate::models::catalog::{Car, MaintenanceTask};
use crate::models::garage::{
    AddCarForm, DueTask, LogServiceForm, MaintenanceLog, OdometerForm, UserCar, next_due,
};
use crate::state::AppState;
use crate::validation::FieldErrors;

use super::see_other;

const GARAGE: &str = "/account/garage";

/// One car in the notebook with its schedule.
pub struct GarageEntry {
    pub car: UserCar,
    pub due: Vec<DueTask>,
    pub tasks: Vec<MaintenanceTask>,
    pub logs: Vec<MaintenanceLog>,
}

/// Notebook page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/garage.html")]
pub struct GarageTemplate {
    pub page: PageContext,
    pub entries: Vec<GarageEntry>,
    /// Car models for the "add a car" picker.
    pub cars: Vec<Car>,
    /// ISO date for the date inputs' upper bound.
    pub today: String,
}

async fn flash_errors(session: &Session, errors: &FieldErrors) {
    Flash::error(errors.first().unwrap_or("اطلاعات وارد شده معتبر نیست."))
        .set(session)
        .await;
}

/// Display the notebook.
#[instrument(skip(state, page), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse> {
    let pool = state.pool();
    let garage = GarageRepository::new(pool);
    let car_repo = CarRepository::new(pool);
    let today = today_in_tehran();

    let mut entries = Vec::new();
    for car in garage.list(user.id).await? {
        let (tasks, logs) = tokio::try_join!(car_repo.tasks(car.car_id), garage.logs(user.id, car.id))?;
        let due = next_due(&tasks, &logs, car.odometer_km, today);
        entries.push(GarageEntry {
            car,
            due,
            tasks,
            logs,
        });
    }

    let cars = car_repo.list(None).await?;

    Ok(GarageTemplate {
        page,
        entries,
        cars,
        today: today.format("%Y-%m-%d").to_string(),
    })
}

/// Add a car to the notebook.
#[instrument(skip(state, session, headers, form), fields(user_id = %user.id))]
pub async fn add_car(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AddCarForm>,
) -> Result<Response> {
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => {
            flash_errors(&session, &errors).await;
            return Ok(see_other(&headers, GARAGE));
        }
    };

    match GarageRepository::new(state.pool())
        .add(user.id, input.car_id, &input.nickname, input.odometer_km)
        .await
    {
        Ok(id) => {
            tracing::info!(user_car_id = %id, "Car added to notebook");
            Flash::success("خودرو به دفترچه اضافه شد.").set(&session).await;
        }
        Err(RepositoryError::Conflict(_)) => {
            Flash::error("خودروی انتخاب‌شده پیدا نشد.").set(&session).await;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(see_other(&headers, GARAGE))
}

/// Record a new odometer reading.
#[instrument(skip(state, session, headers, form), fields(user_id = %user.id))]
pub async fn update_odometer(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Form(form): Form<OdometerForm>,
) -> Result<Response> {
    match form.validate() {
        Ok(km) => {
            GarageRepository::new(state.pool())
                .update_odometer(user.id, UserCarId::new(id), km)
                .await?;
            Flash::success("کیلومتر خودرو به‌روز شد.").set(&session).await;
        }
        Err(errors) => flash_errors(&session, &errors).await,
    }
    Ok(see_other(&headers, &format!("{GARAGE}#car-{id}")))
}

/// Log a completed service.
#[instrument(skip(state, session, headers, form), fields(user_id = %user.id))]
pub async fn log_service(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Form(form): Form<LogServiceForm>,
) -> Result<Response> {
    let back = format!("{GARAGE}#car-{id}");
    let input = match form.validate(today_in_tehran()) {
        Ok(input) => input,
        Err(errors) => {
            flash_errors(&session, &errors).await;
            return Ok(see_other(&headers, &back));
        }
    };

    GarageRepository::new(state.pool())
        .log_service(user.id, UserCarId::new(id), &input)
        .await?;
    Flash::success("سرویس ثبت شد.").set(&session).await;
    Ok(see_other(&headers, &back))
}

/// Delete a service entry.
#[instrument(skip(state, session, headers), fields(user_id = %user.id))]
pub async fn delete_log(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    headers: HeaderMap,
    Path((id, log_id)): Path<(i64, i64)>,
) -> Result<Response> {
    GarageRepository::new(state.pool())
        .delete_log(user.id, UserCarId::new(id), MaintenanceLogId::new(log_id))
        .await?;
    Flash::success("سرویس حذف شد.").set(&session).await;
    Ok(see_other(&headers, &format!("{GARAGE}#car-{id}")))
}

/// Remove a car and its history.
#[instrument(skip(state, session, headers), fields(user_id = %user.id))]
pub async fn remove_car(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response> {
    GarageRepository::new(state.pool())
        .remove(user.id, UserCarId::new(id))
        .await?;
    Flash::success("خودرو از دفترچه حذف شد.").set(&session).await;
    Ok(see_other(&headers, GARAGE))
}
