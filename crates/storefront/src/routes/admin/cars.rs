//! Car catalog and maintenance schedule management.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use roghan_core::{CarId, MaintenanceTaskId};

use crate::db::CarRepository;
use crate::error::Result;
use crate::filters;
use crate::flash::Flash;
use crate::middleware::{PageContext, RequireAdmin};
use crate::models::catalog::{Car, CarForm, MaintenanceTask, MaintenanceTaskForm};
use crate::routes::see_other;
use crate::state::AppState;
use crate::validation::FieldErrors;

use super::{ListQuery, slug_conflict};

/// Car list with the create form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/cars/index.html")]
pub struct CarsTemplate {
    pub page: PageContext,
    pub cars: Vec<Car>,
    pub q: String,
    pub form: CarForm,
    pub errors: FieldErrors,
}

/// A schedule row with its own edit form.
pub struct TaskRow {
    pub task: MaintenanceTask,
    pub form: MaintenanceTaskForm,
}

/// Car edit page with its maintenance schedule.
#[derive(Template, WebTemplate)]
#[template(path = "admin/cars/edit.html")]
pub struct CarEditTemplate {
    pub page: PageContext,
    pub car: Car,
    pub form: CarForm,
    pub errors: FieldErrors,
    pub tasks: Vec<TaskRow>,
    pub task_form: MaintenanceTaskForm,
}

fn car_path(id: CarId) -> String {
    format!("/admin/cars/{id}")
}

async fn edit_template(
    state: &AppState,
    page: PageContext,
    car: Car,
    form: CarForm,
    errors: FieldErrors,
) -> Result<CarEditTemplate> {
    let tasks = CarRepository::new(state.pool())
        .tasks(car.id)
        .await?
        .into_iter()
        .map(|task| TaskRow {
            form: MaintenanceTaskForm::from(&task),
            task,
        })
        .collect();
    Ok(CarEditTemplate {
        page,
        car,
        form,
        errors,
        tasks,
        task_form: MaintenanceTaskForm::default(),
    })
}

/// List cars, optionally searching make and model.
#[instrument(skip(state, page, _admin))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let cars = CarRepository::new(state.pool()).list(query.search()).await?;
    Ok(CarsTemplate {
        page,
        cars,
        q: query.search().unwrap_or_default().to_owned(),
        form: CarForm::default(),
        errors: FieldErrors::new(),
    })
}

/// Create a car.
#[instrument(skip(state, page, session, headers, form), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<CarForm>,
) -> Result<Response> {
    let repo = CarRepository::new(state.pool());
    let errors = match form.validate() {
        Ok(input) => match repo.create(&input).await {
            Ok(id) => {
                tracing::info!(car_id = %id, slug = %input.slug, "Car created");
                Flash::success("خودرو اضافه شد. اکنون برنامه سرویس را وارد کنید.")
                    .set(&session)
                    .await;
                return Ok(see_other(&headers, &car_path(id)));
            }
            Err(e) => {
                let mut errors = FieldErrors::new();
                slug_conflict(&mut errors, e)?;
                errors
            }
        },
        Err(errors) => errors,
    };

    let cars = repo.list(None).await?;
    Ok(CarsTemplate {
        page,
        cars,
        q: String::new(),
        form,
        errors,
    }
    .into_response())
}

/// Car edit page.
#[instrument(skip(state, page, _admin))]
pub async fn edit(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let car = CarRepository::new(state.pool()).get(CarId::new(id)).await?;
    let form = CarForm::from(&car);
    edit_template(&state, page, car, form, FieldErrors::new()).await
}

/// Update a car.
#[instrument(skip(state, page, session, headers, form), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Form(form): Form<CarForm>,
) -> Result<Response> {
    let car_id = CarId::new(id);
    let repo = CarRepository::new(state.pool());
    let errors = match form.validate() {
        Ok(input) => match repo.update(car_id, &input).await {
            Ok(()) => {
                tracing::info!(car_id = %car_id, "Car updated");
                Flash::success("خودرو ذخیره شد.").set(&session).await;
                return Ok(see_other(&headers, &car_path(car_id)));
            }
            Err(e) => {
                let mut errors = FieldErrors::new();
                slug_conflict(&mut errors, e)?;
                errors
            }
        },
        Err(errors) => errors,
    };

    let car = repo.get(car_id).await?;
    Ok(edit_template(&state, page, car, form, errors)
        .await?
        .into_response())
}

/// Delete a car with its schedule and fitment rows.
#[instrument(skip(state, session, headers), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response> {
    CarRepository::new(state.pool()).delete(CarId::new(id)).await?;
    tracing::info!(car_id = id, "Car deleted");
    Flash::success("خودرو حذف شد.").set(&session).await;
    Ok(see_other(&headers, "/admin/cars"))
}

/// Add a maintenance task.
#[instrument(skip(state, session, headers, form), fields(admin_id = %admin.id))]
pub async fn create_task(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Form(form): Form<MaintenanceTaskForm>,
) -> Result<Response> {
    let car_id = CarId::new(id);
    match form.validate() {
        Ok(input) => {
            let task_id = CarRepository::new(state.pool())
                .create_task(car_id, &input)
                .await?;
            tracing::info!(car_id = %car_id, task_id = %task_id, "Maintenance task added");
            Flash::success("مورد سرویس اضافه شد.").set(&session).await;
        }
        Err(errors) => {
            Flash::error(errors.first().unwrap_or("فرم را بررسی کنید."))
                .set(&session)
                .await;
        }
    }
    Ok(see_other(&headers, &format!("{}#tasks", car_path(car_id))))
}

/// Update a maintenance task.
#[instrument(skip(state, session, headers, form), fields(admin_id = %admin.id))]
pub async fn update_task(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path((id, task_id)): Path<(i64, i64)>,
    Form(form): Form<MaintenanceTaskForm>,
) -> Result<Response> {
    let car_id = CarId::new(id);
    match form.validate() {
        Ok(input) => {
            CarRepository::new(state.pool())
                .update_task(car_id, MaintenanceTaskId::new(task_id), &input)
                .await?;
            Flash::success("مورد سرویس ذخیره شد.").set(&session).await;
        }
        Err(errors) => {
            Flash::error(errors.first().unwrap_or("فرم را بررسی کنید."))
                .set(&session)
                .await;
        }
    }
    Ok(see_other(&headers, &format!("{}#task-{task_id}", car_path(car_id))))
}

/// Delete a maintenance task.
#[instrument(skip(state, session, headers), fields(admin_id = %admin.id))]
pub async fn delete_task(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path((id, task_id)): Path<(i64, i64)>,
) -> Result<Response> {
    let car_id = CarId::new(id);
    CarRepository::new(state.pool())
        .delete_task(car_id, MaintenanceTaskId::new(task_id))
        .await?;
    Flash::success("مورد سرویس حذف شد.").set(&session).await;
    Ok(see_other(&headers, &format!("{}#tasks", car_path(car_id))))
}
