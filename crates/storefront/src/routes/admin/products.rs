//! Back-office product management.

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

use roghan_core::ProductId;

use crate::db::{BrandRepository, CarRepository, CategoryRepository, ProductRepository};
use crate::error::Result;
use crate::filters;
use crate::flash::Flash;
use crate::middleware::{PageContext, RequireAdmin};
use crate::models::catalog::{Car, Pagination, Product, ProductForm};
use crate::routes::products::FacetOption;
use crate::routes::see_other;
use crate::state::AppState;
use crate::validation::FieldErrors;

use super::{ListQuery, page_window, paginate, slug_conflict};

/// Product list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/products/index.html")]
pub struct ProductsTemplate {
    pub page: PageContext,
    pub products: Vec<Product>,
    pub pagination: Pagination,
    pub q: String,
}

/// Product form template (new and edit).
#[derive(Template, WebTemplate)]
#[template(path = "admin/products/form.html")]
pub struct ProductFormTemplate {
    pub page: PageContext,
    /// `None` for a new product.
    pub product_id: Option<ProductId>,
    pub form: ProductForm,
    pub errors: FieldErrors,
    pub brand_options: Vec<FacetOption>,
    pub category_options: Vec<FacetOption>,
    /// Reference list for the fitment field.
    pub cars: Vec<Car>,
}

async fn form_template(
    state: &AppState,
    page: PageContext,
    product_id: Option<ProductId>,
    form: ProductForm,
    errors: FieldErrors,
) -> Result<ProductFormTemplate> {
    let pool = state.pool();
    let brand_repo = BrandRepository::new(pool);
    let category_repo = CategoryRepository::new(pool);
    let car_repo = CarRepository::new(pool);
    let (brands, categories, cars) = tokio::try_join!(
        brand_repo.list(),
        category_repo.list(),
        car_repo.list(None),
    )?;

    let brand_options = brands
        .iter()
        .map(|b| FacetOption {
            value: b.id.to_string(),
            label: b.name.clone(),
            selected: b.id.to_string() == form.brand_id,
        })
        .collect();
    let category_options = categories
        .iter()
        .map(|c| FacetOption {
            value: c.id.to_string(),
            label: c.name.clone(),
            selected: c.id.to_string() == form.category_id,
        })
        .collect();

    Ok(ProductFormTemplate {
        page,
        product_id,
        form,
        errors,
        brand_options,
        category_options,
        cars,
    })
}

/// List products, active or not.
#[instrument(skip(state, page, _admin))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let (current, limit, offset) = page_window(query.page);
    let (products, total) = ProductRepository::new(state.pool())
        .admin_list(query.search(), limit, offset)
        .await?;

    Ok(ProductsTemplate {
        page,
        products,
        pagination: paginate(current, total),
        q: query.search().unwrap_or_default().to_owned(),
    })
}

/// New product form.
#[instrument(skip(state, page, _admin))]
pub async fn new_form(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    let form = ProductForm {
        is_active: Some("on".to_string()),
        ..ProductForm::default()
    };
    form_template(&state, page, None, form, FieldErrors::new()).await
}

/// Create a product.
#[instrument(skip(state, page, session, headers, form), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let mut errors = match form.validate() {
        Ok(input) => match ProductRepository::new(state.pool()).create(&input).await {
            Ok(id) => {
                tracing::info!(product_id = %id, slug = %input.slug, "Product created");
                state.catalog().invalidate_all().await;
                Flash::success("محصول ساخته شد.").set(&session).await;
                return Ok(see_other(&headers, "/admin/products"));
            }
            Err(e) => {
                let mut errors = FieldErrors::new();
                slug_conflict(&mut errors, e)?;
                errors
            }
        },
        Err(errors) => errors,
    };
    errors.add("form", "فرم را بررسی کنید.");
    Ok(form_template(&state, page, None, form, errors)
        .await?
        .into_response())
}

/// Edit form for an existing product.
#[instrument(skip(state, page, _admin))]
pub async fn edit_form(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let id = ProductId::new(id);
    let products = ProductRepository::new(state.pool());
    let product = products.get(id).await?;
    let car_ids = products.car_ids_for(id).await?;
    let form = ProductForm::from_product(&product, &car_ids);
    form_template(&state, page, Some(id), form, FieldErrors::new()).await
}

/// Update a product.
#[instrument(skip(state, page, session, headers, form), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let id = ProductId::new(id);
    let errors = match form.validate() {
        Ok(input) => match ProductRepository::new(state.pool()).update(id, &input).await {
            Ok(()) => {
                tracing::info!(product_id = %id, "Product updated");
                state.catalog().invalidate_all().await;
                Flash::success("محصول ذخیره شد.").set(&session).await;
                return Ok(see_other(&headers, &format!("/admin/products/{id}/edit")));
            }
            Err(e) => {
                let mut errors = FieldErrors::new();
                slug_conflict(&mut errors, e)?;
                errors
            }
        },
        Err(errors) => errors,
    };
    Ok(form_template(&state, page, Some(id), form, errors)
        .await?
        .into_response())
}

/// Delete a product.
#[instrument(skip(state, session, headers), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response> {
    let id = ProductId::new(id);
    ProductRepository::new(state.pool()).delete(id).await?;
    tracing::info!(product_id = %id, "Product deleted");
    state.catalog().invalidate_all().await;
    Flash::success("محصول حذف شد.").set(&session).await;
    Ok(see_other(&headers, "/admin/products"))
}
