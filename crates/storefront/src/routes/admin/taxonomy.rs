//! Brand and category management.

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

use roghan_core::{BrandId, CategoryId};

use crate::db::{BrandRepository, CategoryRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::filters;
use crate::flash::Flash;
use crate::middleware::{PageContext, RequireAdmin};
use crate::models::catalog::{Brand, BrandForm, Category, CategoryForm};
use crate::routes::products::FacetOption;
use crate::routes::see_other;
use crate::state::AppState;
use crate::validation::FieldErrors;

use super::slug_conflict;

// =============================================================================
// Brands
// =============================================================================

/// Brand list with the create form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/brands/index.html")]
pub struct BrandsTemplate {
    pub page: PageContext,
    pub brands: Vec<Brand>,
    pub form: BrandForm,
    pub errors: FieldErrors,
}

/// Brand edit form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/brands/edit.html")]
pub struct BrandEditTemplate {
    pub page: PageContext,
    pub brand_id: BrandId,
    pub form: BrandForm,
    pub errors: FieldErrors,
}

/// List brands.
#[instrument(skip(state, page, _admin))]
pub async fn brands(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    let brands = BrandRepository::new(state.pool()).list().await?;
    Ok(BrandsTemplate {
        page,
        brands,
        form: BrandForm::default(),
        errors: FieldErrors::new(),
    })
}

/// Create a brand.
#[instrument(skip(state, page, session, headers, form), fields(admin_id = %admin.id))]
pub async fn create_brand(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<BrandForm>,
) -> Result<Response> {
    let repo = BrandRepository::new(state.pool());
    let errors = match form.validate() {
        Ok(input) => match repo.create(&input).await {
            Ok(id) => {
                tracing::info!(brand_id = %id, slug = %input.slug, "Brand created");
                state.catalog().invalidate_all().await;
                Flash::success("برند اضافه شد.").set(&session).await;
                return Ok(see_other(&headers, "/admin/brands"));
            }
            Err(e) => {
                let mut errors = FieldErrors::new();
                slug_conflict(&mut errors, e)?;
                errors
            }
        },
        Err(errors) => errors,
    };

    let brands = repo.list().await?;
    Ok(BrandsTemplate {
        page,
        brands,
        form,
        errors,
    }
    .into_response())
}

/// Brand edit form.
#[instrument(skip(state, page, _admin))]
pub async fn edit_brand(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let brand = BrandRepository::new(state.pool()).get(BrandId::new(id)).await?;
    Ok(BrandEditTemplate {
        page,
        brand_id: brand.id,
        form: BrandForm::from(&brand),
        errors: FieldErrors::new(),
    })
}

/// Update a brand.
#[instrument(skip(state, page, session, headers, form), fields(admin_id = %admin.id))]
pub async fn update_brand(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Form(form): Form<BrandForm>,
) -> Result<Response> {
    let brand_id = BrandId::new(id);
    let errors = match form.validate() {
        Ok(input) => match BrandRepository::new(state.pool()).update(brand_id, &input).await {
            Ok(()) => {
                tracing::info!(brand_id = %brand_id, "Brand updated");
                state.catalog().invalidate_all().await;
                Flash::success("برند ذخیره شد.").set(&session).await;
                return Ok(see_other(&headers, "/admin/brands"));
            }
            Err(e) => {
                let mut errors = FieldErrors::new();
                slug_conflict(&mut errors, e)?;
                errors
            }
        },
        Err(errors) => errors,
    };
    Ok(BrandEditTemplate {
        page,
        brand_id,
        form,
        errors,
    }
    .into_response())
}

/// Delete a brand without products.
#[instrument(skip(state, session, headers), fields(admin_id = %admin.id))]
pub async fn delete_brand(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response> {
    match BrandRepository::new(state.pool()).delete(BrandId::new(id)).await {
        Ok(()) => {
            tracing::info!(brand_id = id, "Brand deleted");
            state.catalog().invalidate_all().await;
            Flash::success("برند حذف شد.").set(&session).await;
        }
        Err(RepositoryError::Conflict(_)) => {
            Flash::error("این برند هنوز محصول دارد و حذف نمی‌شود.")
                .set(&session)
                .await;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(see_other(&headers, "/admin/brands"))
}

// =============================================================================
// Categories
// =============================================================================

/// Category list with the create form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/categories/index.html")]
pub struct CategoriesTemplate {
    pub page: PageContext,
    pub categories: Vec<Category>,
    pub parent_options: Vec<FacetOption>,
    pub form: CategoryForm,
    pub errors: FieldErrors,
}

/// Category edit form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/categories/edit.html")]
pub struct CategoryEditTemplate {
    pub page: PageContext,
    pub category_id: CategoryId,
    pub parent_options: Vec<FacetOption>,
    pub form: CategoryForm,
    pub errors: FieldErrors,
}

/// Parent choices, leaving out the category being edited.
fn parent_options(
    categories: &[Category],
    editing: Option<CategoryId>,
    selected: &str,
) -> Vec<FacetOption> {
    categories
        .iter()
        .filter(|c| Some(c.id) != editing)
        .map(|c| FacetOption {
            value: c.id.to_string(),
            label: c.name.clone(),
            selected: c.id.to_string() == selected,
        })
        .collect()
}

/// List categories.
#[instrument(skip(state, page, _admin))]
pub async fn categories(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(CategoriesTemplate {
        page,
        parent_options: parent_options(&categories, None, ""),
        categories,
        form: CategoryForm::default(),
        errors: FieldErrors::new(),
    })
}

/// Create a category.
#[instrument(skip(state, page, session, headers, form), fields(admin_id = %admin.id))]
pub async fn create_category(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<CategoryForm>,
) -> Result<Response> {
    let repo = CategoryRepository::new(state.pool());
    let errors = match form.validate() {
        Ok(input) => match repo.create(&input).await {
            Ok(id) => {
                tracing::info!(category_id = %id, slug = %input.slug, "Category created");
                state.catalog().invalidate_all().await;
                Flash::success("دسته‌بندی اضافه شد.").set(&session).await;
                return Ok(see_other(&headers, "/admin/categories"));
            }
            Err(e) => {
                let mut errors = FieldErrors::new();
                slug_conflict(&mut errors, e)?;
                errors
            }
        },
        Err(errors) => errors,
    };

    let categories = repo.list().await?;
    Ok(CategoriesTemplate {
        page,
        parent_options: parent_options(&categories, None, &form.parent_id),
        categories,
        form,
        errors,
    }
    .into_response())
}

/// Category edit form.
#[instrument(skip(state, page, _admin))]
pub async fn edit_category(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let category_id = CategoryId::new(id);
    let categories = CategoryRepository::new(state.pool()).list().await?;
    let category = categories
        .iter()
        .find(|c| c.id == category_id)
        .ok_or_else(|| AppError::NotFound(format!("category {id}")))?;
    let form = CategoryForm::from(category);

    Ok(CategoryEditTemplate {
        page,
        category_id,
        parent_options: parent_options(&categories, Some(category_id), &form.parent_id),
        form,
        errors: FieldErrors::new(),
    })
}

/// Update a category.
#[instrument(skip(state, page, session, headers, form), fields(admin_id = %admin.id))]
pub async fn update_category(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Form(form): Form<CategoryForm>,
) -> Result<Response> {
    let category_id = CategoryId::new(id);
    let repo = CategoryRepository::new(state.pool());
    let mut errors = match form.validate() {
        Ok(input) if input.parent_id == Some(category_id) => {
            let mut errors = FieldErrors::new();
            errors.add("parent_id", "دسته‌بندی نمی‌تواند والد خودش باشد.");
            errors
        }
        Ok(input) => match repo.update(category_id, &input).await {
            Ok(()) => {
                tracing::info!(category_id = %category_id, "Category updated");
                state.catalog().invalidate_all().await;
                Flash::success("دسته‌بندی ذخیره شد.").set(&session).await;
                return Ok(see_other(&headers, "/admin/categories"));
            }
            Err(e) => {
                let mut errors = FieldErrors::new();
                slug_conflict(&mut errors, e)?;
                errors
            }
        },
        Err(errors) => errors,
    };
    if errors.is_empty() {
        errors.add("form", "فرم را بررسی کنید.");
    }

    let categories = repo.list().await?;
    Ok(CategoryEditTemplate {
        page,
        category_id,
        parent_options: parent_options(&categories, Some(category_id), &form.parent_id),
        form,
        errors,
    }
    .into_response())
}

/// Delete a category without products.
#[instrument(skip(state, session, headers), fields(admin_id = %admin.id))]
pub async fn delete_category(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response> {
    match CategoryRepository::new(state.pool())
        .delete(CategoryId::new(id))
        .await
    {
        Ok(()) => {
            tracing::info!(category_id = id, "Category deleted");
            state.catalog().invalidate_all().await;
            Flash::success("دسته‌بندی حذف شد.").set(&session).await;
        }
        Err(RepositoryError::Conflict(_)) => {
            Flash::error("این دسته‌بندی هنوز محصول دارد و حذف نمی‌شود.")
                .set(&session)
                .await;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(see_other(&headers, "/admin/categories"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i64, name: &str) -> Category {
        Category {
            id: CategoryId::new(id),
            slug: format!("c{id}"),
            name: name.to_string(),
            parent_id: None,
            position: 0,
        }
    }

    #[test]
    fn test_parent_options_skip_self_and_mark_selected() {
        let categories = vec![category(1, "موتور"), category(2, "گیربکس")];
        let options = parent_options(&categories, Some(CategoryId::new(1)), "2");
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].value, "2");
        assert!(options[0].selected);
    }
}
