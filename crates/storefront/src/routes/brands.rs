//! Brand and category route handlers.
//!
//! Brand and category pages are the product listing with one facet pinned.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, RawQuery, State},
    response::IntoResponse,
};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::PageContext;
use crate::models::catalog::{Brand, ProductFilter};
use crate::state::AppState;

use super::products::{Facets, render_listing};

/// Brand list template.
#[derive(Template, WebTemplate)]
#[template(path = "brands/index.html")]
pub struct BrandsTemplate {
    pub page: PageContext,
    pub brands: Vec<Brand>,
}

/// Display all brands.
#[instrument(skip(state, page))]
pub async fn index(State(state): State<AppState>, page: PageContext) -> Result<impl IntoResponse> {
    let brands = state.catalog().brands(state.pool()).await?;
    Ok(BrandsTemplate {
        page,
        brands: brands.as_ref().clone(),
    })
}

/// Display one brand's products.
#[instrument(skip(state, page))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    Path(slug): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse> {
    let brands = state.catalog().brands(state.pool()).await?;
    let brand = brands
        .iter()
        .find(|b| b.slug == slug)
        .ok_or_else(|| AppError::NotFound(format!("brand {slug}")))?;

    let mut filter = ProductFilter::from_query(query.as_deref().unwrap_or_default());
    filter.brands = vec![brand.slug.clone()];

    render_listing(
        &state,
        page,
        &filter,
        format!("روغن موتور {}", brand.name),
        brand.description.clone(),
        format!("/brands/{}", brand.slug),
        Facets {
            brands: false,
            categories: true,
        },
    )
    .await
}

/// Display one category's products, including its direct subcategories.
#[instrument(skip(state, page))]
pub async fn category(
    State(state): State<AppState>,
    page: PageContext,
    Path(slug): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse> {
    let categories = state.catalog().categories(state.pool()).await?;
    let category = categories
        .iter()
        .find(|c| c.slug == slug)
        .ok_or_else(|| AppError::NotFound(format!("category {slug}")))?;

    let mut filter = ProductFilter::from_query(query.as_deref().unwrap_or_default());
    filter.category = Some(category.slug.clone());

    render_listing(
        &state,
        page,
        &filter,
        category.name.clone(),
        String::new(),
        format!("/categories/{}", category.slug),
        Facets {
            brands: true,
            categories: false,
        },
    )
    .await
}
