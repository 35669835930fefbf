//! Back-office route handlers.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin),
//! which re-reads the role from the database on each request.
//!
//! # Route Structure
//!
//! ```text
//! GET  /admin                                  - Overview
//!
//! # Catalog
//! GET  /admin/products                         - Product list (search, paginated)
//! GET  /admin/products/new                     - New product form
//! POST /admin/products                         - Create product
//! GET  /admin/products/{id}/edit               - Edit form
//! POST /admin/products/{id}                    - Update product
//! POST /admin/products/{id}/delete             - Delete product
//! GET  /admin/brands, POST /admin/brands       - Brand list / create
//! GET  /admin/brands/{id}, POST /admin/brands/{id}
//! POST /admin/brands/{id}/delete
//! GET  /admin/categories, ...                  - Same shape as brands
//! GET  /admin/cars, POST /admin/cars           - Car list / create
//! GET  /admin/cars/{id}, POST /admin/cars/{id} - Car edit with its schedule
//! POST /admin/cars/{id}/delete
//! POST /admin/cars/{id}/tasks                  - Add maintenance task
//! POST /admin/cars/{id}/tasks/{task_id}        - Update task
//! POST /admin/cars/{id}/tasks/{task_id}/delete
//!
//! # Orders
//! GET  /admin/orders                           - List (status filter, search, paginated)
//! GET  /admin/orders/{id}                      - Detail
//! POST /admin/orders/{id}/status               - Status transition
//!
//! # Community
//! GET  /admin/questions                        - Moderation queue
//! POST /admin/questions/{target}/{id}/answer
//! POST /admin/questions/{target}/{id}/status
//! GET  /admin/reviews
//! POST /admin/reviews/{id}/approve, /admin/reviews/{id}/delete
//!
//! # Users
//! GET  /admin/users                            - List and search
//! POST /admin/users/{id}/role                  - Change role
//!
//! # Content
//! GET  /admin/banners, POST /admin/banners, GET|POST /admin/banners/{id}, POST .../delete
//! GET  /admin/gallery, POST /admin/gallery, POST /admin/gallery/{id}/delete
//! GET  /admin/blog, GET /admin/blog/new, POST /admin/blog
//! GET  /admin/blog/{id}, POST /admin/blog/{id}, POST /admin/blog/{id}/delete
//! POST /admin/uploads                          - Image upload (multipart, JSON reply)
//! ```

pub mod cars;
pub mod community;
pub mod content;
pub mod orders;
pub mod overview;
pub mod products;
pub mod taxonomy;
pub mod uploads;
pub mod users;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use serde::Deserialize;

use crate::db::RepositoryError;
use crate::error::{AppError, Result};
use crate::models::catalog::Pagination;
use crate::services::storage::MAX_UPLOAD_BYTES;
use crate::state::AppState;
use crate::validation::FieldErrors;

/// Rows per back-office list page.
pub const PAGE_SIZE: u32 = 25;

/// Create the back-office router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(overview::index))
        // Products
        .route("/products", get(products::index).post(products::create))
        .route("/products/new", get(products::new_form))
        .route("/products/{id}/edit", get(products::edit_form))
        .route("/products/{id}", post(products::update))
        .route("/products/{id}/delete", post(products::delete))
        // Brands and categories
        .route("/brands", get(taxonomy::brands).post(taxonomy::create_brand))
        .route(
            "/brands/{id}",
            get(taxonomy::edit_brand).post(taxonomy::update_brand),
        )
        .route("/brands/{id}/delete", post(taxonomy::delete_brand))
        .route(
            "/categories",
            get(taxonomy::categories).post(taxonomy::create_category),
        )
        .route(
            "/categories/{id}",
            get(taxonomy::edit_category).post(taxonomy::update_category),
        )
        .route("/categories/{id}/delete", post(taxonomy::delete_category))
        // Cars and schedules
        .route("/cars", get(cars::index).post(cars::create))
        .route("/cars/{id}", get(cars::edit).post(cars::update))
        .route("/cars/{id}/delete", post(cars::delete))
        .route("/cars/{id}/tasks", post(cars::create_task))
        .route("/cars/{id}/tasks/{task_id}", post(cars::update_task))
        .route("/cars/{id}/tasks/{task_id}/delete", post(cars::delete_task))
        // Orders
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::transition))
        // Community
        .route("/questions", get(community::questions))
        .route(
            "/questions/{target}/{id}/answer",
            post(community::answer_question),
        )
        .route(
            "/questions/{target}/{id}/status",
            post(community::set_question_status),
        )
        .route("/reviews", get(community::reviews))
        .route("/reviews/{id}/approve", post(community::approve_review))
        .route("/reviews/{id}/delete", post(community::delete_review))
        // Users
        .route("/users", get(users::index))
        .route("/users/{id}/role", post(users::set_role))
        // Content
        .route("/banners", get(content::banners).post(content::create_banner))
        .route(
            "/banners/{id}",
            get(content::edit_banner).post(content::update_banner),
        )
        .route("/banners/{id}/delete", post(content::delete_banner))
        .route("/gallery", get(content::gallery).post(content::add_gallery_image))
        .route("/gallery/{id}/delete", post(content::delete_gallery_image))
        .route("/blog", get(content::posts).post(content::create_post))
        .route("/blog/new", get(content::new_post))
        .route("/blog/{id}", get(content::edit_post).post(content::update_post))
        .route("/blog/{id}/delete", post(content::delete_post))
        .route(
            "/uploads",
            post(uploads::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024)),
        )
}

/// Search and page query shared by the back-office lists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
}

impl ListQuery {
    /// Trimmed search text, `None` when blank.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

/// `LIMIT`/`OFFSET` for a requested 1-based page.
#[must_use]
pub fn page_window(page: Option<u32>) -> (u32, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = i64::from(PAGE_SIZE);
    (page, limit, i64::from(page - 1) * limit)
}

/// Pagination for a list already fetched with [`page_window`].
#[must_use]
pub fn paginate(page: u32, total: i64) -> Pagination {
    Pagination::new(page, PAGE_SIZE, total)
}

/// Turn a unique-slug conflict into a field error on `slug`; other errors
/// pass through.
///
/// # Errors
///
/// Returns the original error when it is not a conflict.
pub fn slug_conflict(errors: &mut FieldErrors, e: RepositoryError) -> Result<()> {
    match e {
        RepositoryError::Conflict(_) => {
            errors.add("slug", "این نامک قبلاً استفاده شده است.");
            Ok(())
        }
        other => Err(AppError::Database(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(None), (1, 25, 0));
        assert_eq!(page_window(Some(0)), (1, 25, 0));
        assert_eq!(page_window(Some(3)), (3, 25, 50));
    }

    #[test]
    fn test_slug_conflict_becomes_field_error() {
        let mut errors = FieldErrors::new();
        assert!(slug_conflict(&mut errors, RepositoryError::Conflict("slug".into())).is_ok());
        assert!(errors.has("slug"));

        let mut errors = FieldErrors::new();
        assert!(slug_conflict(&mut errors, RepositoryError::NotFound).is_err());
        assert!(errors.is_empty());
    }
}
