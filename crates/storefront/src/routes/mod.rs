//! HTTP route handlers for the storefront and back-office.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                              - Home page
//!
//! # Catalog
//! GET  /products                      - Filtered, paginated listing
//! GET  /products/{slug}               - Product detail
//! POST /products/{slug}/questions     - Ask a question (auth)
//! POST /products/{slug}/reviews       - Submit a review (auth)
//! GET  /brands, /brands/{slug}        - Brand list / brand listing
//! GET  /categories/{slug}             - Category listing
//! GET  /cars, /cars/{slug}            - Car finder / compatible oils
//! POST /cars/{slug}/questions         - Ask about a car (auth)
//!
//! # Compare (HTMX fragments)
//! GET  /compare                       - Comparison board
//! POST /compare/add, /compare/remove  - Toggle a product
//!
//! # Cart (HTMX fragments)
//! GET  /cart                          - Cart page
//! POST /cart/add                      - Add to cart (triggers cart-updated)
//! POST /cart/update                   - Update quantity (returns cart_items fragment)
//! POST /cart/remove                   - Remove line (returns cart_items fragment)
//! GET  /cart/count                    - Cart count badge (fragment)
//!
//! # Checkout
//! GET  /checkout                      - Shipping form (auth)
//! POST /checkout                      - Place order, redirect to gateway
//! GET  /checkout/callback             - Gateway return
//!
//! # Auth
//! GET  /auth/login                    - Phone form
//! POST /auth/otp                      - Send code
//! GET  /auth/verify                   - Code form
//! POST /auth/verify                   - Verify code, sign in
//! POST /auth/logout                   - Sign out
//!
//! # Account (requires auth)
//! GET  /account                       - Profile
//! GET  /account/phone                 - Phone change
//! GET  /account/orders                - Order history
//! GET  /account/addresses             - Address book
//! GET  /account/garage                - Car notebook
//!
//! # Content
//! GET  /blog, /blog/{slug}, /gallery
//!
//! # API
//! POST /api/events                    - Engagement beacon (JSON)
//!
//! # Back-office (requires admin)
//! /admin/...
//! ```

pub mod account;
pub mod admin;
pub mod api;
pub mod auth;
pub mod brands;
pub mod cars;
pub mod cart;
pub mod checkout;
pub mod compare;
pub mod content;
pub mod garage;
pub mod home;
pub mod products;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};

use crate::filters;
use crate::middleware::{PageContext, api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
        .route("/{slug}/questions", post(products::ask_question))
        .route("/{slug}/reviews", post(products::submit_review))
}

/// Create the car routes router.
pub fn car_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cars::index))
        .route("/{slug}", get(cars::show))
        .route("/{slug}/questions", post(cars::ask_question))
}

/// Create the comparison routes router.
pub fn compare_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(compare::show))
        .route("/add", post(compare::add))
        .route("/remove", post(compare::remove))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show).post(checkout::place))
        .route("/callback", get(checkout::callback))
}

/// Create the auth routes router, rate limited per client IP.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page))
        .route("/otp", post(auth::send_code))
        .route("/verify", get(auth::verify_page).post(auth::verify))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter())
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::profile))
        .route("/profile", post(account::update_profile))
        .route("/phone", get(account::phone_page).post(account::send_phone_code))
        .route("/phone/verify", post(account::verify_phone))
        .route("/orders", get(account::orders))
        .route("/orders/{number}", get(account::order))
        .route("/orders/{number}/pay", post(account::pay_order))
        .route(
            "/addresses",
            get(account::addresses).post(account::create_address),
        )
        .route("/addresses/{id}/default", post(account::set_default_address))
        .route("/addresses/{id}/delete", post(account::delete_address))
        .route("/garage", get(garage::index).post(garage::add_car))
        .route("/garage/{id}/odometer", post(garage::update_odometer))
        .route("/garage/{id}/log", post(garage::log_service))
        .route("/garage/{id}/logs/{log_id}/delete", post(garage::delete_log))
        .route("/garage/{id}/delete", post(garage::remove_car))
}

/// Create the JSON API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(api::record_event))
        .layer(api_rate_limiter())
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .route("/brands", get(brands::index))
        .route("/brands/{slug}", get(brands::show))
        .route("/categories/{slug}", get(brands::category))
        .nest("/cars", car_routes())
        .nest("/compare", compare_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/auth", auth_routes())
        .nest("/account", account_routes())
        .route("/blog", get(content::blog_index))
        .route("/blog/{slug}", get(content::blog_post))
        .route("/gallery", get(content::gallery))
        .nest("/api", api_routes())
        .nest("/admin", admin::routes())
        .fallback(not_found)
}

/// 404 page template.
#[derive(Template, WebTemplate)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub page: PageContext,
}

/// Fallback for unknown paths.
pub async fn not_found(page: PageContext) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, NotFoundTemplate { page })
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Whether the request was issued by HTMX.
#[must_use]
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers.get("hx-request").is_some_and(|v| v == "true")
}

/// Redirect after a form action.
///
/// HTMX requests get an `HX-Redirect` header instead of a 303 so the browser
/// navigates the whole page.
#[must_use]
pub fn see_other(headers: &HeaderMap, to: &str) -> Response {
    if is_htmx(headers)
        && let Ok(value) = HeaderValue::from_str(to)
    {
        let mut response = StatusCode::NO_CONTENT.into_response();
        response.headers_mut().insert("hx-redirect", value);
        return response;
    }
    Redirect::to(to).into_response()
}

/// Accept a post-login destination only when it stays on this site.
#[must_use]
pub fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    let same_site = next.starts_with('/')
        && !next.starts_with("//")
        && !next.starts_with("/\\")
        && !next.contains(['\r', '\n']);
    same_site.then(|| next.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next_rejects_offsite() {
        assert_eq!(safe_next(Some("/account/orders")).as_deref(), Some("/account/orders"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(Some("/x\r\nSet-Cookie: a=b")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn test_htmx_redirect_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(see_other(&headers, "/cart").status(), StatusCode::SEE_OTHER);

        headers.insert("hx-request", HeaderValue::from_static("true"));
        let response = see_other(&headers, "/cart");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers().get("hx-redirect").unwrap(), "/cart");
    }
}
