//! Integration tests for Roghan.
//!
//! # Running Tests
//!
//! ```bash
//! # Database-backed repository tests (migrated database required)
//! STOREFRONT_DATABASE_URL=postgres://... cargo test -p roghan-integration-tests -- --ignored
//!
//! # HTTP tests additionally need a running storefront
//! cargo run -p roghan-storefront &
//! STOREFRONT_BASE_URL=http://localhost:3000 cargo test -p roghan-integration-tests -- --ignored
//! ```
//!
//! Every test creates its own rows with unique slugs and phone numbers, so
//! runs do not interfere with each other or with seeded data.

use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

use roghan_core::{PhoneNumber, ProductId, Slug, Toman, UserId};
use roghan_storefront::db::brands::BrandRepository;
use roghan_storefront::db::categories::CategoryRepository;
use roghan_storefront::db::products::ProductRepository;
use roghan_storefront::db::users::UserRepository;
use roghan_storefront::models::catalog::{BrandInput, CategoryInput, ProductInput};

/// Base URL of the storefront under test.
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A client that keeps cookies (so the guest session sticks) and does not
/// follow redirects, so tests can assert on `Location`.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// Connect to the database the storefront under test uses.
///
/// # Panics
///
/// Panics if no database URL is configured or the database is unreachable.
pub async fn pool() -> PgPool {
    dotenvy::dotenv().ok();
    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("STOREFRONT_DATABASE_URL or DATABASE_URL must be set");
    roghan_storefront::db::create_pool(&SecretString::from(url))
        .await
        .expect("Failed to connect to test database")
}

/// A short random suffix for slugs.
#[must_use]
pub fn unique_suffix() -> String {
    Uuid::new_v4().simple().to_string().chars().take(10).collect()
}

/// A random valid mobile number in the 0990 range.
///
/// # Panics
///
/// Panics if the generated number is rejected, which would be a bug here.
#[must_use]
pub fn unique_phone() -> PhoneNumber {
    let digits = Uuid::new_v4().as_u128() % 10_000_000;
    PhoneNumber::parse(&format!("0990{digits:07}")).expect("generated phone is valid")
}

/// A freshly created customer account.
///
/// # Panics
///
/// Panics if the insert fails.
pub async fn create_user(pool: &PgPool) -> UserId {
    let (user, created) = UserRepository::new(pool)
        .find_or_create_verified(&unique_phone())
        .await
        .expect("Failed to create user");
    assert!(created);
    user.id
}

/// Product attributes a test cares about; the rest get defaults.
#[derive(Debug, Clone)]
pub struct ProductSpec {
    pub price: i64,
    pub stock: i32,
    pub viscosity: &'static str,
    pub is_active: bool,
}

impl Default for ProductSpec {
    fn default() -> Self {
        Self {
            price: 1_500_000,
            stock: 10,
            viscosity: "10W-40",
            is_active: true,
        }
    }
}

/// Create a product under a throwaway brand and category.
///
/// # Panics
///
/// Panics if an insert fails.
pub async fn create_product(pool: &PgPool, spec: ProductSpec) -> (ProductId, String) {
    let suffix = unique_suffix();
    let slug = |prefix: &str| Slug::parse(&format!("{prefix}-{suffix}")).expect("valid slug");

    let brand_id = BrandRepository::new(pool)
        .create(&BrandInput {
            name: format!("Test Brand {suffix}"),
            slug: slug("brand"),
            description: String::new(),
            logo_url: None,
        })
        .await
        .expect("Failed to create brand");

    let category_id = CategoryRepository::new(pool)
        .create(&CategoryInput {
            name: format!("Test Category {suffix}"),
            slug: slug("category"),
            parent_id: None,
            position: 0,
        })
        .await
        .expect("Failed to create category");

    let product_slug = slug("oil");
    let id = ProductRepository::new(pool)
        .create(&ProductInput {
            name: format!("Test Oil {suffix}"),
            slug: product_slug.clone(),
            brand_id,
            category_id,
            description: "Integration test product".to_string(),
            viscosity: spec.viscosity.to_string(),
            api_grade: "SN".to_string(),
            acea_grade: String::new(),
            oil_type: "سنتتیک".to_string(),
            volume_liters: Decimal::from(4),
            price: Toman::new(spec.price),
            compare_at: None,
            stock: spec.stock,
            image_url: None,
            is_active: spec.is_active,
            car_ids: Vec::new(),
        })
        .await
        .expect("Failed to create product");

    (id, product_slug.as_str().to_string())
}
