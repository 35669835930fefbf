//! HTTP tests for public pages, redirects and response headers.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (roghan-cli migrate)
//! - The storefront running (cargo run -p roghan-storefront)
//!
//! Run with: cargo test -p roghan-integration-tests -- --ignored

use reqwest::StatusCode;

use roghan_integration_tests::{ProductSpec, client, create_product, pool, storefront_base_url};

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_health_endpoints() {
    let base_url = storefront_base_url();
    let client = client();

    let resp = client
        .get(format!("{base_url}/health"))
        .send()
        .await
        .expect("Failed to call /health");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("body"), "ok");

    let resp = client
        .get(format!("{base_url}/health/ready"))
        .send()
        .await
        .expect("Failed to call /health/ready");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_home_page_has_security_headers_and_request_id() {
    let resp = client()
        .get(storefront_base_url())
        .send()
        .await
        .expect("Failed to get home page");

    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(headers.contains_key("content-security-policy"));
    assert!(headers.contains_key("x-request-id"));

    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("dir=\"rtl\""));
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_product_page_and_filtered_listing() {
    let pool = pool().await;
    let (_, slug) = create_product(
        &pool,
        ProductSpec {
            viscosity: "5W-30",
            ..ProductSpec::default()
        },
    )
    .await;
    let base_url = storefront_base_url();
    let client = client();

    let resp = client
        .get(format!("{base_url}/products/{slug}"))
        .send()
        .await
        .expect("Failed to get product page");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("5W-30"));
    assert!(body.contains("/cart/add"));

    // Viscosity filter ignores the dash the customer may or may not type
    let resp = client
        .get(format!("{base_url}/products?viscosity=5w30&q={slug}"))
        .send()
        .await
        .expect("Failed to get filtered listing");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{base_url}/products?sort=price_asc&min_price=abc&page=999"))
        .send()
        .await
        .expect("Failed to get listing with junk parameters");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_inactive_product_is_not_found() {
    let pool = pool().await;
    let (_, slug) = create_product(
        &pool,
        ProductSpec {
            is_active: false,
            ..ProductSpec::default()
        },
    )
    .await;

    let resp = client()
        .get(format!("{}/products/{slug}", storefront_base_url()))
        .send()
        .await
        .expect("Failed to get product page");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_unknown_path_renders_not_found_page() {
    let resp = client()
        .get(format!("{}/no-such-page", storefront_base_url()))
        .send()
        .await
        .expect("Failed to get unknown path");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .expect("content-type")
            .starts_with("text/html")
    );
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_protected_pages_redirect_to_login() {
    let base_url = storefront_base_url();
    let client = client();

    for path in ["/account", "/account/garage", "/checkout", "/admin"] {
        let resp = client
            .get(format!("{base_url}{path}"))
            .send()
            .await
            .expect("Failed to get protected page");
        assert!(resp.status().is_redirection(), "{path}: {}", resp.status());
        let location = resp.headers()["location"].to_str().expect("location");
        assert!(location.starts_with("/auth/login"), "{path} -> {location}");
    }
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_htmx_request_to_protected_page_gets_hx_redirect() {
    let resp = client()
        .post(format!("{}/account/garage", storefront_base_url()))
        .header("HX-Request", "true")
        .form(&[("car_id", "1")])
        .send()
        .await
        .expect("Failed to post to garage");

    assert!(resp.headers().contains_key("hx-redirect"));
}
