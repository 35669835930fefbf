//! HTTP tests for the engagement beacon.
//!
//! Run with: cargo test -p roghan-integration-tests -- --ignored

use reqwest::StatusCode;
use serde_json::{Value, json};

use roghan_integration_tests::{client, storefront_base_url};

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_banner_click_is_accepted() {
    let resp = client()
        .post(format!("{}/api/events", storefront_base_url()))
        .json(&json!({ "kind": "banner_click" }))
        .send()
        .await
        .expect("Failed to post event");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_server_recorded_kinds_are_rejected() {
    let resp = client()
        .post(format!("{}/api/events", storefront_base_url()))
        .json(&json!({ "kind": "checkout_start" }))
        .send()
        .await
        .expect("Failed to post event");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = resp.json().await.expect("Failed to parse JSON");
    assert!(body["error"].is_string());
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_unknown_kind_is_a_client_error() {
    let resp = client()
        .post(format!("{}/api/events", storefront_base_url()))
        .json(&json!({ "kind": "page_scroll" }))
        .send()
        .await
        .expect("Failed to post event");
    assert!(resp.status().is_client_error());
}
