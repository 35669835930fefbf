//! HTTP tests for the guest cart and the comparison board.
//!
//! These tests require a running storefront and its database.
//!
//! Run with: cargo test -p roghan-integration-tests -- --ignored

use reqwest::StatusCode;

use roghan_integration_tests::{ProductSpec, client, create_product, pool, storefront_base_url};

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_guest_cart_add_update_remove() {
    let pool = pool().await;
    let (id, _) = create_product(&pool, ProductSpec::default()).await;
    let product_id = id.to_string();
    let base_url = storefront_base_url();
    let client = client();

    let resp = client
        .post(format!("{base_url}/cart/add"))
        .header("HX-Request", "true")
        .form(&[("product_id", product_id.as_str()), ("quantity", "2")])
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["hx-trigger"], "cart-updated");

    let count = client
        .get(format!("{base_url}/cart/count"))
        .send()
        .await
        .expect("Failed to get cart count")
        .text()
        .await
        .expect("Failed to read body");
    assert!(count.contains('2'), "{count}");

    // Quantities above the line cap are clamped, not rejected
    let resp = client
        .post(format!("{base_url}/cart/update"))
        .header("HX-Request", "true")
        .form(&[("product_id", product_id.as_str()), ("quantity", "500")])
        .send()
        .await
        .expect("Failed to update cart");
    assert_eq!(resp.status(), StatusCode::OK);
    let fragment = resp.text().await.expect("Failed to read body");
    assert!(fragment.contains("cart-items"));

    let resp = client
        .post(format!("{base_url}/cart/remove"))
        .header("HX-Request", "true")
        .form(&[("product_id", product_id.as_str())])
        .send()
        .await
        .expect("Failed to remove from cart");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_cart_rejects_inactive_product() {
    let pool = pool().await;
    let (id, _) = create_product(
        &pool,
        ProductSpec {
            is_active: false,
            ..ProductSpec::default()
        },
    )
    .await;

    let resp = client()
        .post(format!("{}/cart/add", storefront_base_url()))
        .header("HX-Request", "true")
        .form(&[("product_id", id.to_string())])
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_compare_board_holds_four_products() {
    let pool = pool().await;
    let base_url = storefront_base_url();
    let client = client();

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(create_product(&pool, ProductSpec::default()).await.0);
    }

    for (i, id) in ids.iter().enumerate() {
        let body = client
            .post(format!("{base_url}/compare/add"))
            .header("HX-Request", "true")
            .form(&[("product_id", id.to_string())])
            .send()
            .await
            .expect("Failed to add to compare")
            .text()
            .await
            .expect("Failed to read body");
        assert_eq!(body.contains("compare-full"), i == 4, "product #{i}");
    }

    let board = client
        .get(format!("{base_url}/compare"))
        .send()
        .await
        .expect("Failed to get compare board")
        .text()
        .await
        .expect("Failed to read body");
    for id in ids.iter().take(4) {
        assert!(board.contains(&format!("value=\"{id}\"")));
    }
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_compare_rejects_unknown_and_inactive_products() {
    let pool = pool().await;
    let (inactive, _) = create_product(
        &pool,
        ProductSpec {
            is_active: false,
            ..ProductSpec::default()
        },
    )
    .await;
    let base_url = storefront_base_url();
    let client = client();

    for product_id in [i64::MAX.to_string(), inactive.to_string()] {
        let resp = client
            .post(format!("{base_url}/compare/add"))
            .header("HX-Request", "true")
            .form(&[("product_id", product_id.as_str())])
            .send()
            .await
            .expect("Failed to post compare add");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "product {product_id}");
    }

    // Refused products never take a slot: four real ones still fit
    for _ in 0..4 {
        let (id, _) = create_product(&pool, ProductSpec::default()).await;
        let resp = client
            .post(format!("{base_url}/compare/add"))
            .header("HX-Request", "true")
            .form(&[("product_id", id.to_string().as_str())])
            .send()
            .await
            .expect("Failed to post compare add");
        assert_eq!(resp.status(), StatusCode::OK);
        let fragment = resp.text().await.expect("Failed to read body");
        assert!(!fragment.contains("compare-full"), "{fragment}");
    }
}
