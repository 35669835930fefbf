//! Database tests for cart merging and the order lifecycle.
//!
//! These tests require a migrated `PostgreSQL` database
//! (`STOREFRONT_DATABASE_URL`); no server is needed.
//!
//! Run with: cargo test -p roghan-integration-tests -- --ignored

use uuid::Uuid;

use roghan_core::{OrderStatus, Toman};
use roghan_integration_tests::{ProductSpec, create_product, create_user, pool, unique_phone};
use roghan_storefront::config::ShippingConfig;
use roghan_storefront::db::carts::{CartOwner, CartRepository};
use roghan_storefront::db::orders::{OrderRepository, PlaceOutcome};
use roghan_storefront::db::products::ProductRepository;
use roghan_storefront::models::cart::MAX_LINE_QUANTITY;
use roghan_storefront::models::user::AddressInput;

fn shipping() -> ShippingConfig {
    ShippingConfig {
        fee: Toman::new(80_000),
        free_threshold: Toman::new(5_000_000),
    }
}

fn address() -> AddressInput {
    AddressInput {
        recipient: "مریم احمدی".to_string(),
        phone: unique_phone(),
        province: "تهران".to_string(),
        city: "تهران".to_string(),
        line: "خیابان ولیعصر، پلاک ۱۲".to_string(),
        postal_code: "1234567890".to_string(),
        make_default: false,
    }
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_guest_cart_merges_into_user_cart_with_cap() {
    let pool = pool().await;
    let carts = CartRepository::new(&pool);
    let user_id = create_user(&pool).await;
    let (a, _) = create_product(&pool, ProductSpec::default()).await;
    let (b, _) = create_product(&pool, ProductSpec::default()).await;

    let user_cart = carts.get_or_create(CartOwner::User(user_id)).await.expect("user cart");
    carts.add(user_cart, a, MAX_LINE_QUANTITY - 1).await.expect("add a");

    let token = Uuid::new_v4();
    let guest_cart = carts.get_or_create(CartOwner::Guest(token)).await.expect("guest cart");
    carts.add(guest_cart, a, 5).await.expect("add a to guest");
    carts.add(guest_cart, b, 1).await.expect("add b to guest");

    let moved = carts.merge_guest(token, user_id).await.expect("merge");
    assert_eq!(moved, 2);
    assert!(carts.find(CartOwner::Guest(token)).await.expect("find").is_none());

    let lines = carts.lines(user_cart).await.expect("lines");
    let qty = |id| lines.iter().find(|l| l.product_id == id).map(|l| l.quantity);
    assert_eq!(qty(a), Some(MAX_LINE_QUANTITY));
    assert_eq!(qty(b), Some(1));

    // Merging a token with no cart is a no-op
    assert_eq!(carts.merge_guest(Uuid::new_v4(), user_id).await.expect("merge"), 0);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_place_order_snapshots_prices_and_empties_cart() {
    let pool = pool().await;
    let carts = CartRepository::new(&pool);
    let orders = OrderRepository::new(&pool);
    let user_id = create_user(&pool).await;
    let (id, _) = create_product(
        &pool,
        ProductSpec {
            price: 1_200_000,
            stock: 5,
            ..ProductSpec::default()
        },
    )
    .await;

    let cart = carts.get_or_create(CartOwner::User(user_id)).await.expect("cart");
    carts.add(cart, id, 2).await.expect("add");

    let outcome = orders
        .place_from_cart(cart, user_id, &address(), "", &shipping())
        .await
        .expect("place");
    let PlaceOutcome::Placed(order) = outcome else {
        panic!("expected a placed order, got {outcome:?}");
    };

    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert!(order.number.starts_with("RG"));
    assert_eq!(order.subtotal, Toman::new(2_400_000));
    assert_eq!(order.shipping, Toman::new(80_000));
    assert_eq!(order.total, Toman::new(2_480_000));
    assert!(carts.lines(cart).await.expect("lines").is_empty());

    let detail = orders.get(order.id).await.expect("detail");
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items.first().map(|i| i.quantity), Some(2));

    // Stock is untouched until payment is verified
    let product = ProductRepository::new(&pool).get(id).await.expect("product");
    assert_eq!(product.stock, 5);

    // An empty cart cannot be ordered again
    let again = orders
        .place_from_cart(cart, user_id, &address(), "", &shipping())
        .await
        .expect("place");
    assert!(matches!(again, PlaceOutcome::EmptyCart));
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_place_order_refuses_short_stock() {
    let pool = pool().await;
    let carts = CartRepository::new(&pool);
    let user_id = create_user(&pool).await;
    let (id, _) = create_product(
        &pool,
        ProductSpec {
            stock: 1,
            ..ProductSpec::default()
        },
    )
    .await;

    let cart = carts.get_or_create(CartOwner::User(user_id)).await.expect("cart");
    carts.add(cart, id, 3).await.expect("add");

    let outcome = OrderRepository::new(&pool)
        .place_from_cart(cart, user_id, &address(), "", &shipping())
        .await
        .expect("place");
    assert!(matches!(outcome, PlaceOutcome::Unavailable(names) if names.len() == 1));
    assert_eq!(carts.lines(cart).await.expect("lines").len(), 1);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_mark_paid_takes_stock_once() {
    let pool = pool().await;
    let carts = CartRepository::new(&pool);
    let orders = OrderRepository::new(&pool);
    let products = ProductRepository::new(&pool);
    let user_id = create_user(&pool).await;
    let (id, _) = create_product(
        &pool,
        ProductSpec {
            stock: 4,
            ..ProductSpec::default()
        },
    )
    .await;

    let cart = carts.get_or_create(CartOwner::User(user_id)).await.expect("cart");
    carts.add(cart, id, 3).await.expect("add");
    let PlaceOutcome::Placed(order) = orders
        .place_from_cart(cart, user_id, &address(), "", &shipping())
        .await
        .expect("place")
    else {
        panic!("expected a placed order");
    };

    assert!(orders.mark_paid(order.id, "REF-1", Some("6037****1234")).await.expect("paid"));
    assert_eq!(products.get(id).await.expect("product").stock, 1);

    // A replayed callback changes nothing
    assert!(!orders.mark_paid(order.id, "REF-1", None).await.expect("replay"));
    assert_eq!(products.get(id).await.expect("product").stock, 1);

    let detail = orders.get(order.id).await.expect("detail");
    assert_eq!(detail.order.status, OrderStatus::Paid);
    assert_eq!(detail.order.payment_ref_id.as_deref(), Some("REF-1"));
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_transition_guards_against_concurrent_change() {
    let pool = pool().await;
    let carts = CartRepository::new(&pool);
    let orders = OrderRepository::new(&pool);
    let user_id = create_user(&pool).await;
    let (id, _) = create_product(&pool, ProductSpec::default()).await;

    let cart = carts.get_or_create(CartOwner::User(user_id)).await.expect("cart");
    carts.add(cart, id, 1).await.expect("add");
    let PlaceOutcome::Placed(order) = orders
        .place_from_cart(cart, user_id, &address(), "", &shipping())
        .await
        .expect("place")
    else {
        panic!("expected a placed order");
    };

    assert!(orders.mark_failed(order.id).await.expect("failed"));
    orders
        .transition(order.id, OrderStatus::PaymentFailed, OrderStatus::Cancelled)
        .await
        .expect("cancel");

    // A second admin working from a stale page
    let stale = orders
        .transition(order.id, OrderStatus::PaymentFailed, OrderStatus::Cancelled)
        .await;
    assert!(stale.is_err());
}
