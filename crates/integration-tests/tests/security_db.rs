//! Database tests for OTP requests, rate-limit buckets, default addresses
//! and guest cart cleanup.
//!
//! These tests require a migrated `PostgreSQL` database
//! (`STOREFRONT_DATABASE_URL`); no server is needed.
//!
//! Run with: cargo test -p roghan-integration-tests -- --ignored

use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use roghan_core::OtpPurpose;
use roghan_integration_tests::{create_user, pool, unique_phone, unique_suffix};
use roghan_storefront::db::addresses::AddressRepository;
use roghan_storefront::db::carts::{CartOwner, CartRepository};
use roghan_storefront::db::otp::OtpRepository;
use roghan_storefront::db::rate_limits::RateLimitRepository;
use roghan_storefront::models::user::AddressInput;
use roghan_storefront::services::otp::{CODE_TTL_SECS, MAX_ATTEMPTS, RESEND_WINDOW_SECS};

fn address(recipient: &str, make_default: bool) -> AddressInput {
    AddressInput {
        recipient: recipient.to_string(),
        phone: unique_phone(),
        province: "اصفهان".to_string(),
        city: "اصفهان".to_string(),
        line: "خیابان چهارباغ، پلاک ۸".to_string(),
        postal_code: "8134567890".to_string(),
        make_default,
    }
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_otp_resend_window_is_enforced_in_sql() {
    let pool = pool().await;
    let otp = OtpRepository::new(&pool);
    let phone = unique_phone();

    let first = otp
        .upsert_if_resendable(&phone, OtpPurpose::Login, "hash-1", CODE_TTL_SECS, RESEND_WINDOW_SECS)
        .await
        .expect("first send");
    let id = first.expect("first code is stored");

    let again = otp
        .upsert_if_resendable(&phone, OtpPurpose::Login, "hash-2", CODE_TTL_SECS, RESEND_WINDOW_SECS)
        .await
        .expect("second send");
    assert_eq!(again, None, "a second code inside the window must be refused");
    let stored = otp.find(&phone, OtpPurpose::Login).await.expect("find").expect("row");
    assert_eq!(stored.code_hash, "hash-1");

    // Another purpose is an independent row
    assert!(
        otp.upsert_if_resendable(&phone, OtpPurpose::ChangePhone, "hash-x", CODE_TTL_SECS, RESEND_WINDOW_SECS)
            .await
            .expect("change-phone send")
            .is_some()
    );

    // Once the window has passed, a new code replaces the old one
    sqlx::query("UPDATE shop.otp_request SET last_sent_at = NOW() - INTERVAL '61 seconds' WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .expect("backdate");
    let replaced = otp
        .upsert_if_resendable(&phone, OtpPurpose::Login, "hash-3", CODE_TTL_SECS, RESEND_WINDOW_SECS)
        .await
        .expect("resend");
    assert_eq!(replaced, Some(id), "the row is reused, never duplicated");
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_otp_consumed_code_allows_resend_and_resets_attempts() {
    let pool = pool().await;
    let otp = OtpRepository::new(&pool);
    let phone = unique_phone();

    let id = otp
        .upsert_if_resendable(&phone, OtpPurpose::Login, "hash-1", CODE_TTL_SECS, RESEND_WINDOW_SECS)
        .await
        .expect("send")
        .expect("stored");
    assert_eq!(otp.record_attempt(id, MAX_ATTEMPTS).await.expect("attempt"), Some(1));
    assert_eq!(otp.record_attempt(id, MAX_ATTEMPTS).await.expect("attempt"), Some(2));
    assert!(otp.consume(id).await.expect("consume"));
    assert!(!otp.consume(id).await.expect("consume twice"));

    // No attempts count against a consumed code
    assert_eq!(otp.record_attempt(id, MAX_ATTEMPTS).await.expect("attempt"), None);

    // Inside the window, but the previous code was used
    let fresh = otp
        .upsert_if_resendable(&phone, OtpPurpose::Login, "hash-2", CODE_TTL_SECS, RESEND_WINDOW_SECS)
        .await
        .expect("resend");
    assert_eq!(fresh, Some(id));

    let stored = otp.find(&phone, OtpPurpose::Login).await.expect("find").expect("row");
    assert_eq!(stored.attempts, 0);
    assert_eq!(stored.consumed_at, None);
    assert_eq!(stored.code_hash, "hash-2");
    assert!(stored.expires_at > Utc::now());
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_otp_attempts_stop_at_cap() {
    let pool = pool().await;
    let otp = OtpRepository::new(&pool);
    let phone = unique_phone();

    let id = otp
        .upsert_if_resendable(&phone, OtpPurpose::Login, "hash", CODE_TTL_SECS, RESEND_WINDOW_SECS)
        .await
        .expect("send")
        .expect("stored");

    for expected in 1..=MAX_ATTEMPTS {
        assert_eq!(
            otp.record_attempt(id, MAX_ATTEMPTS).await.expect("attempt"),
            Some(expected)
        );
    }
    assert_eq!(otp.record_attempt(id, MAX_ATTEMPTS).await.expect("attempt"), None);

    let stored = otp.find(&phone, OtpPurpose::Login).await.expect("find").expect("row");
    assert_eq!(stored.attempts, MAX_ATTEMPTS);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_rate_limit_counts_per_key_and_bucket() {
    let pool = pool().await;
    let limits = RateLimitRepository::new(&pool);
    let key = format!("test:{}", unique_suffix());
    let other_key = format!("test:{}", unique_suffix());
    // Far in the future so the opportunistic purge never removes it mid-test
    let bucket = Utc.with_ymd_and_hms(2099, 1, 1, 10, 0, 0).single().expect("valid time");
    let next_bucket = bucket + Duration::minutes(10);

    assert_eq!(limits.hit(&key, bucket).await.expect("hit"), 1);
    assert_eq!(limits.hit(&key, bucket).await.expect("hit"), 2);
    assert_eq!(limits.hit(&key, bucket).await.expect("hit"), 3);

    assert_eq!(limits.hit(&key, next_bucket).await.expect("hit"), 1);
    assert_eq!(limits.hit(&other_key, bucket).await.expect("hit"), 1);
    assert_eq!(limits.hit(&key, bucket).await.expect("hit"), 4);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_exactly_one_default_address() {
    let pool = pool().await;
    let addresses = AddressRepository::new(&pool);
    let user_id = create_user(&pool).await;

    let first = addresses.create(user_id, &address("اول", false)).await.expect("first");
    assert!(first.is_default, "the first address becomes the default");

    let second = addresses.create(user_id, &address("دوم", false)).await.expect("second");
    assert!(!second.is_default);

    let third = addresses.create(user_id, &address("سوم", true)).await.expect("third");
    assert!(third.is_default);

    let defaults = |list: &[roghan_storefront::models::user::Address]| {
        list.iter().filter(|a| a.is_default).map(|a| a.id).collect::<Vec<_>>()
    };
    let list = addresses.list_for_user(user_id).await.expect("list");
    assert_eq!(defaults(&list), vec![third.id]);

    addresses.set_default(user_id, second.id).await.expect("set default");
    let list = addresses.list_for_user(user_id).await.expect("list");
    assert_eq!(defaults(&list), vec![second.id]);

    // Someone else's address is not found and the default stays put
    let stranger = create_user(&pool).await;
    assert!(addresses.set_default(stranger, first.id).await.is_err());
    let list = addresses.list_for_user(user_id).await.expect("list");
    assert_eq!(defaults(&list), vec![second.id]);

    // Deleting the default promotes the newest remaining address
    addresses.delete(user_id, second.id).await.expect("delete");
    let list = addresses.list_for_user(user_id).await.expect("list");
    assert_eq!(defaults(&list), vec![third.id]);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_purge_removes_only_stale_guest_carts() {
    let pool = pool().await;
    let carts = CartRepository::new(&pool);
    let user_id = create_user(&pool).await;

    let stale_token = Uuid::new_v4();
    let stale = carts.get_or_create(CartOwner::Guest(stale_token)).await.expect("stale cart");
    let fresh_token = Uuid::new_v4();
    carts.get_or_create(CartOwner::Guest(fresh_token)).await.expect("fresh cart");
    let user_cart = carts.get_or_create(CartOwner::User(user_id)).await.expect("user cart");

    sqlx::query("UPDATE shop.cart SET updated_at = NOW() - INTERVAL '40 days' WHERE id = ANY($1)")
        .bind(vec![stale.as_i64(), user_cart.as_i64()])
        .execute(&pool)
        .await
        .expect("backdate");

    let purged = carts.purge_stale_guests(30).await.expect("purge");
    assert!(purged >= 1);

    assert!(carts.find(CartOwner::Guest(stale_token)).await.expect("find").is_none());
    assert!(carts.find(CartOwner::Guest(fresh_token)).await.expect("find").is_some());
    assert_eq!(
        carts.find(CartOwner::User(user_id)).await.expect("find"),
        Some(user_cart),
        "user carts are never purged"
    );
}
