//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::CatalogCache;
use crate::config::StorefrontConfig;
use crate::services::{
    CaptchaError, CaptchaVerifier, PaymentClient, PaymentError, SmsClient, SmsError, Storage,
    StorageError,
};

/// Error building the shared clients from configuration.
#[derive(Debug, thiserror::Error)]
pub enum AppStateInitError {
    #[error("sms client: {0}")]
    Sms(#[from] SmsError),
    #[error("payment client: {0}")]
    Payment(#[from] PaymentError),
    #[error("captcha verifier: {0}")]
    Captcha(#[from] CaptchaError),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections, outbound API clients and
/// configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    sms: SmsClient,
    payment: PaymentClient,
    captcha: CaptchaVerifier,
    storage: Storage,
    catalog: CatalogCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built or the storage
    /// backend is misconfigured.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, AppStateInitError> {
        let sms = SmsClient::new(&config.sms)?;
        let payment = PaymentClient::new(&config.payment)?;
        let captcha = CaptchaVerifier::new(config.captcha.as_ref())?;
        let storage = Storage::new(&config.storage)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                sms,
                payment,
                captcha,
                storage,
                catalog: CatalogCache::new(),
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// OTP delivery client.
    #[must_use]
    pub fn sms(&self) -> &SmsClient {
        &self.inner.sms
    }

    /// Payment gateway client.
    #[must_use]
    pub fn payment(&self) -> &PaymentClient {
        &self.inner.payment
    }

    /// Captcha verifier (a no-op when Turnstile is not configured).
    #[must_use]
    pub fn captcha(&self) -> &CaptchaVerifier {
        &self.inner.captcha
    }

    /// Upload storage.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.inner.storage
    }

    /// Catalog and home page cache.
    #[must_use]
    pub fn catalog(&self) -> &CatalogCache {
        &self.inner.catalog
    }
}
