//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront (used for the payment callback)
//! - `STOREFRONT_SESSION_SECRET` - Session/OTP signing secret (min 32 chars, high entropy)
//! - `ZARINPAL_MERCHANT_ID` - Payment gateway merchant ID
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `SMS_PROVIDER` - `log` (default), `kavenegar` or `smsir`
//! - `KAVENEGAR_API_KEY`, `KAVENEGAR_TEMPLATE` - required when `SMS_PROVIDER=kavenegar`
//! - `SMSIR_API_KEY`, `SMSIR_TEMPLATE_ID` - required when `SMS_PROVIDER=smsir`
//! - `ZARINPAL_SANDBOX` - `true` to use the sandbox gateway
//! - `TURNSTILE_SITE_KEY`, `TURNSTILE_SECRET_KEY` - captcha on the login form
//! - `STORAGE_BACKEND` - `local` (default) or `s3`
//! - `STORAGE_LOCAL_DIR` - upload directory for `local` (default: uploads)
//! - `S3_ENDPOINT`, `S3_BUCKET`, `S3_REGION`, `S3_ACCESS_KEY`, `S3_SECRET_KEY`, `S3_PUBLIC_URL`
//! - `SHIPPING_FEE_TOMAN` - flat shipping fee (default: 90000)
//! - `FREE_SHIPPING_THRESHOLD_TOMAN` - subtotal for free shipping (default: 2000000)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - error tracking

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use roghan_core::Toman;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront, without trailing slash
    pub base_url: String,
    /// Session signing secret, also the OTP hashing key
    pub session_secret: SecretString,
    /// SMS delivery provider
    pub sms: SmsConfig,
    /// Payment gateway
    pub payment: PaymentConfig,
    /// Captcha verification (disabled when `None`)
    pub captcha: Option<CaptchaConfig>,
    /// Uploaded file storage
    pub storage: StorageConfig,
    /// Shipping pricing
    pub shipping: ShippingConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Which SMS provider delivers OTP codes.
///
/// Implements `Debug` manually to redact API keys.
#[derive(Clone)]
pub enum SmsConfig {
    /// Write codes to the log instead of sending them (development).
    Log,
    /// Kavenegar `verify/lookup` API.
    Kavenegar {
        api_key: SecretString,
        template: String,
    },
    /// SMS.ir `send/verify` API.
    SmsIr {
        api_key: SecretString,
        template_id: i64,
    },
}

impl std::fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Log => f.write_str("Log"),
            Self::Kavenegar { template, .. } => f
                .debug_struct("Kavenegar")
                .field("api_key", &"[REDACTED]")
                .field("template", template)
                .finish(),
            Self::SmsIr { template_id, .. } => f
                .debug_struct("SmsIr")
                .field("api_key", &"[REDACTED]")
                .field("template_id", template_id)
                .finish(),
        }
    }
}

/// Payment gateway configuration (`ZarinPal`).
#[derive(Clone)]
pub struct PaymentConfig {
    /// Merchant ID issued by the gateway
    pub merchant_id: SecretString,
    /// Use the sandbox hosts
    pub sandbox: bool,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("merchant_id", &"[REDACTED]")
            .field("sandbox", &self.sandbox)
            .finish()
    }
}

/// Cloudflare Turnstile configuration.
#[derive(Clone)]
pub struct CaptchaConfig {
    /// Public site key rendered into the login form
    pub site_key: String,
    /// Server-side verification secret
    pub secret_key: SecretString,
}

impl std::fmt::Debug for CaptchaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptchaConfig")
            .field("site_key", &self.site_key)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Where uploaded images go.
#[derive(Clone)]
pub enum StorageConfig {
    /// Local directory, served under `/uploads`.
    Local { dir: PathBuf },
    /// S3-compatible object storage.
    S3(S3Config),
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { dir } => f.debug_struct("Local").field("dir", dir).finish(),
            Self::S3(s3) => f
                .debug_struct("S3")
                .field("endpoint", &s3.endpoint)
                .field("bucket", &s3.bucket)
                .field("region", &s3.region)
                .field("access_key", &s3.access_key)
                .field("secret_key", &"[REDACTED]")
                .field("public_url", &s3.public_url)
                .finish(),
        }
    }
}

/// S3-compatible object storage settings.
#[derive(Clone)]
pub struct S3Config {
    /// Endpoint URL, e.g. `https://s3.ir-thr-at1.arvanstorage.ir`
    pub endpoint: String,
    /// Bucket name (path-style addressing)
    pub bucket: String,
    /// Signing region
    pub region: String,
    /// Access key ID
    pub access_key: String,
    /// Secret access key
    pub secret_key: SecretString,
    /// Public URL prefix objects are served from
    pub public_url: String,
}

/// Flat-rate shipping.
#[derive(Debug, Clone, Copy)]
pub struct ShippingConfig {
    /// Fee charged below the threshold
    pub fee: Toman,
    /// Subtotal at or above which shipping is free
    pub free_threshold: Toman,
}

impl ShippingConfig {
    /// Shipping cost for a given cart subtotal.
    #[must_use]
    pub fn fee_for(&self, subtotal: Toman) -> Toman {
        if subtotal >= self.free_threshold || subtotal == Toman::ZERO {
            Toman::ZERO
        } else {
            self.fee
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?
            .trim_end_matches('/')
            .to_owned();
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            sms: SmsConfig::from_env()?,
            payment: PaymentConfig::from_env()?,
            captcha: CaptchaConfig::from_env(),
            storage: StorageConfig::from_env()?,
            shipping: ShippingConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Absolute URL for a path on this site.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl SmsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        match get_env_or_default("SMS_PROVIDER", "log").as_str() {
            "log" => Ok(Self::Log),
            "kavenegar" => Ok(Self::Kavenegar {
                api_key: get_required_secret("KAVENEGAR_API_KEY")?,
                template: get_required_env("KAVENEGAR_TEMPLATE")?,
            }),
            "smsir" => Ok(Self::SmsIr {
                api_key: get_required_secret("SMSIR_API_KEY")?,
                template_id: get_required_env("SMSIR_TEMPLATE_ID")?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        ConfigError::InvalidEnvVar("SMSIR_TEMPLATE_ID".to_string(), e.to_string())
                    })?,
            }),
            other => Err(ConfigError::InvalidEnvVar(
                "SMS_PROVIDER".to_string(),
                format!("unknown provider '{other}' (expected log, kavenegar or smsir)"),
            )),
        }
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            merchant_id: get_required_secret("ZARINPAL_MERCHANT_ID")?,
            sandbox: parse_env("ZARINPAL_SANDBOX", "false")?,
        })
    }
}

impl CaptchaConfig {
    fn from_env() -> Option<Self> {
        let site_key = get_optional_env("TURNSTILE_SITE_KEY")?;
        let secret_key = get_optional_env("TURNSTILE_SECRET_KEY")?;
        Some(Self {
            site_key,
            secret_key: SecretString::from(secret_key),
        })
    }
}

impl StorageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        match get_env_or_default("STORAGE_BACKEND", "local").as_str() {
            "local" => Ok(Self::Local {
                dir: PathBuf::from(get_env_or_default("STORAGE_LOCAL_DIR", "uploads")),
            }),
            "s3" => Ok(Self::S3(S3Config {
                endpoint: get_required_env("S3_ENDPOINT")?
                    .trim_end_matches('/')
                    .to_owned(),
                bucket: get_required_env("S3_BUCKET")?,
                region: get_env_or_default("S3_REGION", "us-east-1"),
                access_key: get_required_env("S3_ACCESS_KEY")?,
                secret_key: get_required_secret("S3_SECRET_KEY")?,
                public_url: get_required_env("S3_PUBLIC_URL")?
                    .trim_end_matches('/')
                    .to_owned(),
            })),
            other => Err(ConfigError::InvalidEnvVar(
                "STORAGE_BACKEND".to_string(),
                format!("unknown backend '{other}' (expected local or s3)"),
            )),
        }
    }
}

impl ShippingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            fee: Toman::new(parse_env("SHIPPING_FEE_TOMAN", "90000")?),
            free_threshold: Toman::new(parse_env("FREE_SHIPPING_THRESHOLD_TOMAN", "2000000")?),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// A complete configuration for unit tests that never touches the environment.
    pub(crate) fn test_config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/roghan_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("k3T9#vQ2!mZ8@pL5^rW1&xN7*bH4$cJ6"),
            sms: SmsConfig::Log,
            payment: PaymentConfig {
                merchant_id: SecretString::from("00000000-0000-0000-0000-000000000000"),
                sandbox: true,
            },
            captcha: None,
            storage: StorageConfig::Local {
                dir: PathBuf::from("uploads"),
            },
            shipping: ShippingConfig {
                fee: Toman::new(90_000),
                free_threshold: Toman::new(2_000_000),
            },
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-merchant-id-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_url_joins_base() {
        assert_eq!(
            test_config().url("/checkout/callback"),
            "http://localhost:3000/checkout/callback"
        );
    }

    #[test]
    fn test_shipping_fee_threshold() {
        let shipping = test_config().shipping;
        assert_eq!(shipping.fee_for(Toman::new(500_000)), Toman::new(90_000));
        assert_eq!(shipping.fee_for(Toman::new(2_000_000)), Toman::ZERO);
        assert_eq!(shipping.fee_for(Toman::ZERO), Toman::ZERO);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let sms = SmsConfig::Kavenegar {
            api_key: SecretString::from("super_secret_kavenegar_key"),
            template: "roghan-otp".to_string(),
        };
        let payment = PaymentConfig {
            merchant_id: SecretString::from("super_secret_merchant"),
            sandbox: false,
        };

        let output = format!("{sms:?} {payment:?}");

        assert!(output.contains("roghan-otp"));
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("super_secret_kavenegar_key"));
        assert!(!output.contains("super_secret_merchant"));
    }
}
