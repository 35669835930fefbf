//! Cloudflare Turnstile verification.
//!
//! Captcha is optional: without keys every token is accepted and a warning
//! is logged once at startup.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use crate::config::CaptchaConfig;

const SITEVERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

/// Form field the Turnstile widget fills in.
pub const RESPONSE_FIELD: &str = "cf-turnstile-response";

/// Errors that can occur during captcha verification.
#[derive(Debug, Error)]
pub enum CaptchaError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The token was missing or rejected.
    #[error("captcha rejected: {0:?}")]
    Rejected(Vec<String>),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Clone)]
struct Keys {
    site_key: String,
    secret_key: SecretString,
}

/// Turnstile verifier.
#[derive(Clone)]
pub struct CaptchaVerifier {
    client: reqwest::Client,
    keys: Option<Keys>,
}

impl CaptchaVerifier {
    /// Create a verifier; `None` disables verification.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: Option<&CaptchaConfig>) -> Result<Self, CaptchaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        if config.is_none() {
            tracing::warn!("Turnstile keys not set, captcha verification is disabled");
        }

        Ok(Self {
            client,
            keys: config.map(|c| Keys {
                site_key: c.site_key.clone(),
                secret_key: c.secret_key.clone(),
            }),
        })
    }

    /// Site key for the widget, `None` when captcha is disabled.
    #[must_use]
    pub fn site_key(&self) -> Option<&str> {
        self.keys.as_ref().map(|k| k.site_key.as_str())
    }

    /// Verify a widget token.
    ///
    /// # Errors
    ///
    /// Returns `CaptchaError::Rejected` if the token is missing or invalid.
    #[instrument(skip(self, token))]
    pub async fn verify(&self, token: Option<&str>, remote_ip: Option<&str>) -> Result<(), CaptchaError> {
        let Some(keys) = &self.keys else {
            return Ok(());
        };

        let token = token.map(str::trim).filter(|t| !t.is_empty());
        let Some(token) = token else {
            return Err(CaptchaError::Rejected(vec!["missing-input-response".to_string()]));
        };

        let mut form = vec![
            ("secret", keys.secret_key.expose_secret()),
            ("response", token),
        ];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response = self.client.post(SITEVERIFY_URL).form(&form).send().await?;
        let body = response.text().await?;
        parse_siteverify(&body)
    }
}

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

fn parse_siteverify(body: &str) -> Result<(), CaptchaError> {
    let parsed: SiteverifyResponse =
        serde_json::from_str(body).map_err(|e| CaptchaError::Parse(e.to_string()))?;
    if parsed.success {
        Ok(())
    } else {
        Err(CaptchaError::Rejected(parsed.error_codes))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success() {
        let body = r#"{"success":true,"challenge_ts":"2026-01-01T00:00:00.000Z","hostname":"roghan.ir","error-codes":[],"action":"otp"}"#;
        assert!(parse_siteverify(body).is_ok());
    }

    #[test]
    fn test_parse_rejected() {
        let body = r#"{"success":false,"error-codes":["invalid-input-response"]}"#;
        match parse_siteverify(body) {
            Err(CaptchaError::Rejected(codes)) => assert_eq!(codes, ["invalid-input-response"]),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disabled_accepts_anything() {
        let verifier = CaptchaVerifier::new(None).unwrap();
        assert!(verifier.site_key().is_none());
        assert!(verifier.verify(None, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_token_rejected_without_request() {
        let verifier = CaptchaVerifier::new(Some(&CaptchaConfig {
            site_key: "1x00000000000000000000AA".to_string(),
            secret_key: SecretString::from("1x0000000000000000000000000000000AA"),
        }))
        .unwrap();
        assert!(matches!(
            verifier.verify(Some("  "), None).await,
            Err(CaptchaError::Rejected(_))
        ));
    }
}
