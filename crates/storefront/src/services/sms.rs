//! SMS delivery of OTP codes.
//!
//! Two Iranian providers are supported, selected by `SMS_PROVIDER`:
//! Kavenegar's `verify/lookup` template API and SMS.ir's `send/verify`.
//! The `log` provider writes codes to the log for local development.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use roghan_core::PhoneNumber;

use crate::config::SmsConfig;

const KAVENEGAR_BASE_URL: &str = "https://api.kavenegar.com/v1";
const SMSIR_VERIFY_URL: &str = "https://api.sms.ir/v1/send/verify";

/// Errors that can occur when sending an SMS.
#[derive(Debug, Error)]
pub enum SmsError {
    /// HTTP request failed. The URL is stripped: Kavenegar carries the
    /// API key in the path.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// Provider rejected the message.
    #[error("API error: {status} - {message}")]
    Api { status: i64, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SmsError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.without_url())
    }
}

#[derive(Clone)]
enum Provider {
    Log,
    Kavenegar {
        api_key: SecretString,
        template: String,
    },
    SmsIr {
        api_key: SecretString,
        template_id: i64,
    },
}

/// Client for the configured SMS provider.
#[derive(Clone)]
pub struct SmsClient {
    client: reqwest::Client,
    provider: Provider,
}

impl SmsClient {
    /// Create a client for the configured provider.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &SmsConfig) -> Result<Self, SmsError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        let provider = match config {
            SmsConfig::Log => Provider::Log,
            SmsConfig::Kavenegar { api_key, template } => Provider::Kavenegar {
                api_key: api_key.clone(),
                template: template.clone(),
            },
            SmsConfig::SmsIr {
                api_key,
                template_id,
            } => Provider::SmsIr {
                api_key: api_key.clone(),
                template_id: *template_id,
            },
        };

        Ok(Self { client, provider })
    }

    /// Provider name for logs and the health page.
    #[must_use]
    pub const fn provider_name(&self) -> &'static str {
        match self.provider {
            Provider::Log => "log",
            Provider::Kavenegar { .. } => "kavenegar",
            Provider::SmsIr { .. } => "smsir",
        }
    }

    /// Send a verification code using the provider's OTP template.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the provider rejects it.
    #[instrument(skip(self, code), fields(provider = self.provider_name(), phone = %phone.masked()))]
    pub async fn send_otp(&self, phone: &PhoneNumber, code: &str) -> Result<(), SmsError> {
        match &self.provider {
            Provider::Log => {
                tracing::info!(phone = %phone.masked(), code, "OTP code (log provider)");
                Ok(())
            }
            Provider::Kavenegar { api_key, template } => {
                let url = format!(
                    "{KAVENEGAR_BASE_URL}/{}/verify/lookup.json",
                    api_key.expose_secret()
                );
                let response = self
                    .client
                    .get(&url)
                    .query(&[
                        ("receptor", phone.as_str()),
                        ("token", code),
                        ("template", template.as_str()),
                    ])
                    .send()
                    .await?;
                let body = response.text().await?;
                parse_kavenegar(&body)
            }
            Provider::SmsIr {
                api_key,
                template_id,
            } => {
                let body = serde_json::json!({
                    "mobile": phone.as_str(),
                    "templateId": template_id,
                    "parameters": [{ "name": "CODE", "value": code }],
                });
                let response = self
                    .client
                    .post(SMSIR_VERIFY_URL)
                    .header("x-api-key", api_key.expose_secret())
                    .header("Accept", "application/json")
                    .json(&body)
                    .send()
                    .await?;
                let body = response.text().await?;
                parse_smsir(&body)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct KavenegarResponse {
    #[serde(rename = "return")]
    result: KavenegarReturn,
}

#[derive(Debug, Deserialize)]
struct KavenegarReturn {
    status: i64,
    message: String,
}

/// Kavenegar reports success as `return.status == 200`, even on HTTP errors
/// the body carries the real status.
fn parse_kavenegar(body: &str) -> Result<(), SmsError> {
    let parsed: KavenegarResponse =
        serde_json::from_str(body).map_err(|e| SmsError::Parse(e.to_string()))?;
    if parsed.result.status == 200 {
        Ok(())
    } else {
        Err(SmsError::Api {
            status: parsed.result.status,
            message: parsed.result.message,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SmsIrResponse {
    status: i64,
    #[serde(default)]
    message: String,
}

/// SMS.ir reports success as `status == 1`.
fn parse_smsir(body: &str) -> Result<(), SmsError> {
    let parsed: SmsIrResponse =
        serde_json::from_str(body).map_err(|e| SmsError::Parse(e.to_string()))?;
    if parsed.status == 1 {
        Ok(())
    } else {
        Err(SmsError::Api {
            status: parsed.status,
            message: parsed.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kavenegar_success() {
        let body = r#"{"return":{"status":200,"message":"تایید شد"},"entries":[{"messageid":8792343,"status":5}]}"#;
        assert!(parse_kavenegar(body).is_ok());
    }

    #[test]
    fn test_kavenegar_rejected() {
        let body = r#"{"return":{"status":424,"message":"الگوی مورد نظر پیدا نشد"},"entries":null}"#;
        match parse_kavenegar(body) {
            Err(SmsError::Api { status, .. }) => assert_eq!(status, 424),
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[test]
    fn test_smsir_statuses() {
        assert!(parse_smsir(r#"{"status":1,"message":"موفق","data":{"messageId":1}}"#).is_ok());
        assert!(matches!(
            parse_smsir(r#"{"status":10,"message":"کلید وب سرویس نامعتبر است"}"#),
            Err(SmsError::Api { status: 10, .. })
        ));
        assert!(matches!(parse_smsir("<html>"), Err(SmsError::Parse(_))));
    }

    #[tokio::test]
    async fn test_http_error_hides_api_key() {
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:9/v1/KEY-0123456789/verify/lookup.json?receptor=09121234567")
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .expect_err("nothing listens on the discard port");
        let text = SmsError::from(err).to_string();
        assert!(!text.contains("KEY-0123456789"), "{text}");
        assert!(!text.contains("09121234567"), "{text}");
    }

    #[test]
    fn test_provider_name() {
        let client = SmsClient::new(&SmsConfig::Log).expect("client");
        assert_eq!(client.provider_name(), "log");
    }
}
