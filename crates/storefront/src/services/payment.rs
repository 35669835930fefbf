//! `ZarinPal` payment gateway client (REST v4).
//!
//! The gateway works in rials; callers pass tomans and the conversion
//! happens here. A payment is a two-step round trip:
//!
//! 1. `request` registers the amount and callback and returns an `authority`.
//!    The customer is redirected to [`PaymentClient::start_pay_url`].
//! 2. The gateway redirects back with `Authority` and `Status`; `verify`
//!    confirms the amount and returns the reference ID.
//!
//! Verification code `100` means verified, `101` means this authority was
//! already verified earlier. Both are success, which makes `verify` safe to
//! repeat.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use roghan_core::Toman;

use crate::config::PaymentConfig;

const PRODUCTION_HOST: &str = "https://payment.zarinpal.com";
const SANDBOX_HOST: &str = "https://sandbox.zarinpal.com";

/// Errors that can occur when talking to the gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error code.
    #[error("gateway error {code}: {message}")]
    Gateway { code: i64, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// A successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub ref_id: String,
    pub card_pan: Option<String>,
    /// `true` when the gateway answered `101` (verified before).
    pub already_verified: bool,
}

/// `ZarinPal` API client.
#[derive(Clone)]
pub struct PaymentClient {
    client: reqwest::Client,
    merchant_id: SecretString,
    host: &'static str,
}

impl PaymentClient {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            merchant_id: config.merchant_id.clone(),
            host: if config.sandbox {
                SANDBOX_HOST
            } else {
                PRODUCTION_HOST
            },
        })
    }

    /// Host of the gateway's payment page, for the CSP `form-action`.
    #[must_use]
    pub const fn host(&self) -> &'static str {
        self.host
    }

    /// Where to send the customer to pay.
    #[must_use]
    pub fn start_pay_url(&self, authority: &str) -> String {
        format!("{}/pg/StartPay/{}", self.host, urlencoding::encode(authority))
    }

    /// Register a payment and get its authority.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the gateway rejects it.
    #[instrument(skip(self, description, mobile), fields(amount = %amount))]
    pub async fn request(
        &self,
        amount: Toman,
        description: &str,
        callback_url: &str,
        mobile: Option<&str>,
    ) -> Result<String, PaymentError> {
        let mut body = serde_json::json!({
            "merchant_id": self.merchant_id.expose_secret(),
            "amount": amount.to_rials(),
            "currency": "IRR",
            "description": description,
            "callback_url": callback_url,
        });
        if let Some(mobile) = mobile {
            body["metadata"] = serde_json::json!({ "mobile": mobile });
        }

        let url = format!("{}/pg/v4/payment/request.json", self.host);
        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;
        let text = response.text().await?;

        let data: RequestData = parse_data(&text, &[100])?;
        tracing::info!(authority = %data.authority, "Payment requested");
        Ok(data.authority)
    }

    /// Confirm a payment.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Gateway` if the payment was not completed or
    /// the amount does not match.
    #[instrument(skip(self), fields(amount = %amount))]
    pub async fn verify(&self, amount: Toman, authority: &str) -> Result<Verification, PaymentError> {
        let body = serde_json::json!({
            "merchant_id": self.merchant_id.expose_secret(),
            "amount": amount.to_rials(),
            "authority": authority,
        });

        let url = format!("{}/pg/v4/payment/verify.json", self.host);
        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;
        let text = response.text().await?;

        parse_verify(&text)
    }
}

#[derive(Debug, Deserialize)]
struct RequestData {
    code: i64,
    authority: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    code: i64,
    ref_id: Value,
    #[serde(default)]
    card_pan: Option<String>,
}

trait HasCode {
    fn code(&self) -> i64;
}

impl HasCode for RequestData {
    fn code(&self) -> i64 {
        self.code
    }
}

impl HasCode for VerifyData {
    fn code(&self) -> i64 {
        self.code
    }
}

/// Extract `data` from a gateway envelope.
///
/// On failure the gateway sends `"data": []` and an `errors` object with
/// `code` and `message`; on success `errors` is an empty array.
fn parse_data<T>(body: &str, ok_codes: &[i64]) -> Result<T, PaymentError>
where
    T: for<'de> Deserialize<'de> + HasCode,
{
    let envelope: Value = serde_json::from_str(body).map_err(|e| PaymentError::Parse(e.to_string()))?;

    if let Some(errors) = envelope.get("errors").filter(|e| e.is_object()) {
        return Err(PaymentError::Gateway {
            code: errors.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: errors
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }

    let data = envelope
        .get("data")
        .cloned()
        .ok_or_else(|| PaymentError::Parse("missing data".to_string()))?;
    let data: T = serde_json::from_value(data).map_err(|e| PaymentError::Parse(e.to_string()))?;

    if ok_codes.contains(&data.code()) {
        Ok(data)
    } else {
        Err(PaymentError::Gateway {
            code: data.code(),
            message: String::new(),
        })
    }
}

fn parse_verify(body: &str) -> Result<Verification, PaymentError> {
    let data: VerifyData = parse_data(body, &[100, 101])?;
    let ref_id = match data.ref_id {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s,
        other => return Err(PaymentError::Parse(format!("unexpected ref_id: {other}"))),
    };
    Ok(Verification {
        ref_id,
        card_pan: data.card_pan.filter(|p| !p.is_empty()),
        already_verified: data.code == 101,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(sandbox: bool) -> PaymentClient {
        PaymentClient::new(&PaymentConfig {
            merchant_id: SecretString::from("xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx"),
            sandbox,
        })
        .unwrap()
    }

    #[test]
    fn test_start_pay_url() {
        assert_eq!(
            client(false).start_pay_url("A00000000000000000000000000217885159"),
            "https://payment.zarinpal.com/pg/StartPay/A00000000000000000000000000217885159"
        );
        assert!(client(true).start_pay_url("A1").starts_with("https://sandbox.zarinpal.com/"));
    }

    #[test]
    fn test_request_success() {
        let body = r#"{"data":{"code":100,"message":"Success","authority":"A0000000000000000000000000000wwOGYpd","fee_type":"Merchant","fee":100},"errors":[]}"#;
        let data: RequestData = parse_data(body, &[100]).unwrap();
        assert_eq!(data.authority, "A0000000000000000000000000000wwOGYpd");
    }

    #[test]
    fn test_request_error_object() {
        let body = r#"{"data":[],"errors":{"code":-9,"message":"The input params invalid, validation error.","validations":[]}}"#;
        match parse_data::<RequestData>(body, &[100]) {
            Err(PaymentError::Gateway { code, message }) => {
                assert_eq!(code, -9);
                assert!(message.contains("validation"));
            }
            other => panic!("expected gateway error, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_success_and_repeat() {
        let body = r#"{"data":{"code":100,"message":"Verified","card_hash":"1EBE3EBEBE35C7EC0F8D6EE4F2F859107A87822CA179BC9528767EA7B5489B69","card_pan":"502229******5995","ref_id":201,"fee_type":"Merchant","fee":0},"errors":[]}"#;
        let verified = parse_verify(body).unwrap();
        assert_eq!(verified.ref_id, "201");
        assert_eq!(verified.card_pan.as_deref(), Some("502229******5995"));
        assert!(!verified.already_verified);

        let again = r#"{"data":{"code":101,"message":"Verified","card_pan":"502229******5995","ref_id":201},"errors":[]}"#;
        assert!(parse_verify(again).unwrap().already_verified);
    }

    #[test]
    fn test_verify_unpaid() {
        let body = r#"{"data":[],"errors":{"code":-51,"message":"Session is not valid, session is not active paid try.","validations":[]}}"#;
        assert!(matches!(
            parse_verify(body),
            Err(PaymentError::Gateway { code: -51, .. })
        ));
    }
}
