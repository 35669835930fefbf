//! Security headers middleware for XSS, clickjacking, and isolation protection.
//!
//! Adds restrictive security headers to all responses. The CSP starts locked
//! down and is loosened only for what the shop needs: the payment gateway as
//! a form/redirect target, Cloudflare Turnstile on the login form, and the
//! object-storage host for product images.

use axum::{
    extract::{Request, State},
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

use super::csp::CspNonce;
use crate::state::AppState;

const TURNSTILE_ORIGIN: &str = "https://challenges.cloudflare.com";

/// Inputs that vary the CSP between deployments and requests.
#[derive(Debug, Clone, Copy)]
pub struct CspSources<'a> {
    pub nonce: &'a str,
    pub payment_host: &'a str,
    pub image_origin: Option<&'a str>,
    pub captcha: bool,
}

/// Build the `Content-Security-Policy` value.
#[must_use]
pub fn content_security_policy(sources: CspSources<'_>) -> String {
    let captcha = if sources.captcha {
        format!(" {TURNSTILE_ORIGIN}")
    } else {
        String::new()
    };
    let images = sources
        .image_origin
        .map(|origin| format!(" {origin}"))
        .unwrap_or_default();

    format!(
        "default-src 'none'; \
         script-src 'self' 'nonce-{nonce}'{captcha}; \
         style-src 'self'; \
         font-src 'self'; \
         img-src 'self' data:{images}; \
         connect-src 'self'{captcha}; \
         frame-src{frames}; \
         object-src 'none'; \
         base-uri 'self'; \
         form-action 'self' {payment}; \
         frame-ancestors 'none'",
        nonce = sources.nonce,
        frames = if sources.captcha { captcha.as_str() } else { " 'none'" },
        payment = sources.payment_host,
    )
}

/// Add security headers to all responses.
///
/// Headers applied:
/// - `X-Frame-Options: DENY` - Prevent clickjacking
/// - `X-Content-Type-Options: nosniff` - Prevent MIME sniffing
/// - `Referrer-Policy: strict-origin-when-cross-origin` - The gateway sees only our origin
/// - `Content-Security-Policy` - Nonce-based CSP (see [`content_security_policy`])
/// - `Permissions-Policy` - Deny sensitive features
/// - `Cache-Control: no-store` - Unless the handler set its own
/// - `Cross-Origin-Opener-Policy: same-origin` - Process isolation
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let nonce = request
        .extensions()
        .get::<CspNonce>()
        .cloned()
        .unwrap_or_default();

    let mut response = next.run(request).await;

    let image_origin = state.storage().public_origin();
    let csp = content_security_policy(CspSources {
        nonce: nonce.value(),
        payment_host: state.payment().host(),
        image_origin: image_origin.as_deref(),
        captcha: state.captcha().site_key().is_some(),
    });

    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    match HeaderValue::from_str(&csp) {
        Ok(value) => {
            headers.insert(CONTENT_SECURITY_POLICY, value);
        }
        Err(e) => tracing::error!(error = %e, "Invalid CSP header value"),
    }

    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(
            "accelerometer=(), camera=(), display-capture=(), geolocation=(), \
             gyroscope=(), magnetometer=(), microphone=(), payment=(), usb=()",
        ),
    );

    if !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csp_without_optional_sources() {
        let csp = content_security_policy(CspSources {
            nonce: "abc",
            payment_host: "https://payment.zarinpal.com",
            image_origin: None,
            captcha: false,
        });
        assert!(csp.contains("script-src 'self' 'nonce-abc';"));
        assert!(csp.contains("form-action 'self' https://payment.zarinpal.com;"));
        assert!(csp.contains("frame-src 'none';"));
        assert!(!csp.contains("challenges.cloudflare.com"));
    }

    #[test]
    fn test_csp_with_captcha_and_object_storage() {
        let csp = content_security_policy(CspSources {
            nonce: "n",
            payment_host: "https://sandbox.zarinpal.com",
            image_origin: Some("https://cdn.roghan.ir"),
            captcha: true,
        });
        assert!(csp.contains("img-src 'self' data: https://cdn.roghan.ir;"));
        assert!(csp.contains("frame-src https://challenges.cloudflare.com;"));
        assert!(csp.contains("script-src 'self' 'nonce-n' https://challenges.cloudflare.com;"));
    }
}
