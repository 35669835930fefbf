//! One-shot messages shown on the page after a redirect.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::models::session_keys;

/// Kind of flash message, also its CSS modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Error,
}

/// A message stored in the session until the next page render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    /// CSS class for the alert box.
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self.kind {
            FlashKind::Success => "alert-success",
            FlashKind::Error => "alert-error",
        }
    }

    /// Store in the session. Failures are logged, not surfaced.
    pub async fn set(self, session: &Session) {
        if let Err(e) = session.insert(session_keys::FLASH, self).await {
            tracing::warn!(error = %e, "Failed to store flash message");
        }
    }

    /// Take the pending message, if any.
    pub async fn take(session: &Session) -> Option<Self> {
        session
            .remove::<Self>(session_keys::FLASH)
            .await
            .ok()
            .flatten()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_serde_and_class() {
        let flash = Flash::error("کد نادرست است.");
        assert_eq!(flash.css_class(), "alert-error");

        let json = serde_json::to_string(&flash).unwrap();
        assert!(json.contains("\"error\""));
        let back: Flash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flash);
    }
}
