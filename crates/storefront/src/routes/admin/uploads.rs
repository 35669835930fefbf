//! Image upload endpoint used by the back-office forms.
//!
//! The form script posts the chosen file here and writes the returned URL
//! into the form's image field.

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::instrument;

use crate::middleware::RequireAdmin;
use crate::services::storage::{MAX_UPLOAD_BYTES, StorageError};
use crate::state::AppState;

/// Multipart field carrying the file.
const FILE_FIELD: &str = "file";

/// Successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// Upload failure, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct UploadError {
    status: StatusCode,
    message: String,
}

impl UploadError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<StorageError> for UploadError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::UnsupportedType => {
                Self::bad_request("فقط تصاویر JPEG، PNG، WebP و GIF پذیرفته می‌شوند.")
            }
            StorageError::BadSize(_) => Self::bad_request(format!(
                "حجم فایل باید کمتر از {} مگابایت باشد.",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            )),
            other => {
                tracing::error!(error = %other, "Image storage failed");
                sentry::capture_error(&other);
                Self {
                    status: StatusCode::BAD_GATEWAY,
                    message: "ذخیره تصویر ناموفق بود. دوباره تلاش کنید.".to_string(),
                }
            }
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct Body {
            error: String,
        }
        (self.status, Json(Body { error: self.message })).into_response()
    }
}

/// Store an uploaded image and return its public URL.
///
/// POST /admin/uploads (multipart, field `file`)
///
/// # Errors
///
/// Returns 400 for a missing, oversized or non-image file and 502 when the
/// storage backend fails.
#[instrument(skip(state, multipart), fields(admin_id = %admin.id))]
pub async fn upload(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::bad_request(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| UploadError::bad_request(e.body_text()))?;
        let url = state.storage().put_image(bytes.to_vec()).await?;
        tracing::info!(%url, size = bytes.len(), "Image uploaded");
        return Ok(Json(UploadResponse { url }));
    }
    Err(UploadError::bad_request("فایلی انتخاب نشده است."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_map_to_client_errors() {
        assert_eq!(
            UploadError::from(StorageError::UnsupportedType).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            UploadError::from(StorageError::BadSize(0)).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            UploadError::from(StorageError::Config("x".into())).status,
            StatusCode::BAD_GATEWAY
        );
    }
}
