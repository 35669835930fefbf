//! Image storage for product photos, banners, gallery and blog covers.
//!
//! Files go either to a local directory served under `/uploads` or to an
//! S3-compatible bucket. S3 requests are signed with AWS Signature V4
//! (path-style addressing), implemented here with `hmac`/`sha2` so no SDK is
//! needed for the two calls used (`PUT` and `DELETE` object).

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::config::{S3Config, StorageConfig};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// URL prefix of locally stored files.
pub const LOCAL_URL_PREFIX: &str = "/uploads/";

type HmacSha256 = Hmac<Sha256>;

/// Errors that can occur when storing files.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The file is not a supported image.
    #[error("unsupported file type")]
    UnsupportedType,

    /// The file is empty or larger than [`MAX_UPLOAD_BYTES`].
    #[error("file size {0} out of range")]
    BadSize(usize),

    /// Local file system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Object storage rejected the request.
    #[error("object storage error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Accepted image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageKind {
    /// Detect the format from the file's leading bytes. The client's
    /// declared content type is not trusted.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(Self::Png),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::Webp),
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(Self::Gif),
            _ => None,
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }

    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }
}

/// Build a fresh object key such as `2026/10/3f2c….webp`.
#[must_use]
pub fn object_key(kind: ImageKind, now: DateTime<Utc>) -> String {
    format!(
        "{:04}/{:02}/{}.{}",
        now.year(),
        now.month(),
        Uuid::new_v4().simple(),
        kind.extension()
    )
}

#[derive(Clone)]
enum Backend {
    Local { dir: PathBuf },
    S3(S3Backend),
}

#[derive(Clone)]
struct S3Backend {
    client: reqwest::Client,
    endpoint: url::Url,
    bucket: String,
    region: String,
    access_key: String,
    secret_key: SecretString,
    public_url: String,
}

/// Image storage backed by local disk or S3.
#[derive(Clone)]
pub struct Storage {
    backend: Backend,
}

impl Storage {
    /// Create storage for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Config` if the S3 endpoint is not a URL.
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let backend = match config {
            StorageConfig::Local { dir } => Backend::Local { dir: dir.clone() },
            StorageConfig::S3(s3) => Backend::S3(S3Backend::new(s3)?),
        };
        Ok(Self { backend })
    }

    /// Local upload directory, if files are stored on disk.
    #[must_use]
    pub fn local_dir(&self) -> Option<&Path> {
        match &self.backend {
            Backend::Local { dir } => Some(dir),
            Backend::S3(_) => None,
        }
    }

    /// Origin images are served from, for the CSP `img-src`. `None` for
    /// local storage (same origin).
    #[must_use]
    pub fn public_origin(&self) -> Option<String> {
        match &self.backend {
            Backend::Local { .. } => None,
            Backend::S3(s3) => url::Url::parse(&s3.public_url)
                .ok()
                .map(|u| u.origin().ascii_serialization()),
        }
    }

    /// Validate and store an image, returning its public URL.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::UnsupportedType` or `BadSize` for invalid
    /// files, or a backend error if the write fails.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn put_image(&self, bytes: Vec<u8>) -> Result<String, StorageError> {
        if bytes.is_empty() || bytes.len() > MAX_UPLOAD_BYTES {
            return Err(StorageError::BadSize(bytes.len()));
        }
        let kind = ImageKind::sniff(&bytes).ok_or(StorageError::UnsupportedType)?;
        let key = object_key(kind, Utc::now());

        match &self.backend {
            Backend::Local { dir } => {
                let path = dir.join(&key);
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, &bytes).await?;
                Ok(format!("{LOCAL_URL_PREFIX}{key}"))
            }
            Backend::S3(s3) => {
                s3.put(&key, bytes, kind.content_type()).await?;
                Ok(format!("{}/{key}", s3.public_url))
            }
        }
    }

    /// Remove a previously stored image by its public URL. URLs that do not
    /// belong to this storage are ignored.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the delete fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, public_url: &str) -> Result<(), StorageError> {
        match &self.backend {
            Backend::Local { dir } => {
                let Some(key) = public_url.strip_prefix(LOCAL_URL_PREFIX) else {
                    return Ok(());
                };
                if !is_plain_relative(key) {
                    return Ok(());
                }
                match tokio::fs::remove_file(dir.join(key)).await {
                    Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                    _ => Ok(()),
                }
            }
            Backend::S3(s3) => {
                let Some(key) = public_url
                    .strip_prefix(&s3.public_url)
                    .and_then(|rest| rest.strip_prefix('/'))
                else {
                    return Ok(());
                };
                s3.delete(key).await
            }
        }
    }
}

/// A relative path with only normal components (no `..`, no root).
fn is_plain_relative(key: &str) -> bool {
    !key.is_empty()
        && Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

impl S3Backend {
    fn new(config: &S3Config) -> Result<Self, StorageError> {
        let endpoint = url::Url::parse(&config.endpoint)
            .map_err(|e| StorageError::Config(format!("S3_ENDPOINT: {e}")))?;
        if endpoint.host_str().is_none() {
            return Err(StorageError::Config("S3_ENDPOINT has no host".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
        })
    }

    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    fn path(&self, key: &str) -> String {
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("/{}/{}", urlencoding::encode(&self.bucket), encoded.join("/"))
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let path = self.path(key);
        let signed = self.sign("PUT", &path, &body, Utc::now());
        let url = format!("{}://{}{path}", self.endpoint.scheme(), self.host());

        let response = self
            .client
            .put(&url)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.payload_hash)
            .header("Authorization", &signed.authorization)
            .header("Content-Type", content_type)
            .body(body)
            .send()
            .await?;

        check(response).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path(key);
        let signed = self.sign("DELETE", &path, &[], Utc::now());
        let url = format!("{}://{}{path}", self.endpoint.scheme(), self.host());

        let response = self
            .client
            .delete(&url)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.payload_hash)
            .header("Authorization", &signed.authorization)
            .send()
            .await?;

        check(response).await
    }

    fn sign(&self, method: &str, path: &str, payload: &[u8], now: DateTime<Utc>) -> SignedHeaders {
        sign_request(&SigningInput {
            method,
            host: &self.host(),
            path,
            payload,
            region: &self.region,
            access_key: &self.access_key,
            secret_key: self.secret_key.expose_secret(),
            now,
        })
    }
}

async fn check(response: reqwest::Response) -> Result<(), StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Api {
        status: status.as_u16(),
        message,
    })
}

// =============================================================================
// AWS Signature V4
// =============================================================================

struct SigningInput<'a> {
    method: &'a str,
    host: &'a str,
    path: &'a str,
    payload: &'a [u8],
    region: &'a str,
    access_key: &'a str,
    secret_key: &'a str,
    now: DateTime<Utc>,
}

#[derive(Debug)]
struct SignedHeaders {
    amz_date: String,
    payload_hash: String,
    authorization: String,
}

const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

fn sign_request(input: &SigningInput<'_>) -> SignedHeaders {
    let amz_date = input.now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = input.now.format("%Y%m%d").to_string();
    let payload_hash = hex::encode(Sha256::digest(input.payload));

    let canonical = canonical_request(input.method, input.path, input.host, &payload_hash, &amz_date);
    let scope = format!("{date}/{}/s3/aws4_request", input.region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical.as_bytes()))
    );

    let key = signing_key(input.secret_key, &date, input.region, "s3");
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

    SignedHeaders {
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
            input.access_key
        ),
        amz_date,
        payload_hash,
    }
}

fn canonical_request(
    method: &str,
    path: &str,
    host: &str,
    payload_hash: &str,
    amz_date: &str,
) -> String {
    format!(
        "{method}\n{path}\n\nhost:{host}\nx-amz-content-sha256:{payload_hash}\nx-amz-date:{amz_date}\n\n{SIGNED_HEADERS}\n{payload_hash}"
    )
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return Vec::new();
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_signing_key_matches_aws_example() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        );
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_canonical_request_layout() {
        let empty_hash = hex::encode(Sha256::digest(b""));
        let canonical = canonical_request(
            "DELETE",
            "/media/2026/10/a.jpg",
            "s3.example.ir",
            &empty_hash,
            "20261016T120000Z",
        );
        assert_eq!(
            canonical,
            format!(
                "DELETE\n/media/2026/10/a.jpg\n\nhost:s3.example.ir\nx-amz-content-sha256:{empty_hash}\nx-amz-date:20261016T120000Z\n\nhost;x-amz-content-sha256;x-amz-date\n{empty_hash}"
            )
        );
    }

    #[test]
    fn test_authorization_header_shape() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let signed = sign_request(&SigningInput {
            method: "PUT",
            host: "s3.example.ir",
            path: "/media/2026/10/a.jpg",
            payload: b"hello",
            region: "ir-thr-at1",
            access_key: "AKIDEXAMPLE",
            secret_key: "secret",
            now,
        });
        assert_eq!(signed.amz_date, "20261016T120000Z");
        assert!(signed.authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20261016/ir-thr-at1/s3/aws4_request, SignedHeaders=host;x-amz-content-sha256;x-amz-date, Signature="
        ));
        let signature = signed.authorization.rsplit('=').next().unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_sniff_image_types() {
        assert_eq!(ImageKind::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageKind::Jpeg));
        assert_eq!(
            ImageKind::sniff(b"\x89PNG\r\n\x1a\n\0\0"),
            Some(ImageKind::Png)
        );
        assert_eq!(ImageKind::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageKind::Webp));
        assert_eq!(ImageKind::sniff(b"GIF89a"), Some(ImageKind::Gif));
        assert_eq!(ImageKind::sniff(b"<svg onload=alert(1)>"), None);
    }

    #[test]
    fn test_object_key_layout() {
        let now = Utc.with_ymd_and_hms(2026, 3, 5, 0, 0, 0).unwrap();
        let key = object_key(ImageKind::Webp, now);
        assert!(key.starts_with("2026/03/"));
        assert!(key.ends_with(".webp"));
        assert!(is_plain_relative(&key));
    }

    #[test]
    fn test_local_delete_rejects_traversal() {
        assert!(!is_plain_relative("../etc/passwd"));
        assert!(!is_plain_relative("/etc/passwd"));
        assert!(is_plain_relative("2026/10/x.png"));
    }

    #[tokio::test]
    async fn test_put_rejects_bad_files() {
        let storage = Storage::new(&StorageConfig::Local {
            dir: std::env::temp_dir().join("roghan-storage-test"),
        })
        .unwrap();
        assert!(matches!(
            storage.put_image(Vec::new()).await,
            Err(StorageError::BadSize(0))
        ));
        assert!(matches!(
            storage.put_image(b"not an image".to_vec()).await,
            Err(StorageError::UnsupportedType)
        ));
    }
}
