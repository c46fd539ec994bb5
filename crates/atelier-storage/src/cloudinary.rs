//! Cloudinary uploader.
//!
//! Uses the signed upload endpoint (`POST /v1_1/{cloud}/image/upload`) and the
//! admin ping endpoint (`GET /v1_1/{cloud}/ping`). Requests are signed with
//! SHA-256 over the alphabetically sorted upload parameters followed by the
//! API secret.

use crate::traits::{ImageUploader, StorageError, StorageResult, UploadRequest, UploadedImage};
use async_trait::async_trait;
use atelier_core::CloudinaryConfig;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

const MIGRATION_TAG: &str = "atelier-migration";
const SIGNATURE_ALGORITHM: &str = "sha256";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    #[serde(default)]
    bytes: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PingResponse {
    status: String,
}

/// Cloudinary upload implementation
#[derive(Clone)]
pub struct CloudinaryUploader {
    http_client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    api_base: String,
    folder: String,
}

impl Debug for CloudinaryUploader {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CloudinaryUploader")
            .field("cloud_name", &self.cloud_name)
            .field("api_base", &self.api_base)
            .field("folder", &self.folder)
            .finish()
    }
}

impl CloudinaryUploader {
    pub fn new(config: &CloudinaryConfig) -> StorageResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                StorageError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            folder: config.folder.clone(),
        })
    }

    fn upload_url(&self) -> String {
        format!("{}/v1_1/{}/image/upload", self.api_base, self.cloud_name)
    }

    fn ping_url(&self) -> String {
        format!("{}/v1_1/{}/ping", self.api_base, self.cloud_name)
    }

    /// Parameters covered by the request signature.
    fn signed_params(&self, public_id: &str, timestamp: i64) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        if !self.folder.is_empty() {
            params.insert("folder", self.folder.clone());
        }
        params.insert("overwrite", "true".to_string());
        params.insert("public_id", public_id.to_string());
        params.insert("tags", MIGRATION_TAG.to_string());
        params.insert("timestamp", timestamp.to_string());
        params
    }

    async fn error_message(response: reqwest::Response) -> String {
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        serde_json::from_str::<ErrorResponse>(&text)
            .map(|body| body.error.message)
            .unwrap_or(text)
    }
}

/// Hex SHA-256 of `k1=v1&k2=v2...` (keys sorted) followed by the secret.
pub(crate) fn sign(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// A request that never reached Cloudinary means the service is unreachable
/// for every remaining upload, not just this one.
fn send_error(err: reqwest::Error) -> StorageError {
    if err.is_connect() {
        StorageError::ConnectionFailed(err.to_string())
    } else {
        StorageError::UploadFailed(err.to_string())
    }
}

#[async_trait]
impl ImageUploader for CloudinaryUploader {
    #[tracing::instrument(
        skip(self, request),
        fields(
            storage.backend = "cloudinary",
            public_id = %request.public_id,
            size_bytes = request.payload.len()
        )
    )]
    async fn upload(&self, request: UploadRequest<'_>) -> StorageResult<UploadedImage> {
        let start = std::time::Instant::now();
        let params = self.signed_params(request.public_id, Utc::now().timestamp());
        let signature = sign(&params, &self.api_secret);

        let file = reqwest::multipart::Part::bytes(request.payload.data.clone())
            .file_name(format!(
                "{}.{}",
                request.public_id,
                request.payload.extension()
            ))
            .mime_str(&request.payload.mime_type)
            .map_err(|e| StorageError::UploadFailed(format!("Invalid MIME type: {}", e)))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("api_key", self.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", SIGNATURE_ALGORITHM);
        for (key, value) in params {
            form = form.text(key, value);
        }

        let response = self
            .http_client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Cloudinary upload request failed"
                );
                send_error(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = Self::error_message(response).await;
            tracing::error!(
                status = status.as_u16(),
                error = %message,
                "Cloudinary rejected upload"
            );
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        if !uploaded.secure_url.starts_with("https://") {
            return Err(StorageError::InvalidResponse(format!(
                "secure_url is not an HTTPS URL: {}",
                uploaded.secure_url
            )));
        }

        tracing::info!(
            url = %uploaded.secure_url,
            bytes = uploaded.bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Cloudinary upload successful"
        );

        Ok(UploadedImage {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
            bytes: uploaded.bytes,
        })
    }

    #[tracing::instrument(skip(self), fields(storage.backend = "cloudinary"))]
    async fn ping(&self) -> StorageResult<()> {
        let response = self
            .http_client
            .get(self.ping_url())
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .send()
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = Self::error_message(response).await;
            return Err(StorageError::ConnectionFailed(format!(
                "ping returned {}: {}",
                status, message
            )));
        }

        let body: PingResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;
        if body.status != "ok" {
            return Err(StorageError::ConnectionFailed(format!(
                "ping status {}",
                body.status
            )));
        }

        tracing::debug!(cloud_name = %self.cloud_name, "Cloudinary ping ok");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "cloudinary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::{AppError, FailureScope, InlinePayload};
    use mockito::Matcher;

    fn config(api_base: String) -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: "studio".to_string(),
            api_key: "1234".to_string(),
            api_secret: "s3cret".to_string(),
            api_base,
            folder: "atelier/projects".to_string(),
            timeout_secs: 5,
        }
    }

    fn test_uploader(api_base: &str) -> CloudinaryUploader {
        CloudinaryUploader::new(&config(api_base.into())).unwrap()
    }

    fn png() -> InlinePayload {
        InlinePayload::parse("data:image/png;base64,AAAA").unwrap()
    }

    #[test]
    fn signature_is_sha256_over_sorted_params() {
        let uploader = test_uploader("https://api.cloudinary.com");
        let params = uploader.signed_params("p1_0", 1_700_000_000);
        assert_eq!(
            params.keys().copied().collect::<Vec<_>>(),
            vec!["folder", "overwrite", "public_id", "tags", "timestamp"]
        );
        assert_eq!(
            sign(&params, "s3cret"),
            "05e086d4bd05af4c321319f7f68e11e436ee6af88f7192026210896584a15cf7"
        );
    }

    #[test]
    fn urls_ignore_trailing_slash() {
        let uploader = test_uploader("https://api.cloudinary.com/");
        assert_eq!(
            uploader.upload_url(),
            "https://api.cloudinary.com/v1_1/studio/image/upload"
        );
        assert_eq!(uploader.ping_url(), "https://api.cloudinary.com/v1_1/studio/ping");
    }

    #[test]
    fn debug_hides_secret() {
        let uploader = test_uploader("https://api.cloudinary.com");
        assert!(!format!("{:?}", uploader).contains("s3cret"));
    }

    #[tokio::test]
    async fn upload_returns_secure_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1_1/studio/image/upload")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="public_id""#.to_string()),
                Matcher::Regex(r#"name="signature_algorithm""#.to_string()),
                Matcher::Regex(r#"filename="p1_0.png""#.to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"secure_url":"https://res.cloudinary.com/studio/image/upload/v1/atelier/projects/p1_0.png","public_id":"atelier/projects/p1_0","bytes":3,"format":"png"}"#,
            )
            .create_async()
            .await;

        let uploader = CloudinaryUploader::new(&config(server.url())).unwrap();
        let payload = png();
        let uploaded = uploader
            .upload(UploadRequest {
                payload: &payload,
                public_id: "p1_0",
            })
            .await
            .unwrap();

        assert_eq!(
            uploaded.url,
            "https://res.cloudinary.com/studio/image/upload/v1/atelier/projects/p1_0.png"
        );
        assert_eq!(uploaded.public_id, "atelier/projects/p1_0");
        assert_eq!(uploaded.bytes, 3);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_upload_surfaces_service_message() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1_1/studio/image/upload")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"message":"Invalid image file"}}"#)
            .create_async()
            .await;

        let uploader = CloudinaryUploader::new(&config(server.url())).unwrap();
        let payload = png();
        let err = uploader
            .upload(UploadRequest {
                payload: &payload,
                public_id: "p1_0",
            })
            .await
            .unwrap_err();

        match err {
            StorageError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid image file");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn upload_without_https_url_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1_1/studio/image/upload")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"secure_url":"http://insecure/x.png","public_id":"x"}"#)
            .create_async()
            .await;

        let uploader = CloudinaryUploader::new(&config(server.url())).unwrap();
        let payload = png();
        let err = uploader
            .upload(UploadRequest {
                payload: &payload,
                public_id: "x",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_service_fails_the_run() {
        // Nothing listens on port 1.
        let uploader = test_uploader("http://127.0.0.1:1");
        let payload = png();
        let err = uploader
            .upload(UploadRequest {
                payload: &payload,
                public_id: "p1_0",
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::ConnectionFailed(_)));
        assert_eq!(AppError::from(err).scope(), FailureScope::Run);
    }

    #[tokio::test]
    async fn ping_uses_basic_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1_1/studio/ping")
            .match_header("authorization", "Basic MTIzNDpzM2NyZXQ=")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"ok"}"#)
            .create_async()
            .await;

        let uploader = CloudinaryUploader::new(&config(server.url())).unwrap();
        uploader.ping().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn ping_with_bad_credentials_is_a_connection_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1_1/studio/ping")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Invalid api_key 1234"}}"#)
            .create_async()
            .await;

        let uploader = CloudinaryUploader::new(&config(server.url())).unwrap();
        let err = uploader.ping().await.unwrap_err();
        match err {
            StorageError::ConnectionFailed(message) => {
                assert!(message.contains("Invalid api_key 1234"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
