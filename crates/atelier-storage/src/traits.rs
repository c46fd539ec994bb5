//! Object storage abstraction trait
//!
//! This module defines the ImageUploader trait that all upload backends must implement.

use async_trait::async_trait;
use atelier_core::{AppError, InlinePayload, ProjectId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Object storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// The service answered but refused the request.
    #[error("Upload rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected response from storage: {0}")]
    InvalidResponse(String),

    #[error("Storage unreachable: {0}")]
    ConnectionFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConnectionFailed(msg) => AppError::Connection(msg),
            StorageError::ConfigError(msg) => AppError::Configuration(msg),
            other => AppError::Upload(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One image to upload.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    pub payload: &'a InlinePayload,
    /// Asset name within the configured folder.
    pub public_id: &'a str,
}

/// A hosted image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    /// Permanent HTTPS URL.
    pub url: String,
    pub public_id: String,
    pub bytes: u64,
}

/// Deterministic asset name for a project section.
pub fn public_id_for(project_id: &ProjectId, section_index: usize) -> String {
    format!("{}_{}", project_id, section_index)
}

/// Image upload abstraction trait
///
/// Implementations must only be called for legacy inline payloads; every call
/// is a billable operation against the external service.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Upload decoded image bytes and return the hosted URL.
    async fn upload(&self, request: UploadRequest<'_>) -> StorageResult<UploadedImage>;

    /// Validate credentials and reachability without uploading anything.
    async fn ping(&self) -> StorageResult<()>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
