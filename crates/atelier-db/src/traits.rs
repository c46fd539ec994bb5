//! Content store abstraction trait
//!
//! This module defines the ContentStore trait that all store backends must implement.

use async_trait::async_trait;
use atelier_core::{AppError, Project, ProjectId, Section};
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// Content store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store configuration error: {0}")]
    ConfigError(String),

    #[error("Store connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Store query failed: {0}")]
    QueryFailed(String),

    /// A single document could not be mapped onto the project schema.
    #[error("Unreadable project {id}: {message}")]
    Unreadable { id: String, message: String },

    #[error("Project not found: {0}")]
    NotFound(String),

    #[error("Store write failed: {0}")]
    WriteFailed(String),
}

impl StoreError {
    /// Whether the error only concerns one document and the scan can continue.
    pub fn is_document_scoped(&self) -> bool {
        matches!(
            self,
            StoreError::Unreadable { .. }
                | StoreError::NotFound(_)
                | StoreError::WriteFailed(_)
        )
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConfigError(msg) => AppError::Configuration(msg),
            StoreError::ConnectionFailed(msg) | StoreError::QueryFailed(msg) => {
                AppError::Connection(msg)
            }
            other => AppError::Persist(other.to_string()),
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Projects in the store's natural order.
pub type ProjectStream<'a> = Pin<Box<dyn Stream<Item = StoreResult<Project>> + Send + 'a>>;

/// How a pass walks the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Documents fetched per round trip.
    pub batch_size: u32,
    /// Restrict the scan to a single project.
    pub project_id: Option<ProjectId>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            project_id: None,
        }
    }
}

/// Content store abstraction trait
///
/// Passes only need three things from the store: a connectivity check, an
/// ordered stream of projects, and a whole-array replacement of one project's
/// `sections`. No locking is taken between read and write; a concurrent edit
/// of the same project can be overwritten.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Lightweight round trip to validate the connection.
    async fn ping(&self) -> StoreResult<()>;

    /// Stream projects matching `options` in natural order.
    ///
    /// Item-level `Unreadable` errors concern one document; any other error
    /// means the stream is broken.
    async fn stream_projects(&self, options: &ScanOptions) -> StoreResult<ProjectStream<'_>>;

    /// Replace the full `sections` array of a project.
    async fn replace_sections(&self, id: &ProjectId, sections: &[Section]) -> StoreResult<()>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
