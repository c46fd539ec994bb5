//! Atelier Core Library
//!
//! This crate provides the shared project schema, the legacy inline payload
//! predicate, content classification, pass reporting types, configuration and
//! error types used by every Atelier migration pass.

pub mod classify;
pub mod config;
pub mod error;
pub mod models;
pub mod pass;
pub mod payload;
pub mod strategy;

// Re-export commonly used types
pub use classify::{ClassCounts, ContentClass, ContentClassifier};
pub use config::{AtelierConfig, CloudinaryConfig, StoreConfig};
pub use error::{AppError, AppResult, FailureScope};
pub use models::{Project, ProjectId, Section, SectionKind};
pub use pass::{DocumentFailure, DocumentOutcome, PassKind, PassState, PassSummary};
pub use payload::{is_legacy_payload, InlinePayload, LEGACY_PAYLOAD_PREFIX};
pub use strategy::Strategy;
