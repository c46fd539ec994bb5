//! Error types module
//!
//! All pass-level failures are unified under `AppError`. Store and object
//! storage crates define their own error enums which are converted into the
//! matching variant at the service boundary.

/// How a failure affects the rest of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    /// The run cannot continue (bad configuration, unreachable service).
    Run,
    /// Only the current document is abandoned; the run moves on.
    Document,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Persist failed: {0}")]
    Persist(String),

    #[error("Invalid inline payload: {0}")]
    InvalidPayload(String),

    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },
}

impl AppError {
    pub fn scope(&self) -> FailureScope {
        match self {
            AppError::Configuration(_) | AppError::Connection(_) => FailureScope::Run,
            AppError::Upload(_)
            | AppError::Persist(_)
            | AppError::InvalidPayload(_)
            | AppError::PayloadTooLarge { .. } => FailureScope::Document,
        }
    }

    /// Machine-readable error code (e.g., "UPLOAD_FAILED")
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Connection(_) => "CONNECTION_ERROR",
            AppError::Upload(_) => "UPLOAD_FAILED",
            AppError::Persist(_) => "PERSIST_FAILED",
            AppError::InvalidPayload(_) => "INVALID_PAYLOAD",
            AppError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_and_configuration_abort_the_run() {
        assert_eq!(
            AppError::Configuration("x".into()).scope(),
            FailureScope::Run
        );
        assert_eq!(AppError::Connection("x".into()).scope(), FailureScope::Run);
    }

    #[test]
    fn per_document_errors_are_document_scoped() {
        assert_eq!(AppError::Upload("x".into()).scope(), FailureScope::Document);
        assert_eq!(AppError::Persist("x".into()).scope(), FailureScope::Document);
        assert_eq!(
            AppError::PayloadTooLarge { size: 2, limit: 1 }.scope(),
            FailureScope::Document
        );
    }

    #[test]
    fn payload_too_large_message() {
        let err = AppError::PayloadTooLarge {
            size: 2048,
            limit: 1024,
        };
        assert_eq!(
            err.to_string(),
            "Payload too large: 2048 bytes exceeds limit of 1024 bytes"
        );
        assert_eq!(err.error_code(), "PAYLOAD_TOO_LARGE");
    }
}
