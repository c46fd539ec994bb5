//! Uploader stub that records every call instead of talking to a service.

use async_trait::async_trait;
use atelier_storage::{ImageUploader, StorageError, StorageResult, UploadRequest, UploadedImage};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// One recorded upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCall {
    pub public_id: String,
    pub mime_type: String,
    pub size: usize,
}

#[derive(Default)]
struct RecordingState {
    calls: Vec<UploadCall>,
    failing: HashSet<String>,
    disconnect_at: Option<String>,
    unreachable: bool,
    pings: usize,
}

#[derive(Clone, Default)]
pub struct RecordingUploader {
    fixed_url: Option<String>,
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingUploader {
    /// Answers with `https://res.cloudinary.com/test/image/upload/<public_id>.<ext>`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every upload with the same URL.
    pub fn returning(url: impl Into<String>) -> Self {
        Self {
            fixed_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Reject uploads for this public id.
    pub fn fail_for(&self, public_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(public_id.to_string());
    }

    /// Fail pings and uploads as if the service could not be reached.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    /// Lose the connection when this public id is uploaded, and stay offline.
    pub fn disconnect_at(&self, public_id: &str) {
        self.state.lock().unwrap().disconnect_at = Some(public_id.to_string());
    }

    /// Upload attempts, including failed ones, in order.
    pub fn calls(&self) -> Vec<UploadCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn pings(&self) -> usize {
        self.state.lock().unwrap().pings
    }
}

#[async_trait]
impl ImageUploader for RecordingUploader {
    async fn upload(&self, request: UploadRequest<'_>) -> StorageResult<UploadedImage> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(UploadCall {
            public_id: request.public_id.to_string(),
            mime_type: request.payload.mime_type.clone(),
            size: request.payload.len(),
        });

        if state.disconnect_at.as_deref() == Some(request.public_id) {
            state.unreachable = true;
        }
        if state.unreachable {
            return Err(StorageError::ConnectionFailed("service unreachable".to_string()));
        }
        if state.failing.contains(request.public_id) {
            return Err(StorageError::Rejected {
                status: 400,
                message: "Invalid image file".to_string(),
            });
        }

        let url = self.fixed_url.clone().unwrap_or_else(|| {
            format!(
                "https://res.cloudinary.com/test/image/upload/{}.{}",
                request.public_id,
                request.payload.extension()
            )
        });
        Ok(UploadedImage {
            url,
            public_id: request.public_id.to_string(),
            bytes: request.payload.len() as u64,
        })
    }

    async fn ping(&self) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        state.pings += 1;
        if state.unreachable {
            return Err(StorageError::ConnectionFailed("service unreachable".to_string()));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}
