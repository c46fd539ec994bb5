//! Test doubles for the passes.

mod recording_uploader;

pub use recording_uploader::RecordingUploader;

/// A small valid PNG inline payload.
pub fn legacy_png() -> String {
    "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==".to_string()
}
