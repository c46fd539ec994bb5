use crate::{CloudinaryUploader, ImageUploader, StorageError, StorageResult};
use atelier_core::AtelierConfig;
use std::sync::Arc;

/// Create the image uploader based on configuration
pub fn create_uploader(config: &AtelierConfig) -> StorageResult<Arc<dyn ImageUploader>> {
    let cloudinary = config
        .require_cloudinary()
        .map_err(|e| StorageError::ConfigError(e.to_string()))?;

    let uploader = CloudinaryUploader::new(cloudinary)?;
    tracing::debug!(uploader = ?uploader, "Image uploader configured");
    Ok(Arc::new(uploader))
}
