//! Atelier Storage Library
//!
//! This crate provides the object storage abstraction used to host images that
//! were previously embedded in project documents, and its Cloudinary
//! implementation.
//!
//! # Asset naming
//!
//! Uploads go to a configured folder with a deterministic public id
//! `{project_id}_{section_index}`, and overwrite any existing asset with the
//! same id. Re-running an interrupted migration therefore replaces the assets
//! it already uploaded instead of creating duplicates.

#[cfg(feature = "storage-cloudinary")]
pub mod cloudinary;
#[cfg(feature = "storage-cloudinary")]
pub mod factory;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-cloudinary")]
pub use cloudinary::CloudinaryUploader;
#[cfg(feature = "storage-cloudinary")]
pub use factory::create_uploader;
pub use traits::{
    public_id_for, ImageUploader, StorageError, StorageResult, UploadRequest, UploadedImage,
};
