//! Legacy inline image payloads.
//!
//! Older project records embed images directly in section content as base64
//! data URIs (`data:image/png;base64,...`). `is_legacy_payload` is the single
//! predicate every pass uses to decide whether a section is touched.

use base64::{engine::general_purpose, Engine as _};

use crate::error::{AppError, AppResult};

/// Prefix identifying an embedded base64 image.
pub const LEGACY_PAYLOAD_PREFIX: &str = "data:image/";

/// Returns true when `content` is a legacy inline image payload.
pub fn is_legacy_payload(content: &str) -> bool {
    content.starts_with(LEGACY_PAYLOAD_PREFIX)
}

/// A decoded inline image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlinePayload {
    /// MIME type from the data URI header, e.g. `image/png`.
    pub mime_type: String,
    /// Decoded image bytes.
    pub data: Vec<u8>,
}

impl InlinePayload {
    /// Parse and decode a data URI.
    ///
    /// Fails with `InvalidPayload` when the content does not match the legacy
    /// prefix, is not base64 encoded, or does not decode.
    pub fn parse(content: &str) -> AppResult<Self> {
        if !is_legacy_payload(content) {
            return Err(AppError::InvalidPayload(
                "content is not an inline image data URI".to_string(),
            ));
        }

        let (header, encoded) = content.split_once(',').ok_or_else(|| {
            AppError::InvalidPayload("data URI has no ',' separating header and data".to_string())
        })?;

        let header = &header["data:".len()..];
        let mut params = header.split(';');
        let mime_type = params.next().unwrap_or_default().trim().to_lowercase();
        if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(AppError::InvalidPayload(format!(
                "data URI for {} is not base64 encoded",
                mime_type
            )));
        }

        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let data = general_purpose::STANDARD
            .decode(&compact)
            .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(compact.trim_end_matches('=')))
            .map_err(|e| AppError::InvalidPayload(format!("base64 decode failed: {}", e)))?;

        if data.is_empty() {
            return Err(AppError::InvalidPayload("data URI carries no image bytes".to_string()));
        }

        Ok(Self { mime_type, data })
    }

    /// File extension matching the MIME type, used when naming uploads.
    pub fn extension(&self) -> &str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/svg+xml" => "svg",
            "image/avif" => "avif",
            "image/bmp" => "bmp",
            _ => "bin",
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
