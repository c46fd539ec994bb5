//! Configuration module
//!
//! Connection parameters for the content store and object storage, plus the
//! markers and size policy used by the passes. Values come from environment
//! variables (optionally loaded from `.env`). Validation happens here, before
//! any connection is attempted.

use std::env;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::classify::{DEFAULT_HOSTED_URL_MARKER, DEFAULT_PLACEHOLDER_MARKER};
use crate::error::{AppError, AppResult};

const DEFAULT_COLLECTION: &str = "projects";
const DEFAULT_CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com";
const DEFAULT_CLOUDINARY_FOLDER: &str = "atelier/projects";
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 60;

/// Content store connection settings.
#[derive(Clone)]
pub struct StoreConfig {
    pub uri: String,
    /// Database name; falls back to the database named in the URI.
    pub database: Option<String>,
    pub collection: String,
}

impl Debug for StoreConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        // The URI usually embeds credentials.
        f.debug_struct("StoreConfig")
            .field("uri", &"<redacted>")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .finish()
    }
}

/// Cloudinary account settings.
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base: String,
    pub folder: String,
    pub timeout_secs: u64,
}

impl Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("folder", &self.folder)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct AtelierConfig {
    pub store: StoreConfig,
    /// Present only when Cloudinary credentials are configured.
    pub cloudinary: Option<CloudinaryConfig>,
    pub hosted_url_marker: String,
    pub placeholder_marker: String,
    /// Decoded payloads above this size are not uploaded.
    pub max_payload_bytes: Option<usize>,
}

impl AtelierConfig {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let uri = var("MONGODB_URI")
            .or_else(|| var("DATABASE_URL"))
            .ok_or_else(|| {
                AppError::Configuration("MONGODB_URI or DATABASE_URL must be set".to_string())
            })?;

        let store = StoreConfig {
            uri,
            database: var("MONGODB_DATABASE"),
            collection: var("PROJECTS_COLLECTION")
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
        };

        let cloudinary = Self::cloudinary_from_lookup(&var)?;

        let max_payload_bytes = match var("MAX_PAYLOAD_BYTES") {
            Some(raw) => Some(parse_positive("MAX_PAYLOAD_BYTES", &raw)?),
            None => None,
        };

        Ok(Self {
            store,
            cloudinary,
            hosted_url_marker: var("HOSTED_URL_MARKER")
                .unwrap_or_else(|| DEFAULT_HOSTED_URL_MARKER.to_string()),
            placeholder_marker: var("PLACEHOLDER_MARKER")
                .unwrap_or_else(|| DEFAULT_PLACEHOLDER_MARKER.to_string()),
            max_payload_bytes,
        })
    }

    fn cloudinary_from_lookup<F>(var: &F) -> AppResult<Option<CloudinaryConfig>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (cloud_name, api_key, api_secret) = match var("CLOUDINARY_URL") {
            Some(url) => {
                let (key, secret, cloud) = parse_cloudinary_url(&url)?;
                (Some(cloud), Some(key), Some(secret))
            }
            None => (
                var("CLOUDINARY_CLOUD_NAME"),
                var("CLOUDINARY_API_KEY"),
                var("CLOUDINARY_API_SECRET"),
            ),
        };

        let (cloud_name, api_key, api_secret) = match (cloud_name, api_key, api_secret) {
            (None, None, None) => return Ok(None),
            (Some(cloud_name), Some(api_key), Some(api_secret)) => {
                (cloud_name, api_key, api_secret)
            }
            (cloud_name, api_key, api_secret) => {
                let missing: Vec<&str> = [
                    ("CLOUDINARY_CLOUD_NAME", cloud_name.is_none()),
                    ("CLOUDINARY_API_KEY", api_key.is_none()),
                    ("CLOUDINARY_API_SECRET", api_secret.is_none()),
                ]
                .into_iter()
                .filter(|(_, missing)| *missing)
                .map(|(name, _)| name)
                .collect();
                return Err(AppError::Configuration(format!(
                    "Incomplete Cloudinary configuration, missing: {}",
                    missing.join(", ")
                )));
            }
        };

        let timeout_secs = match var("UPLOAD_TIMEOUT_SECS") {
            Some(raw) => parse_positive::<u64>("UPLOAD_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_UPLOAD_TIMEOUT_SECS,
        };

        Ok(Some(CloudinaryConfig {
            cloud_name,
            api_key,
            api_secret,
            api_base: var("CLOUDINARY_API_BASE")
                .unwrap_or_else(|| DEFAULT_CLOUDINARY_API_BASE.to_string()),
            folder: var("CLOUDINARY_FOLDER")
                .unwrap_or_else(|| DEFAULT_CLOUDINARY_FOLDER.to_string()),
            timeout_secs,
        }))
    }

    /// Cloudinary settings, or a configuration error for commands that upload.
    pub fn require_cloudinary(&self) -> AppResult<&CloudinaryConfig> {
        self.cloudinary.as_ref().ok_or_else(|| {
            AppError::Configuration(
                "CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET \
                 (or CLOUDINARY_URL) must be set"
                    .to_string(),
            )
        })
    }
}

/// Parse a count that must be at least one.
fn parse_positive<T>(key: &str, raw: &str) -> AppResult<T>
where
    T: FromStr + PartialOrd + From<u8>,
{
    match raw.parse::<T>() {
        Ok(value) if value >= T::from(1) => Ok(value),
        _ => Err(AppError::Configuration(format!(
            "{} must be a positive integer, got '{}'",
            key, raw
        ))),
    }
}

/// Split `cloudinary://<key>:<secret>@<cloud>` into its parts.
fn parse_cloudinary_url(url: &str) -> AppResult<(String, String, String)> {
    let invalid = || {
        AppError::Configuration(
            "CLOUDINARY_URL must look like cloudinary://<api_key>:<api_secret>@<cloud_name>"
                .to_string(),
        )
    };

    let rest = url.strip_prefix("cloudinary://").ok_or_else(invalid)?;
    let (credentials, cloud) = rest.rsplit_once('@').ok_or_else(invalid)?;
    let (key, secret) = credentials.split_once(':').ok_or_else(invalid)?;
    let cloud = cloud.trim_end_matches('/');

    if key.is_empty() || secret.is_empty() || cloud.is_empty() {
        return Err(invalid());
    }

    Ok((key.to_string(), secret.to_string(), cloud.to_string()))
}
