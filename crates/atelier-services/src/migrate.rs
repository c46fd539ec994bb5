//! Migration pipeline: upload legacy inline payloads and store hosted URLs.

use async_trait::async_trait;
use atelier_core::{AppError, AppResult, InlinePayload, PassKind, PassSummary, Project, Strategy};
use atelier_db::{ContentStore, ScanOptions};
use atelier_storage::{public_id_for, ImageUploader, UploadRequest};
use std::sync::Arc;

use crate::rewrite::{RewritePolicy, RewriteVisitor};
use crate::scan::scan_projects;

const DRY_RUN_MARKER: &str = "<uploaded on migration>";

#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    pub scan: ScanOptions,
    /// Report what would change without uploading or writing.
    pub dry_run: bool,
    /// Decoded payloads above this size fail their project instead of uploading.
    pub max_payload_bytes: Option<usize>,
}

struct UploadPolicy {
    uploader: Arc<dyn ImageUploader>,
    max_payload_bytes: Option<usize>,
}

#[async_trait]
impl RewritePolicy for UploadPolicy {
    async fn replacement(
        &self,
        project: &Project,
        index: usize,
        dry_run: bool,
    ) -> AppResult<String> {
        let payload = InlinePayload::parse(&project.sections[index].content)?;

        if let Some(limit) = self.max_payload_bytes {
            if payload.len() > limit {
                return Err(AppError::PayloadTooLarge {
                    size: payload.len(),
                    limit,
                });
            }
        }

        if dry_run {
            tracing::info!(
                project_id = %project.id,
                section_index = index,
                mime_type = %payload.mime_type,
                size_bytes = payload.len(),
                "Would upload inline image"
            );
            return Ok(DRY_RUN_MARKER.to_string());
        }

        let public_id = public_id_for(&project.id, index);
        let uploaded = self
            .uploader
            .upload(UploadRequest {
                payload: &payload,
                public_id: &public_id,
            })
            .await?;

        tracing::info!(
            project_id = %project.id,
            section_index = index,
            url = %uploaded.url,
            "Inline image uploaded"
        );
        Ok(uploaded.url)
    }
}

/// Replaces every legacy inline payload with a hosted URL.
///
/// Each project is committed with a single whole-array write once all of its
/// payloads uploaded; if any upload fails the project is left as it was and
/// the failure is reported. Already migrated sections no longer match the
/// legacy predicate, so re-running only picks up what is left.
pub struct MigrationPipeline {
    store: Arc<dyn ContentStore>,
    uploader: Arc<dyn ImageUploader>,
    options: MigrationOptions,
}

impl MigrationPipeline {
    pub fn new(
        store: Arc<dyn ContentStore>,
        uploader: Arc<dyn ImageUploader>,
        options: MigrationOptions,
    ) -> Self {
        Self {
            store,
            uploader,
            options,
        }
    }

    #[tracing::instrument(
        skip(self),
        fields(
            pass = "migrate",
            dry_run = self.options.dry_run,
            uploader = self.uploader.backend_name()
        )
    )]
    pub async fn run(&self) -> PassSummary {
        let mut summary = PassSummary::new(
            PassKind::Migrate,
            Some(Strategy::Upload),
            self.options.dry_run,
        );

        if !self.options.dry_run {
            if let Err(e) = self.uploader.ping().await {
                let e = AppError::from(e);
                tracing::error!(error = %e, "Object storage unreachable, nothing migrated");
                summary.abort(e.to_string());
                return summary;
            }
        }

        let policy = UploadPolicy {
            uploader: Arc::clone(&self.uploader),
            max_payload_bytes: self.options.max_payload_bytes,
        };
        let mut visitor =
            RewriteVisitor::new(Arc::clone(&self.store), policy, self.options.dry_run);

        scan_projects(
            self.store.as_ref(),
            &self.options.scan,
            &mut summary,
            &mut visitor,
        )
        .await;

        summary
    }
}
