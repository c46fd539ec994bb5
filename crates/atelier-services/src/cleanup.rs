//! Cleanup pass: discard legacy inline payloads without uploading them.

use async_trait::async_trait;
use atelier_core::{is_legacy_payload, AppResult, PassKind, PassSummary, Project, Strategy};
use atelier_db::{ContentStore, ScanOptions};
use std::sync::Arc;

use crate::rewrite::{RewritePolicy, RewriteVisitor};
use crate::scan::scan_projects;

#[derive(Debug, Clone, Default)]
pub struct CleanupOptions {
    pub scan: ScanOptions,
    pub dry_run: bool,
    /// Content written in place of a discarded payload. Empty by default.
    pub replacement: String,
}

struct DiscardPolicy {
    replacement: String,
}

#[async_trait]
impl RewritePolicy for DiscardPolicy {
    async fn replacement(
        &self,
        _project: &Project,
        _index: usize,
        _dry_run: bool,
    ) -> AppResult<String> {
        Ok(self.replacement.clone())
    }

    fn before_commit(&self, project: &Project, indices: &[usize], dry_run: bool) {
        for &index in indices {
            let section = &project.sections[index];
            tracing::warn!(
                project_id = %project.id,
                project_name = %project.name,
                section_index = index,
                section_type = %section.kind.as_str(),
                payload_length = section.content.len(),
                dry_run,
                "Discarding inline image payload"
            );
        }
    }
}

/// Replaces every legacy inline payload with a fixed string.
///
/// Destructive: the image data is gone once a project is committed. Each
/// discarded section is logged before its project is written.
pub struct CleanupPass {
    store: Arc<dyn ContentStore>,
    options: CleanupOptions,
}

impl CleanupPass {
    pub fn new(store: Arc<dyn ContentStore>, options: CleanupOptions) -> Self {
        Self { store, options }
    }

    #[tracing::instrument(skip(self), fields(pass = "cleanup", dry_run = self.options.dry_run))]
    pub async fn run(&self) -> PassSummary {
        let mut summary = PassSummary::new(
            PassKind::Cleanup,
            Some(Strategy::Discard),
            self.options.dry_run,
        );

        // A replacement matching the legacy prefix would be picked up again on the next run.
        if is_legacy_payload(&self.options.replacement) {
            summary.abort("cleanup replacement must not be an inline image payload");
            return summary;
        }

        if !self.options.dry_run {
            tracing::warn!(
                replacement = %self.options.replacement,
                "Cleanup permanently discards inline image data"
            );
        }

        let policy = DiscardPolicy {
            replacement: self.options.replacement.clone(),
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
