//! All-or-nothing rewrite of a project's legacy sections.
//!
//! Migration and cleanup differ only in what replaces a legacy payload; both
//! go through `RewriteVisitor`, which applies the policy to every matching
//! section in memory and writes the whole `sections` array back once, or
//! leaves the project untouched.

use async_trait::async_trait;
use atelier_core::{
    AppError, AppResult, DocumentFailure, DocumentOutcome, FailureScope, PassSummary, Project,
};
use atelier_db::ContentStore;
use std::sync::Arc;

use crate::scan::ProjectVisitor;

/// What replaces a legacy payload.
#[async_trait]
pub(crate) trait RewritePolicy: Send + Sync {
    /// Replacement content for `project.sections[index]`.
    ///
    /// With `dry_run` the policy validates what it can but must not call out
    /// to external services.
    async fn replacement(
        &self,
        project: &Project,
        index: usize,
        dry_run: bool,
    ) -> AppResult<String>;

    /// Called once per project after every replacement succeeded and before
    /// the write.
    fn before_commit(&self, _project: &Project, _indices: &[usize], _dry_run: bool) {}
}

pub(crate) struct RewriteVisitor<P> {
    store: Arc<dyn ContentStore>,
    policy: P,
    dry_run: bool,
}

impl<P: RewritePolicy> RewriteVisitor<P> {
    pub(crate) fn new(store: Arc<dyn ContentStore>, policy: P, dry_run: bool) -> Self {
        Self {
            store,
            policy,
            dry_run,
        }
    }

    fn fail(
        summary: &mut PassSummary,
        project: &Project,
        index: Option<usize>,
        error: &AppError,
    ) {
        tracing::warn!(
            project_id = %project.id,
            project_name = %project.name,
            section_index = ?index,
            error = %error,
            "Project left unmodified"
        );
        summary.record_failure(DocumentFailure::new(project, index, error));
    }

    /// Rewrite one project and count its outcome; `None` if it failed.
    async fn rewrite(
        &self,
        project: &Project,
        summary: &mut PassSummary,
    ) -> AppResult<Option<DocumentOutcome>> {
        let indices = project.legacy_section_indices();
        if indices.is_empty() {
            summary.record_outcome(DocumentOutcome::Unmodified, 0);
            return Ok(Some(DocumentOutcome::Unmodified));
        }

        let mut sections = project.sections.clone();
        for &index in &indices {
            match self.policy.replacement(project, index, self.dry_run).await {
                Ok(content) => sections[index].content = content,
                Err(e) if e.scope() == FailureScope::Run => return Err(e),
                Err(e) => {
                    Self::fail(summary, project, Some(index), &e);
                    return Ok(None);
                }
            }
        }

        self.policy.before_commit(project, &indices, self.dry_run);

        if self.dry_run {
            summary.record_outcome(DocumentOutcome::PendingUpdate, indices.len());
            return Ok(Some(DocumentOutcome::PendingUpdate));
        }

        if let Err(e) = self.store.replace_sections(&project.id, &sections).await {
            if !e.is_document_scoped() {
                return Err(e.into());
            }
            Self::fail(summary, project, None, &AppError::from(e));
            return Ok(None);
        }

        summary.record_outcome(DocumentOutcome::Persisted, indices.len());
        Ok(Some(DocumentOutcome::Persisted))
    }
}

#[async_trait]
impl<P: RewritePolicy> ProjectVisitor for RewriteVisitor<P> {
    async fn visit(&mut self, project: Project, summary: &mut PassSummary) -> AppResult<()> {
        if let Some(outcome) = self.rewrite(&project, summary).await? {
            tracing::debug!(
                project_id = %project.id,
                sections = project.sections.len(),
                outcome = ?outcome,
                "Project processed"
            );
        }
        Ok(())
    }
}
