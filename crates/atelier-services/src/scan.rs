//! Document iteration shared by every pass.

use async_trait::async_trait;
use atelier_core::{
    AppError, AppResult, DocumentFailure, FailureScope, PassState, PassSummary, Project, ProjectId,
};
use atelier_db::{ContentStore, ScanOptions, StoreError};
use futures::StreamExt;

/// Per-project work of a pass.
#[async_trait]
pub(crate) trait ProjectVisitor: Send {
    /// Handle one project. Document-scoped problems are recorded on `summary`
    /// and return `Ok`; an `Err` with run scope aborts the scan.
    async fn visit(&mut self, project: Project, summary: &mut PassSummary) -> AppResult<()>;
}

/// Stream every selected project through `visitor`, one at a time.
///
/// Unreadable documents are recorded as failures and skipped. A broken stream
/// or a run-scoped visitor error moves the summary to `Failed`, keeping the
/// counts gathered so far.
pub(crate) async fn scan_projects<V: ProjectVisitor>(
    store: &dyn ContentStore,
    options: &ScanOptions,
    summary: &mut PassSummary,
    visitor: &mut V,
) {
    summary.state = PassState::Scanning;
    tracing::info!(
        pass = %summary.pass,
        backend = store.backend_name(),
        batch_size = options.batch_size,
        project_id = ?options.project_id,
        "Scanning projects"
    );

    let mut stream = match store.stream_projects(options).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open project stream");
            summary.abort(AppError::from(e).to_string());
            return;
        }
    };

    while let Some(item) = stream.next().await {
        let project = match item {
            Ok(project) => project,
            Err(StoreError::Unreadable { id, message }) => {
                summary.projects_scanned += 1;
                tracing::warn!(project_id = %id, error = %message, "Skipping unreadable project");
                summary.record_failure(DocumentFailure {
                    project_id: ProjectId::new(id),
                    project_name: String::new(),
                    section_index: None,
                    code: "UNREADABLE_DOCUMENT".to_string(),
                    message,
                });
                continue;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    projects_scanned = summary.projects_scanned,
                    "Project stream broke, aborting pass"
                );
                summary.abort(AppError::from(e).to_string());
                return;
            }
        };

        summary.projects_scanned += 1;
        let project_id = project.id.clone();

        if let Err(e) = visitor.visit(project, summary).await {
            match e.scope() {
                FailureScope::Run => {
                    tracing::error!(
                        error = %e,
                        project_id = %project_id,
                        "Pass aborted"
                    );
                    summary.abort(e.to_string());
                    return;
                }
                FailureScope::Document => {
                    // Visitors record their own document failures; this only
                    // catches ones that slipped through.
                    tracing::warn!(error = %e, project_id = %project_id, "Project skipped");
                    summary.record_failure(DocumentFailure {
                        project_id,
                        project_name: String::new(),
                        section_index: None,
                        code: e.error_code().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    tracing::info!(
        pass = %summary.pass,
        projects_scanned = summary.projects_scanned,
        projects_modified = summary.projects_modified,
        sections_modified = summary.sections_modified,
        projects_failed = summary.projects_failed(),
        "Scan finished"
    );
}
