//! Read-only audit of section content.

use async_trait::async_trait;
use atelier_core::{
    AppResult, ClassCounts, ContentClass, ContentClassifier, PassKind, PassState, PassSummary,
    Project, ProjectId,
};
use atelier_db::{ContentStore, ScanOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::scan::{scan_projects, ProjectVisitor};

/// Section counts for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectAudit {
    pub project_id: ProjectId,
    pub name: String,
    pub counts: ClassCounts,
    /// Indices of sections that still hold an inline payload.
    pub legacy_sections: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub summary: PassSummary,
    pub totals: ClassCounts,
    pub projects: Vec<ProjectAudit>,
}

impl VerificationReport {
    /// Projects that still contain at least one legacy payload.
    pub fn remaining(&self) -> impl Iterator<Item = &ProjectAudit> {
        self.projects
            .iter()
            .filter(|audit| !audit.legacy_sections.is_empty())
    }

    /// The whole store was read, every document could be checked and none
    /// holds a legacy payload.
    pub fn is_complete(&self) -> bool {
        self.summary.state != PassState::Failed
            && self.summary.failures.is_empty()
            && self.totals.legacy_payload == 0
    }
}

struct AuditVisitor<'a> {
    classifier: &'a ContentClassifier,
    totals: ClassCounts,
    projects: Vec<ProjectAudit>,
}

#[async_trait]
impl<'a> ProjectVisitor for AuditVisitor<'a> {
    async fn visit(&mut self, project: Project, _summary: &mut PassSummary) -> AppResult<()> {
        let mut counts = ClassCounts::default();
        let mut legacy_sections = Vec::new();

        for (index, section) in project.sections.iter().enumerate() {
            let class = self.classifier.classify(&section.content);
            if class == Some(ContentClass::LegacyPayload) {
                legacy_sections.push(index);
            }
            counts.record(class);
        }

        if !legacy_sections.is_empty() {
            tracing::info!(
                project_id = %project.id,
                project_name = %project.name,
                legacy_sections = ?legacy_sections,
                "Legacy payloads remain"
            );
        }

        self.totals.merge(&counts);
        self.projects.push(ProjectAudit {
            project_id: project.id,
            name: project.name,
            counts,
            legacy_sections,
        });
        Ok(())
    }
}

/// Classifies every section without writing anything.
pub struct VerificationPass {
    store: Arc<dyn ContentStore>,
    classifier: ContentClassifier,
    scan: ScanOptions,
}

impl VerificationPass {
    pub fn new(
        store: Arc<dyn ContentStore>,
        classifier: ContentClassifier,
        scan: ScanOptions,
    ) -> Self {
        Self {
            store,
            classifier,
            scan,
        }
    }

    #[tracing::instrument(skip(self), fields(pass = "verify"))]
    pub async fn run(&self) -> VerificationReport {
        let mut summary = PassSummary::new(PassKind::Verify, None, false);
        let mut visitor = AuditVisitor {
            classifier: &self.classifier,
            totals: ClassCounts::default(),
            projects: Vec::new(),
        };

        scan_projects(self.store.as_ref(), &self.scan, &mut summary, &mut visitor).await;

        tracing::info!(
            sections = visitor.totals.total(),
            hosted_url = visitor.totals.hosted_url,
            legacy_payload = visitor.totals.legacy_payload,
            placeholder = visitor.totals.placeholder,
            other = visitor.totals.other,
            empty = visitor.totals.empty,
            "Verification totals"
        );

        VerificationReport {
            summary,
            totals: visitor.totals,
            projects: visitor.projects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::legacy_png;
    use atelier_core::Section;
    use atelier_db::MemoryContentStore;

    fn verify(store: &MemoryContentStore) -> VerificationPass {
        VerificationPass::new(
            Arc::new(store.clone()),
            ContentClassifier::default(),
            ScanOptions::default(),
        )
    }

    #[tokio::test]
    async fn counts_one_of_each_class() {
        let store = MemoryContentStore::with_projects(vec![Project::new(
            "a",
            "Alpha",
            vec![
                Section::image("https://res.cloudinary.com/studio/image/upload/a.png"),
                Section::image(legacy_png()),
                Section::gif("[image removed]"),
                Section::text("Concrete and light"),
            ],
        )]);

        let report = verify(&store).run().await;

        assert_eq!(
            report.totals,
            ClassCounts {
                hosted_url: 1,
                legacy_payload: 1,
                placeholder: 1,
                other: 1,
                empty: 0,
            }
        );
        assert!(!report.is_complete());
        let remaining: Vec<_> = report.remaining().collect();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].project_id, ProjectId::from("a"));
        assert_eq!(remaining[0].legacy_sections, vec![1]);
    }

    #[tokio::test]
    async fn empty_content_is_counted_apart() {
        let store = MemoryContentStore::with_projects(vec![Project::new(
            "a",
            "Alpha",
            vec![Section::image(""), Section::text("")],
        )]);

        let report = verify(&store).run().await;

        assert_eq!(report.totals.empty, 2);
        assert_eq!(report.totals.total(), 2);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn never_writes() {
        let store = MemoryContentStore::with_projects(vec![
            Project::new("a", "Alpha", vec![Section::image(legacy_png())]),
            Project::new("b", "Beta", vec![Section::text("x")]),
        ]);
        let before = store.projects();

        let report = verify(&store).run().await;

        assert_eq!(report.summary.projects_scanned, 2);
        assert_eq!(report.projects.len(), 2);
        assert!(store.writes().is_empty());
        assert_eq!(store.projects(), before);
    }

    #[tokio::test]
    async fn aborted_scan_is_not_complete() {
        let store = MemoryContentStore::with_projects(vec![
            Project::new("a", "Alpha", vec![Section::text("x")]),
            Project::new("b", "Beta", vec![Section::text("y")]),
        ]);
        store.break_stream_after(1);

        let report = verify(&store).run().await;

        assert_eq!(report.summary.state, PassState::Failed);
        assert_eq!(report.totals.legacy_payload, 0);
        assert_eq!(report.projects.len(), 1);
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn unreadable_document_blocks_completion() {
        let store = MemoryContentStore::with_projects(vec![Project::new(
            "a",
            "Alpha",
            vec![Section::text("x")],
        )]);
        store.insert_unreadable("broken");

        let report = verify(&store).run().await;

        assert_eq!(report.summary.failures.len(), 1);
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn report_serializes_for_json_output() {
        let store = MemoryContentStore::with_projects(vec![Project::new(
            "a",
            "Alpha",
            vec![Section::image(legacy_png())],
        )]);

        let report = verify(&store).run().await;
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["summary"]["pass"], "verify");
        assert_eq!(json["totals"]["legacy_payload"], 1);
        assert_eq!(json["projects"][0]["legacy_sections"][0], 0);
    }
}
