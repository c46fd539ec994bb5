//! Pass lifecycle and reporting types shared by migrate, verify and cleanup.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::AppError;
use crate::models::{Project, ProjectId};
use crate::strategy::Strategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassKind {
    Migrate,
    Verify,
    Cleanup,
}

impl Display for PassKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PassKind::Migrate => write!(f, "migrate"),
            PassKind::Verify => write!(f, "verify"),
            PassKind::Cleanup => write!(f, "cleanup"),
        }
    }
}

/// Run-level state.
///
/// `Idle -> Connecting -> Scanning -> Disconnected`, or `Failed` when the
/// store connection or stream breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassState {
    Idle,
    Connecting,
    Scanning,
    Disconnected,
    Failed,
}

impl PassState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PassState::Disconnected | PassState::Failed)
    }
}

/// Per-document state within a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOutcome {
    /// No section matched; nothing written.
    Unmodified,
    /// Sections rewritten in memory but not yet written (or a dry run).
    PendingUpdate,
    /// The whole `sections` array was written back.
    Persisted,
}

/// A document the pass abandoned, with enough context to retry it by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub project_id: ProjectId,
    pub project_name: String,
    /// Section that caused the failure; `None` when the write itself failed.
    pub section_index: Option<usize>,
    pub code: String,
    pub message: String,
}

impl DocumentFailure {
    pub fn new(project: &Project, section_index: Option<usize>, error: &AppError) -> Self {
        Self {
            project_id: project.id.clone(),
            project_name: project.name.clone(),
            section_index,
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Final report of a mutating pass. Always produced, even on abort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    pub pass: PassKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    pub dry_run: bool,
    pub state: PassState,
    pub projects_scanned: u64,
    pub projects_modified: u64,
    pub sections_modified: u64,
    pub failures: Vec<DocumentFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
}

impl PassSummary {
    pub fn new(pass: PassKind, strategy: Option<Strategy>, dry_run: bool) -> Self {
        Self {
            pass,
            strategy,
            dry_run,
            state: PassState::Idle,
            projects_scanned: 0,
            projects_modified: 0,
            sections_modified: 0,
            failures: Vec::new(),
            abort_reason: None,
        }
    }

    pub fn projects_failed(&self) -> u64 {
        self.failures.len() as u64
    }

    pub fn record_modified(&mut self, sections: usize) {
        self.projects_modified += 1;
        self.sections_modified += sections as u64;
    }

    /// Count a rewritten document. A pending update only counts in a dry
    /// run; otherwise the write never happened.
    pub fn record_outcome(&mut self, outcome: DocumentOutcome, sections: usize) {
        match outcome {
            DocumentOutcome::Persisted => self.record_modified(sections),
            DocumentOutcome::PendingUpdate if self.dry_run => self.record_modified(sections),
            DocumentOutcome::PendingUpdate | DocumentOutcome::Unmodified => {}
        }
    }

    pub fn record_failure(&mut self, failure: DocumentFailure) {
        self.failures.push(failure);
    }

    pub fn abort(&mut self, reason: impl Into<String>) {
        self.state = PassState::Failed;
        self.abort_reason = Some(reason.into());
    }

    /// Mark the store connection released. An aborted run stays `Failed`.
    pub fn finish(&mut self) {
        if !self.state.is_terminal() {
            self.state = PassState::Disconnected;
        }
    }

    /// True when the run reached the end and no document failed.
    pub fn is_success(&self) -> bool {
        self.state != PassState::Failed && self.failures.is_empty()
    }
}
