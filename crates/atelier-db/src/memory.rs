//! In-memory content store.
//!
//! Keeps projects in insertion order and records every write so tests can
//! assert exactly what a pass persisted. Failure injection covers rejected
//! writes, unreadable documents and a stream that breaks part way.

use crate::traits::{ContentStore, ProjectStream, ScanOptions, StoreError, StoreResult};
use async_trait::async_trait;
use atelier_core::{Project, ProjectId, Section};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MemoryState {
    projects: Vec<Project>,
    unreadable: Vec<ProjectId>,
    writes: Vec<(ProjectId, Vec<Section>)>,
    rejected_writes: HashSet<ProjectId>,
    break_stream_after: Option<usize>,
    offline: bool,
}

/// Ordered in-memory store
#[derive(Clone, Default)]
pub struct MemoryContentStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projects(projects: Vec<Project>) -> Self {
        let store = Self::new();
        for project in projects {
            store.insert(project);
        }
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned lock only happens after a panicking test thread.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, project: Project) {
        self.lock().projects.push(project);
    }

    /// Current copy of a project.
    pub fn get(&self, id: &ProjectId) -> Option<Project> {
        self.lock().projects.iter().find(|p| p.id == *id).cloned()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.lock().projects.clone()
    }

    /// Every successful `replace_sections` call, in order.
    pub fn writes(&self) -> Vec<(ProjectId, Vec<Section>)> {
        self.lock().writes.clone()
    }

    /// Make writes to `id` fail as if the store rejected them.
    pub fn reject_writes_for(&self, id: impl Into<ProjectId>) {
        self.lock().rejected_writes.insert(id.into());
    }

    /// Yield an unreadable document with this id during scans.
    pub fn insert_unreadable(&self, id: impl Into<ProjectId>) {
        self.lock().unreadable.push(id.into());
    }

    /// Break the stream after `count` projects have been yielded.
    pub fn break_stream_after(&self, count: usize) {
        self.lock().break_stream_after = Some(count);
    }

    /// Make every operation fail with a connection error.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn ping(&self) -> StoreResult<()> {
        if self.lock().offline {
            return Err(StoreError::ConnectionFailed("store offline".to_string()));
        }
        Ok(())
    }

    async fn stream_projects(&self, options: &ScanOptions) -> StoreResult<ProjectStream<'_>> {
        let state = self.lock();
        if state.offline {
            return Err(StoreError::ConnectionFailed("store offline".to_string()));
        }

        let selected = |id: &ProjectId| options.project_id.as_ref().map_or(true, |only| only == id);

        let mut items: Vec<StoreResult<Project>> = state
            .projects
            .iter()
            .filter(|p| selected(&p.id))
            .cloned()
            .map(Ok)
            .collect();
        items.extend(
            state
                .unreadable
                .iter()
                .filter(|id| selected(id))
                .map(|id| {
                    Err(StoreError::Unreadable {
                        id: id.to_string(),
                        message: "sections is not an array".to_string(),
                    })
                }),
        );

        if let Some(count) = state.break_stream_after {
            if count < items.len() {
                items.truncate(count);
                items.push(Err(StoreError::QueryFailed("cursor killed".to_string())));
            }
        }

        Ok(Box::pin(futures::stream::iter(items)))
    }

    async fn replace_sections(&self, id: &ProjectId, sections: &[Section]) -> StoreResult<()> {
        let mut state = self.lock();
        if state.offline {
            return Err(StoreError::ConnectionFailed("store offline".to_string()));
        }
        if state.rejected_writes.contains(id) {
            return Err(StoreError::WriteFailed(format!(
                "document failed validation: {}",
                id
            )));
        }

        let project = state
            .projects
            .iter_mut()
            .find(|p| p.id == *id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        project.sections = sections.to_vec();
        state.writes.push((id.clone(), sections.to_vec()));
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
