use std::collections::BTreeMap;
use std::sync::Arc;

use camino::Utf8Path;
use camino::Utf8PathBuf;

use crate::DocumentSnapshot;
use crate::HostProject;
use crate::ProjectConfiguration;
use crate::ProjectKey;
use crate::ProjectWorkspaceState;

/// Immutable state of one project and all of its documents.
///
/// Every change to the project or any of its documents produces a new
/// snapshot with a higher [`version`](Self::version). Old snapshots stay
/// valid for as long as someone holds them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSnapshot(Arc<ProjectState>);

#[derive(Debug, Clone, PartialEq, Eq)]
struct ProjectState {
    key: ProjectKey,
    host_project: HostProject,
    workspace_state: Option<ProjectWorkspaceState>,
    version: u64,
    documents: BTreeMap<Utf8PathBuf, DocumentSnapshot>,
}

impl ProjectSnapshot {
    pub(crate) fn new(host_project: HostProject) -> Self {
        Self(Arc::new(ProjectState {
            key: host_project.key(),
            host_project,
            workspace_state: None,
            version: 0,
            documents: BTreeMap::new(),
        }))
    }

    fn next(&self, update: impl FnOnce(&mut ProjectState)) -> Self {
        let mut state = (*self.0).clone();
        state.version += 1;
        update(&mut state);
        Self(Arc::new(state))
    }

    pub(crate) fn with_host_project(&self, host_project: HostProject) -> Self {
        let configuration = host_project.configuration.clone();
        self.next(|state| {
            state.host_project = host_project;
            for document in state.documents.values_mut() {
                *document = document.with_configuration(configuration.clone());
            }
        })
    }

    pub(crate) fn with_workspace_state(
        &self,
        workspace_state: Option<ProjectWorkspaceState>,
    ) -> Self {
        self.next(|state| state.workspace_state = workspace_state)
    }

    pub(crate) fn with_document(&self, document: DocumentSnapshot) -> Self {
        self.next(|state| {
            state
                .documents
                .insert(document.file_path().to_path_buf(), document);
        })
    }

    pub(crate) fn without_document(&self, path: &Utf8Path) -> Self {
        self.next(|state| {
            state.documents.remove(path);
        })
    }

    #[must_use]
    pub fn key(&self) -> &ProjectKey {
        &self.0.key
    }

    #[must_use]
    pub fn host_project(&self) -> &HostProject {
        &self.0.host_project
    }

    #[must_use]
    pub fn file_path(&self) -> &Utf8Path {
        self.0.key.path()
    }

    #[must_use]
    pub fn configuration(&self) -> &ProjectConfiguration {
        &self.0.host_project.configuration
    }

    #[must_use]
    pub fn workspace_state(&self) -> Option<&ProjectWorkspaceState> {
        self.0.workspace_state.as_ref()
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.0.version
    }

    #[must_use]
    pub fn document(&self, path: &Utf8Path) -> Option<&DocumentSnapshot> {
        self.0.documents.get(path)
    }

    /// Documents in path order.
    pub fn documents(&self) -> impl Iterator<Item = &DocumentSnapshot> {
        self.0.documents.values()
    }

    #[must_use]
    pub fn document_count(&self) -> usize {
        self.0.documents.len()
    }

    #[must_use]
    pub fn contains_document(&self, path: &Utf8Path) -> bool {
        self.0.documents.contains_key(path)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
