use std::sync::Arc;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use serde::Serialize;
use tmls_project::ChangeKind;
use tmls_project::DocumentKey;
use tmls_project::DocumentSnapshot;
use tmls_project::HostDocument;
use tmls_project::HostProject;
use tmls_project::ProjectChange;
use tmls_project::ProjectConfiguration;
use tmls_project::ProjectError;
use tmls_project::ProjectKey;
use tmls_project::ProjectSnapshot;
use tmls_project::ProjectWorkspaceState;
use tmls_project::SnapshotStore;
use tmls_project::SubscriptionId;
use tmls_source::Utf8PathClean;
use tokio::sync::broadcast;

use super::TextLoaderFactory;

/// Project that owns documents opened outside every workspace root.
pub const MISC_PROJECT_PATH: &str = "/__tmls_misc__";

const CHANNEL_CAPACITY: usize = 256;

/// A [`ProjectChange`] reduced to what consumers outside the store need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceChange {
    pub kind: ChangeKind,
    pub project_path: Utf8PathBuf,
    pub document_path: Option<Utf8PathBuf>,
}

impl From<&ProjectChange> for WorkspaceChange {
    fn from(change: &ProjectChange) -> Self {
        Self {
            kind: change.kind(),
            project_path: change.project_key().path().to_path_buf(),
            document_path: change.document_path().map(Utf8Path::to_path_buf),
        }
    }
}

/// Editor-facing operations over a [`SnapshotStore`].
///
/// Routes each document path to the project that owns it, creates text
/// loaders for it, and republishes every store change on a broadcast
/// channel.
pub struct ProjectManager {
    store: Arc<SnapshotStore>,
    loaders: Arc<dyn TextLoaderFactory>,
    sender: broadcast::Sender<WorkspaceChange>,
    subscription: SubscriptionId,
    misc: HostProject,
}

impl ProjectManager {
    /// Wraps `store` and registers the miscellaneous-files project in it.
    pub fn new(
        store: Arc<SnapshotStore>,
        loaders: Arc<dyn TextLoaderFactory>,
    ) -> Result<Self, ProjectError> {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let forward = sender.clone();
        let subscription = store.subscribe(Arc::new(move |change: &ProjectChange| {
            // no receivers is fine
            let _ = forward.send(WorkspaceChange::from(change));
        }));

        let misc = HostProject::new(MISC_PROJECT_PATH, ProjectConfiguration::default());
        store.add_project(&misc)?;

        Ok(Self {
            store,
            loaders,
            sender,
            subscription,
            misc,
        })
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WorkspaceChange> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn misc_project(&self) -> &HostProject {
        &self.misc
    }

    pub fn open_project(
        &self,
        root: &Utf8Path,
        configuration: ProjectConfiguration,
    ) -> Result<ProjectSnapshot, ProjectError> {
        let project = HostProject::new(root.clean(), configuration);
        tracing::info!(root = %project.file_path, "opening project");
        self.store.add_project(&project)
    }

    pub fn close_project(&self, root: &Utf8Path) -> Result<ProjectSnapshot, ProjectError> {
        let project = self.host_project(&root.clean())?;
        self.store.remove_project(&project)
    }

    /// The project a new document at `path` belongs to: the innermost
    /// project whose root contains it, or the miscellaneous-files project.
    #[must_use]
    pub fn project_for(&self, path: &Utf8Path) -> HostProject {
        let path = path.clean();
        self.store
            .projects()
            .into_iter()
            .filter(|project| project.key() != &self.misc.key())
            .filter(|project| path.starts_with(project.file_path()))
            .max_by_key(|project| project.file_path().as_str().len())
            .map_or_else(|| self.misc.clone(), |project| project.host_project().clone())
    }

    #[must_use]
    pub fn document_key(&self, path: &Utf8Path) -> Option<DocumentKey> {
        self.store
            .find_document(path)
            .map(|document| document.key().clone())
    }

    /// Adds the document to its project, or moves an already tracked one to
    /// a new version, reading through the loader factory either way.
    pub fn document_opened(&self, path: &Utf8Path) -> Result<DocumentSnapshot, ProjectError> {
        let path = path.clean();
        if let Some(key) = self.document_key(&path) {
            return self
                .store
                .change_document(key.project().path(), &path, self.loaders.create(&path));
        }

        let project = self.project_for(&path);
        let target = path
            .strip_prefix(&project.file_path)
            .map_or_else(|_| path.clone(), Utf8Path::to_path_buf);
        let document = HostDocument::new(path.clone()).with_target_path(target);
        self.store
            .add_document(&project, &document, self.loaders.create(&path))
    }

    pub fn document_changed(&self, path: &Utf8Path) -> Result<DocumentSnapshot, ProjectError> {
        let path = path.clean();
        let key = self.require_key(&path)?;
        self.store
            .change_document(key.project().path(), &path, self.loaders.create(&path))
    }

    /// Documents in the miscellaneous-files project are dropped on close.
    /// Others stay tracked and go back to whatever the loader factory
    /// yields once the buffer is gone.
    pub fn document_closed(
        &self,
        path: &Utf8Path,
    ) -> Result<Option<DocumentSnapshot>, ProjectError> {
        let path = path.clean();
        let key = self.require_key(&path)?;

        if key.project() == &self.misc.key() {
            self.store
                .remove_document(&self.misc, &HostDocument::new(path))?;
            return Ok(None);
        }

        self.store
            .change_document(key.project().path(), &path, self.loaders.create(&path))
            .map(Some)
    }

    /// Applies `configuration` to every project. Projects whose configuration
    /// is already equal are left alone.
    pub fn update_configuration(
        &self,
        configuration: &ProjectConfiguration,
    ) -> Result<Vec<ProjectSnapshot>, ProjectError> {
        self.store
            .projects()
            .into_iter()
            .map(|project| {
                self.store.change_project_configuration(&HostProject::new(
                    project.file_path(),
                    configuration.clone(),
                ))
            })
            .collect()
    }

    pub fn update_workspace_state(
        &self,
        root: &Utf8Path,
        workspace_state: Option<ProjectWorkspaceState>,
    ) -> Result<ProjectSnapshot, ProjectError> {
        self.store
            .change_project_workspace_state(&root.clean(), workspace_state)
    }

    fn host_project(&self, root: &Utf8Path) -> Result<HostProject, ProjectError> {
        self.store
            .project(root)
            .map(|project| project.host_project().clone())
            .ok_or_else(|| ProjectError::UnknownProject(ProjectKey::from_path(root)))
    }

    fn require_key(&self, path: &Utf8Path) -> Result<DocumentKey, ProjectError> {
        self.document_key(path).ok_or_else(|| {
            let owner = self.project_for(path);
            ProjectError::UnknownDocument {
                project: owner.key(),
                document: path.to_path_buf(),
            }
        })
    }
}

impl Drop for ProjectManager {
    fn drop(&mut self) {
        self.store.unsubscribe(self.subscription);
    }
}

impl std::fmt::Debug for ProjectManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectManager")
            .field("loaders", &self.loaders)
            .field("misc", &self.misc.file_path)
            .field("receivers", &self.sender.receiver_count())
            .finish_non_exhaustive()
    }
}
