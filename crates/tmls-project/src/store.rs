use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::TryLockError;

use camino::Utf8Path;
use tmls_codegen::DocumentGenerator;
use tmls_source::TextLoader;
use tmls_source::Utf8PathClean;

use crate::ChangeBus;
use crate::DocumentKey;
use crate::DocumentSnapshot;
use crate::HostDocument;
use crate::HostProject;
use crate::ProjectChange;
use crate::ProjectChangeListener;
use crate::ProjectError;
use crate::ProjectKey;
use crate::ProjectSnapshot;
use crate::ProjectWorkspaceState;
use crate::SubscriptionId;

/// One immutable root: every project the store knows about.
///
/// Cloning is cheap. A `StoreState` obtained from [`SnapshotStore::state`]
/// never changes, so several lookups against it always agree with each
/// other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    projects: Arc<BTreeMap<ProjectKey, ProjectSnapshot>>,
}

impl StoreState {
    #[must_use]
    pub fn project(&self, key: &ProjectKey) -> Option<&ProjectSnapshot> {
        self.projects.get(key)
    }

    /// Projects in key order.
    pub fn projects(&self) -> impl Iterator<Item = &ProjectSnapshot> {
        self.projects.values()
    }

    #[must_use]
    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    #[must_use]
    pub fn document(&self, key: &DocumentKey) -> Option<&DocumentSnapshot> {
        self.projects.get(key.project())?.document(key.path())
    }

    /// The project that owns `path`, if any.
    #[must_use]
    pub fn owner_of(&self, path: &Utf8Path) -> Option<&ProjectSnapshot> {
        self.projects
            .values()
            .find(|project| project.contains_document(path))
    }

    #[must_use]
    pub fn find_document(&self, path: &Utf8Path) -> Option<&DocumentSnapshot> {
        let path = path.clean();
        self.owner_of(&path)?.document(&path)
    }

    fn with_project(&self, project: ProjectSnapshot) -> Self {
        let mut projects = (*self.projects).clone();
        projects.insert(project.key().clone(), project);
        Self {
            projects: Arc::new(projects),
        }
    }

    fn without_project(&self, key: &ProjectKey) -> Self {
        let mut projects = (*self.projects).clone();
        projects.remove(key);
        Self {
            projects: Arc::new(projects),
        }
    }

    fn require_project(&self, key: &ProjectKey) -> Result<&ProjectSnapshot, ProjectError> {
        self.project(key)
            .ok_or_else(|| ProjectError::UnknownProject(key.clone()))
    }
}

/// What a mutation decided to do.
enum Outcome<T> {
    Applied {
        state: StoreState,
        change: ProjectChange,
        value: T,
    },
    Unchanged(T),
}

/// Clears the notifying flag even if a listener panics.
struct NotifyingGuard<'a>(&'a AtomicBool);

impl NotifyingGuard<'_> {
    fn set(flag: &AtomicBool) -> NotifyingGuard<'_> {
        flag.store(true, Ordering::Release);
        NotifyingGuard(flag)
    }
}

impl Drop for NotifyingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The single mutable authority over project and document snapshots.
///
/// Mutations are serialized. Each successful mutation installs a new
/// [`StoreState`] in one step and then notifies subscribers, synchronously,
/// before returning. Readers never block on listener delivery.
///
/// Delivery happens under the writer lock. A mutation attempted while
/// changes are being delivered fails with [`ProjectError::Reentrancy`],
/// whether it comes from the listener itself or from a thread the listener
/// waits on.
#[derive(Debug)]
pub struct SnapshotStore {
    state: RwLock<StoreState>,
    writer: Mutex<()>,
    notifying: AtomicBool,
    bus: ChangeBus,
    generator: Arc<dyn DocumentGenerator>,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(generator: Arc<dyn DocumentGenerator>) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            writer: Mutex::new(()),
            notifying: AtomicBool::new(false),
            bus: ChangeBus::new(),
            generator,
        }
    }

    #[must_use]
    pub fn state(&self) -> StoreState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn project(&self, path: &Utf8Path) -> Option<ProjectSnapshot> {
        self.state().project(&ProjectKey::from_path(path)).cloned()
    }

    #[must_use]
    pub fn projects(&self) -> Vec<ProjectSnapshot> {
        self.state().projects().cloned().collect()
    }

    #[must_use]
    pub fn document(&self, project_path: &Utf8Path, document_path: &Utf8Path) -> Option<DocumentSnapshot> {
        let key = DocumentKey::new(ProjectKey::from_path(project_path), document_path);
        self.state().document(&key).cloned()
    }

    pub fn require_document(&self, key: &DocumentKey) -> Result<DocumentSnapshot, ProjectError> {
        self.state()
            .document(key)
            .cloned()
            .ok_or_else(|| ProjectError::unknown_document(key))
    }

    #[must_use]
    pub fn find_document(&self, path: &Utf8Path) -> Option<DocumentSnapshot> {
        self.state().find_document(path).cloned()
    }

    pub fn subscribe(&self, listener: Arc<dyn ProjectChangeListener>) -> SubscriptionId {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn add_project(&self, host_project: &HostProject) -> Result<ProjectSnapshot, ProjectError> {
        self.mutate("add_project", |state| {
            let key = host_project.key();
            if state.project(&key).is_some() {
                return Err(ProjectError::DuplicateProject(key));
            }

            let newer = ProjectSnapshot::new(host_project.clone());
            Ok(Outcome::Applied {
                state: state.with_project(newer.clone()),
                change: ProjectChange::ProjectAdded {
                    newer: newer.clone(),
                },
                value: newer,
            })
        })
    }

    /// Removes the project and every document it owns.
    pub fn remove_project(
        &self,
        host_project: &HostProject,
    ) -> Result<ProjectSnapshot, ProjectError> {
        self.mutate("remove_project", |state| {
            let key = host_project.key();
            let older = state.require_project(&key)?.clone();

            Ok(Outcome::Applied {
                state: state.without_project(&key),
                change: ProjectChange::ProjectRemoved {
                    older: older.clone(),
                },
                value: older,
            })
        })
    }

    /// Replaces the project's configuration.
    ///
    /// An equal configuration is a no-op that returns the current snapshot
    /// and emits nothing. Otherwise every document keeps its version and
    /// text but loses its generated document.
    pub fn change_project_configuration(
        &self,
        host_project: &HostProject,
    ) -> Result<ProjectSnapshot, ProjectError> {
        self.mutate("change_project_configuration", |state| {
            let older = state.require_project(&host_project.key())?.clone();
            if older.configuration() == &host_project.configuration {
                return Ok(Outcome::Unchanged(older));
            }

            let newer = older.with_host_project(host_project.clone());
            Ok(Outcome::Applied {
                state: state.with_project(newer.clone()),
                change: ProjectChange::ProjectChanged {
                    older,
                    newer: newer.clone(),
                },
                value: newer,
            })
        })
    }

    pub fn change_project_workspace_state(
        &self,
        project_path: &Utf8Path,
        workspace_state: Option<ProjectWorkspaceState>,
    ) -> Result<ProjectSnapshot, ProjectError> {
        self.mutate("change_project_workspace_state", |state| {
            let older = state
                .require_project(&ProjectKey::from_path(project_path))?
                .clone();
            if older.workspace_state() == workspace_state.as_ref() {
                return Ok(Outcome::Unchanged(older));
            }

            let newer = older.with_workspace_state(workspace_state);
            Ok(Outcome::Applied {
                state: state.with_project(newer.clone()),
                change: ProjectChange::ProjectChanged {
                    older,
                    newer: newer.clone(),
                },
                value: newer,
            })
        })
    }

    /// Adds a document at version 0.
    ///
    /// A path may belong to only one project at a time.
    pub fn add_document(
        &self,
        host_project: &HostProject,
        host_document: &HostDocument,
        loader: Arc<dyn TextLoader>,
    ) -> Result<DocumentSnapshot, ProjectError> {
        self.mutate("add_document", |state| {
            let older = state.require_project(&host_project.key())?.clone();
            let key = DocumentKey::new(older.key().clone(), host_document.file_path());

            if let Some(owner) = state.owner_of(key.path()) {
                return Err(ProjectError::DuplicateDocument {
                    document: key.path().to_path_buf(),
                    owner: owner.key().clone(),
                });
            }

            let document = DocumentSnapshot::new(
                key.clone(),
                host_document.clone(),
                loader,
                older.configuration().clone(),
                Arc::clone(&self.generator),
            );
            let newer = older.with_document(document.clone());
            Ok(Outcome::Applied {
                state: state.with_project(newer.clone()),
                change: ProjectChange::DocumentAdded {
                    document: key,
                    older,
                    newer,
                },
                value: document,
            })
        })
    }

    /// Advances a document to its next version with new content.
    pub fn change_document(
        &self,
        project_path: &Utf8Path,
        document_path: &Utf8Path,
        loader: Arc<dyn TextLoader>,
    ) -> Result<DocumentSnapshot, ProjectError> {
        self.mutate("change_document", |state| {
            let key = DocumentKey::new(ProjectKey::from_path(project_path), document_path);
            let older = state
                .project(key.project())
                .ok_or_else(|| ProjectError::unknown_document(&key))?
                .clone();
            let current = older
                .document(key.path())
                .ok_or_else(|| ProjectError::unknown_document(&key))?;

            let document = current.with_loader(loader);
            let newer = older.with_document(document.clone());
            Ok(Outcome::Applied {
                state: state.with_project(newer.clone()),
                change: ProjectChange::DocumentChanged {
                    document: key,
                    older,
                    newer,
                },
                value: document,
            })
        })
    }

    pub fn remove_document(
        &self,
        host_project: &HostProject,
        host_document: &HostDocument,
    ) -> Result<DocumentSnapshot, ProjectError> {
        self.mutate("remove_document", |state| {
            let key = DocumentKey::new(host_project.key(), host_document.file_path());
            let older = state
                .project(key.project())
                .ok_or_else(|| ProjectError::unknown_document(&key))?
                .clone();
            let document = older
                .document(key.path())
                .ok_or_else(|| ProjectError::unknown_document(&key))?
                .clone();

            let newer = older.without_document(key.path());
            Ok(Outcome::Applied {
                state: state.with_project(newer.clone()),
                change: ProjectChange::DocumentRemoved {
                    document: key,
                    older,
                    newer,
                },
                value: document,
            })
        })
    }

    /// Runs one mutation under the writer lock.
    ///
    /// `apply` sees the current root and either rejects, declines, or
    /// returns the next root together with the change to publish. Nothing is
    /// installed or published on rejection.
    fn mutate<T>(
        &self,
        operation: &'static str,
        apply: impl FnOnce(&StoreState) -> Result<Outcome<T>, ProjectError>,
    ) -> Result<T, ProjectError> {
        let _writer = match self.writer.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                if self.notifying.load(Ordering::Acquire) {
                    tracing::debug!(operation, "rejected mutation during change delivery");
                    return Err(ProjectError::Reentrancy);
                }
                self.writer.lock().unwrap_or_else(PoisonError::into_inner)
            }
        };
        let current = self.state();

        let outcome = match apply(&current) {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::debug!(operation, %error, "rejected mutation");
                return Err(error);
            }
        };

        match outcome {
            Outcome::Unchanged(value) => {
                tracing::debug!(operation, "mutation was a no-op");
                Ok(value)
            }
            Outcome::Applied {
                state,
                change,
                value,
            } => {
                *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
                tracing::debug!(
                    operation,
                    kind = ?change.kind(),
                    project = %change.project_key(),
                    document = ?change.document_path(),
                    "applied mutation"
                );

                let _notifying = NotifyingGuard::set(&self.notifying);
                self.bus.publish(&change);

                Ok(value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tmls_codegen::TemplateGenerator;
    use tmls_source::InMemoryTextLoader;

    use super::*;
    use crate::ProjectConfiguration;

    fn store() -> SnapshotStore {
        SnapshotStore::new(Arc::new(TemplateGenerator))
    }

    #[test]
    fn test_find_document_by_path_only() {
        let store = store();
        let project = HostProject::new("/p", ProjectConfiguration::default());
        store.add_project(&project).unwrap();
        store
            .add_document(
                &project,
                &HostDocument::new("/p/a.tmpl"),
                InMemoryTextLoader::shared("a"),
            )
            .unwrap();

        let found = store.find_document(Utf8Path::new("/p/./a.tmpl")).unwrap();
        assert_eq!(found.key().project(), &project.key());
        assert!(store.find_document(Utf8Path::new("/p/b.tmpl")).is_none());
    }

    #[test]
    fn test_workspace_state_change() {
        let store = store();
        let project = HostProject::new("/p", ProjectConfiguration::default());
        store.add_project(&project).unwrap();

        let state = ProjectWorkspaceState {
            symbols: Vec::new(),
            language_version: Some("2".to_string()),
        };
        let changed = store
            .change_project_workspace_state(Utf8Path::new("/p"), Some(state.clone()))
            .unwrap();
        assert_eq!(changed.workspace_state(), Some(&state));
        assert_eq!(changed.version(), 1);

        let unchanged = store
            .change_project_workspace_state(Utf8Path::new("/p"), Some(state))
            .unwrap();
        assert!(unchanged.ptr_eq(&changed));

        assert_eq!(
            store.change_project_workspace_state(Utf8Path::new("/q"), None),
            Err(ProjectError::UnknownProject(ProjectKey::from_path(
                Utf8Path::new("/q")
            )))
        );
    }

    #[test]
    fn test_remove_project_drops_documents() {
        let store = store();
        let project = HostProject::new("/p", ProjectConfiguration::default());
        store.add_project(&project).unwrap();
        store
            .add_document(
                &project,
                &HostDocument::new("/p/a.tmpl"),
                InMemoryTextLoader::shared("a"),
            )
            .unwrap();

        let removed = store.remove_project(&project).unwrap();
        assert_eq!(removed.document_count(), 1);
        assert!(store.project(Utf8Path::new("/p")).is_none());
        assert!(store.find_document(Utf8Path::new("/p/a.tmpl")).is_none());
        assert_eq!(
            store.remove_project(&project),
            Err(ProjectError::UnknownProject(project.key()))
        );
    }
}
