use std::sync::mpsc;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::time::Duration;

use camino::Utf8Path;
use tmls_codegen::TemplateGenerator;
use tmls_project::ChangeKind;
use tmls_project::DocumentKey;
use tmls_project::HostDocument;
use tmls_project::HostProject;
use tmls_project::ProjectChange;
use tmls_project::ProjectConfiguration;
use tmls_project::ProjectError;
use tmls_project::ProjectKey;
use tmls_project::SnapshotStore;
use tmls_source::InMemoryTextLoader;

struct Fixture {
    store: Arc<SnapshotStore>,
    events: Arc<Mutex<Vec<ProjectChange>>>,
}

impl Fixture {
    fn new() -> Self {
        let store = Arc::new(SnapshotStore::new(Arc::new(TemplateGenerator)));
        let events = Arc::new(Mutex::new(Vec::new()));
        {
            let events = Arc::clone(&events);
            store.subscribe(Arc::new(move |change: &ProjectChange| {
                events.lock().unwrap().push(change.clone());
            }));
        }
        Self { store, events }
    }

    fn kinds(&self) -> Vec<ChangeKind> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(ProjectChange::kind)
            .collect()
    }

    fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

fn project(path: &str) -> HostProject {
    HostProject::new(path, ProjectConfiguration::default())
}

#[test]
fn test_one_event_per_successful_mutation() {
    let fixture = Fixture::new();
    let store = &fixture.store;
    let p = project("/p");
    let a = HostDocument::new("/p/a.tmpl");

    store.add_project(&p).unwrap();
    store
        .add_document(&p, &a, InMemoryTextLoader::shared("x"))
        .unwrap();
    store
        .change_document(p.file_path.as_path(), a.file_path(), InMemoryTextLoader::shared("y"))
        .unwrap();
    store
        .change_project_configuration(&HostProject::new(
            "/p",
            ProjectConfiguration {
                language_version: "2".to_string(),
                root_namespace: None,
            },
        ))
        .unwrap();
    store.remove_document(&p, &a).unwrap();
    store.remove_project(&p).unwrap();

    assert_eq!(
        fixture.kinds(),
        [
            ChangeKind::ProjectAdded,
            ChangeKind::DocumentAdded,
            ChangeKind::DocumentChanged,
            ChangeKind::ProjectChanged,
            ChangeKind::DocumentRemoved,
            ChangeKind::ProjectRemoved,
        ]
    );
}

#[test]
fn test_failed_mutations_publish_nothing() {
    let fixture = Fixture::new();
    let store = &fixture.store;
    let p = project("/p");
    store.add_project(&p).unwrap();
    fixture.clear();
    let before = store.state();

    assert_eq!(
        store.add_project(&p),
        Err(ProjectError::DuplicateProject(p.key()))
    );
    assert!(matches!(
        store.add_document(
            &project("/q"),
            &HostDocument::new("/q/a.tmpl"),
            InMemoryTextLoader::shared("")
        ),
        Err(ProjectError::UnknownProject(_))
    ));
    assert!(matches!(
        store.remove_document(&p, &HostDocument::new("/p/missing.tmpl")),
        Err(ProjectError::UnknownDocument { .. })
    ));

    assert!(fixture.kinds().is_empty());
    assert_eq!(store.state(), before);
}

#[test]
fn test_change_unknown_document_leaves_state_untouched() {
    let fixture = Fixture::new();
    let store = &fixture.store;
    let p = project("/p");
    store.add_project(&p).unwrap();
    fixture.clear();
    let before = store.state();

    let result = store.change_document(
        Utf8Path::new("/p"),
        Utf8Path::new("/p/nowhere.tmpl"),
        InMemoryTextLoader::shared("z"),
    );

    assert_eq!(
        result,
        Err(ProjectError::UnknownDocument {
            project: ProjectKey::from_path(Utf8Path::new("/p")),
            document: "/p/nowhere.tmpl".into(),
        })
    );
    assert_eq!(store.state(), before);
    assert!(fixture.kinds().is_empty());
}

#[test]
fn test_document_identity_is_unique_across_projects() {
    let fixture = Fixture::new();
    let store = &fixture.store;
    let p = project("/p");
    let q = project("/q");
    store.add_project(&p).unwrap();
    store.add_project(&q).unwrap();

    let shared = HostDocument::new("/shared/a.tmpl");
    let first = store
        .add_document(&p, &shared, InMemoryTextLoader::shared("a"))
        .unwrap();
    let before = store.state();
    fixture.clear();

    assert_eq!(
        store.add_document(&p, &shared, InMemoryTextLoader::shared("a")),
        Err(ProjectError::DuplicateDocument {
            document: "/shared/a.tmpl".into(),
            owner: p.key(),
        })
    );
    assert_eq!(
        store.add_document(&q, &shared, InMemoryTextLoader::shared("a")),
        Err(ProjectError::DuplicateDocument {
            document: "/shared/a.tmpl".into(),
            owner: p.key(),
        })
    );

    // the first owner's document is untouched and nobody was notified
    let kept = store.find_document(shared.file_path()).unwrap();
    assert!(kept.ptr_eq(&first));
    assert_eq!(kept.version(), first.version());
    assert!(Arc::ptr_eq(kept.loader(), first.loader()));
    assert_eq!(kept.key().project(), &p.key());
    assert_eq!(store.state(), before);
    assert!(fixture.kinds().is_empty());

    store.remove_document(&p, &shared).unwrap();
    store
        .add_document(&q, &shared, InMemoryTextLoader::shared("a"))
        .unwrap();
}

#[test]
fn test_versions_increase_and_caches_invalidate() {
    let fixture = Fixture::new();
    let store = &fixture.store;
    let p = project("/p");
    let a = HostDocument::new("/p/a.tmpl");
    store.add_project(&p).unwrap();

    let v0 = store
        .add_document(&p, &a, InMemoryTextLoader::shared("{{ one }}"))
        .unwrap();
    let generated_v0 = v0.generated_document().unwrap();
    assert_eq!(v0.version(), 0);

    let mut previous = v0.clone();
    for text in ["{{ two }}", "{{ three }}", "{{ four }}"] {
        let next = store
            .change_document(Utf8Path::new("/p"), a.file_path(), InMemoryTextLoader::shared(text))
            .unwrap();
        assert_eq!(next.version(), previous.version() + 1);
        assert!(!next.has_generated_document());
        assert_eq!(next.text().unwrap().text.as_str(), text);
        previous = next;
    }

    // the old snapshot still serves its own content
    assert_eq!(v0.text().unwrap().text.as_str(), "{{ one }}");
    assert!(Arc::ptr_eq(&generated_v0, &v0.generated_document().unwrap()));
}

#[test]
fn test_equal_configuration_is_a_no_op() {
    let fixture = Fixture::new();
    let store = &fixture.store;
    let p = project("/p");
    let added = store.add_project(&p).unwrap();
    fixture.clear();

    let unchanged = store.change_project_configuration(&p).unwrap();

    assert!(unchanged.ptr_eq(&added));
    assert!(fixture.kinds().is_empty());
}

#[test]
fn test_configuration_change_invalidates_generated_documents() {
    let fixture = Fixture::new();
    let store = &fixture.store;
    let p = project("/p");
    let a = HostDocument::new("/p/a.tmpl");
    store.add_project(&p).unwrap();
    let document = store
        .add_document(&p, &a, InMemoryTextLoader::shared("{% x %}"))
        .unwrap();
    document.generated_document().unwrap();

    let changed = store
        .change_project_configuration(&HostProject::new(
            "/p",
            ProjectConfiguration {
                language_version: "latest".to_string(),
                root_namespace: Some("Site".to_string()),
            },
        ))
        .unwrap();

    let reconfigured = changed.document(a.file_path()).unwrap();
    assert_eq!(reconfigured.version(), document.version());
    assert!(!reconfigured.has_generated_document());
    assert!(document.has_generated_document());
}

#[test]
fn test_mutation_from_listener_is_rejected() {
    let store = Arc::new(SnapshotStore::new(Arc::new(TemplateGenerator)));
    let outcome: Arc<OnceLock<Result<(), ProjectError>>> = Arc::new(OnceLock::new());
    {
        let weak = Arc::downgrade(&store);
        let outcome = Arc::clone(&outcome);
        store.subscribe(Arc::new(move |change: &ProjectChange| {
            if change.kind() != ChangeKind::ProjectAdded {
                return;
            }
            if let Some(store) = weak.upgrade() {
                let result = store.add_project(&project("/nested")).map(|_| ());
                let _ = outcome.set(result);
            }
        }));
    }

    store.add_project(&project("/p")).unwrap();

    assert_eq!(outcome.get(), Some(&Err(ProjectError::Reentrancy)));
    assert!(store.project(Utf8Path::new("/nested")).is_none());
    assert!(store.project(Utf8Path::new("/p")).is_some());

    // the store is usable again once delivery returns
    store.add_project(&project("/after")).unwrap();
}

#[test]
fn test_mutation_handed_to_another_thread_is_rejected() {
    let store = Arc::new(SnapshotStore::new(Arc::new(TemplateGenerator)));
    let outcome: Arc<OnceLock<Result<(), ProjectError>>> = Arc::new(OnceLock::new());
    {
        let weak = Arc::downgrade(&store);
        let outcome = Arc::clone(&outcome);
        store.subscribe(Arc::new(move |change: &ProjectChange| {
            if change.kind() != ChangeKind::ProjectAdded {
                return;
            }
            let Some(store) = weak.upgrade() else {
                return;
            };
            let (sender, receiver) = mpsc::channel();
            std::thread::spawn(move || {
                let result = store.add_project(&project("/nested")).map(|_| ());
                let _ = sender.send(result);
            });
            if let Ok(result) = receiver.recv_timeout(Duration::from_secs(5)) {
                let _ = outcome.set(result);
            }
        }));
    }

    store.add_project(&project("/p")).unwrap();

    assert_eq!(outcome.get(), Some(&Err(ProjectError::Reentrancy)));
    assert!(store.project(Utf8Path::new("/nested")).is_none());
    assert_eq!(store.state().project_count(), 1);
}

#[test]
fn test_readers_see_consistent_snapshots() {
    let store = Arc::new(SnapshotStore::new(Arc::new(TemplateGenerator)));
    let p = project("/p");
    store.add_project(&p).unwrap();
    let paths: Vec<String> = (0..20).map(|i| format!("/p/{i}.tmpl")).collect();

    std::thread::scope(|scope| {
        let writer = {
            let store = Arc::clone(&store);
            let p = p.clone();
            let paths = paths.clone();
            scope.spawn(move || {
                for path in &paths {
                    store
                        .add_document(&p, &HostDocument::new(path.as_str()), InMemoryTextLoader::shared(path.as_str()))
                        .unwrap();
                }
            })
        };

        for _ in 0..4 {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                let mut last = 0;
                for _ in 0..200 {
                    let state = store.state();
                    let project = state
                        .project(&ProjectKey::from_path(Utf8Path::new("/p")))
                        .unwrap();
                    // the project version is exactly the number of documents added so far
                    assert_eq!(project.version() as usize, project.document_count());
                    assert!(project.document_count() >= last);
                    last = project.document_count();
                    for document in project.documents() {
                        let key = DocumentKey::new(project.key().clone(), document.file_path());
                        assert!(state.document(&key).is_some());
                        assert_eq!(document.text().unwrap().text.as_str(), document.file_path().as_str());
                    }
                }
            });
        }

        writer.join().unwrap();
    });

    assert_eq!(store.project(Utf8Path::new("/p")).unwrap().document_count(), 20);
}
