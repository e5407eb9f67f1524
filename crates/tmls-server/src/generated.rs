//! Keeps the editor's copies of generated documents current.
//!
//! Delegated requests name a generated document by path and version. The
//! editor can only forward them to its embedded-language servers if it holds
//! that text, so every open document's generated outputs are pushed to it
//! whenever the document or its project changes.

use std::sync::Arc;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use serde::Deserialize;
use serde::Serialize;
use tmls_codegen::LanguageKind;
use tmls_ide::generated_path;
use tmls_ide::CancellationToken;
use tmls_project::ChangeKind;
use tokio::sync::broadcast::error::RecvError;
use tower_lsp_server::ls_types;

use crate::client;
use crate::diagnostics::affected_paths;
use crate::workspace::Buffers;
use crate::workspace::ProjectManager;

pub enum UpdateGeneratedDocument {}

impl ls_types::notification::Notification for UpdateGeneratedDocument {
    type Params = GeneratedDocumentUpdate;
    const METHOD: &'static str = "tmls/updateGeneratedDocument";
}

/// The full text of one generated document at one host document version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedDocumentUpdate {
    pub host_path: Utf8PathBuf,
    pub generated_path: Utf8PathBuf,
    /// Snapshot version, matching the version carried by delegated requests.
    pub version: u64,
    pub language_kind: LanguageKind,
    pub text: String,
}

/// Pushes generated documents to the editor until `shutdown` fires.
pub(crate) async fn run(manager: Arc<ProjectManager>, buffers: Buffers, shutdown: CancellationToken) {
    let mut receiver = manager.subscribe();
    loop {
        let received = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            received = receiver.recv() => received,
        };

        let paths = match received {
            Ok(change) if changes_generated_text(change.kind) => affected_paths(&change, &buffers),
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "generated documents fell behind, resending every open document");
                buffers.paths()
            }
            Err(RecvError::Closed) => break,
        };

        for path in paths {
            for update in updates(&manager, &buffers, &path) {
                client::send_notification::<UpdateGeneratedDocument>(update);
            }
        }
    }
    tracing::debug!("generated document task stopped");
}

fn changes_generated_text(kind: ChangeKind) -> bool {
    matches!(
        kind,
        ChangeKind::DocumentAdded | ChangeKind::DocumentChanged | ChangeKind::ProjectChanged
    )
}

/// One update per generated output of an open, tracked document.
pub(crate) fn updates(
    manager: &ProjectManager,
    buffers: &Buffers,
    path: &Utf8Path,
) -> Vec<GeneratedDocumentUpdate> {
    if !buffers.contains(path) {
        return Vec::new();
    }
    let Some(document) = manager.store().find_document(path) else {
        return Vec::new();
    };
    let generated = match document.generated_document() {
        Ok(generated) => generated,
        Err(error) => {
            tracing::error!(%path, %error, "cannot generate documents for the editor");
            return Vec::new();
        }
    };

    let host_path = document.file_path();
    generated
        .outputs()
        .map(|output| GeneratedDocumentUpdate {
            host_path: host_path.to_path_buf(),
            generated_path: generated_path(host_path, output.kind()),
            version: document.version(),
            language_kind: output.kind(),
            text: output.text().as_str().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use tmls_codegen::TemplateGenerator;
    use tmls_project::ProjectConfiguration;
    use tmls_project::SnapshotStore;
    use tmls_source::InMemoryFileSystem;

    use super::*;
    use crate::workspace::BufferedLoaderFactory;
    use crate::workspace::TextDocument;

    fn manager(buffers: &Buffers) -> ProjectManager {
        let store = Arc::new(SnapshotStore::new(Arc::new(TemplateGenerator)));
        let loaders = Arc::new(BufferedLoaderFactory::new(
            buffers.clone(),
            Arc::new(InMemoryFileSystem::new()),
        ));
        let manager = ProjectManager::new(store, loaders).unwrap();
        manager
            .open_project(Utf8Path::new("/w"), ProjectConfiguration::default())
            .unwrap();
        manager
    }

    fn find(updates: &[GeneratedDocumentUpdate], kind: LanguageKind) -> &GeneratedDocumentUpdate {
        updates
            .iter()
            .find(|update| update.language_kind == kind)
            .unwrap()
    }

    #[test]
    fn test_open_document_sends_every_output() {
        let buffers = Buffers::new();
        let manager = manager(&buffers);
        let path = Utf8Path::new("/w/page.tmpl");
        buffers.open(path.to_path_buf(), TextDocument::new("<p>{{ item }}</p>", 1));
        manager.document_opened(path).unwrap();

        let updates = updates(&manager, &buffers, path);

        assert_eq!(updates.len(), 2);
        let code = find(&updates, LanguageKind::Code);
        assert_eq!(code.generated_path, Utf8PathBuf::from("/w/page.tmpl__virtual.code"));
        assert_eq!(code.host_path, path);
        assert_eq!(code.version, 0);
        assert!(code.text.contains("item"));
        let markup = find(&updates, LanguageKind::Markup);
        assert_eq!(markup.generated_path, Utf8PathBuf::from("/w/page.tmpl__virtual.html"));
        assert!(markup.text.starts_with("<p>"));
    }

    #[test]
    fn test_updates_follow_the_snapshot_version() {
        let buffers = Buffers::new();
        let manager = manager(&buffers);
        let path = Utf8Path::new("/w/page.tmpl");
        buffers.open(path.to_path_buf(), TextDocument::new("{{ a }}", 1));
        manager.document_opened(path).unwrap();
        buffers.open(path.to_path_buf(), TextDocument::new("{{ renamed }}", 2));
        manager.document_changed(path).unwrap();

        let updates = updates(&manager, &buffers, path);

        let code = find(&updates, LanguageKind::Code);
        assert_eq!(code.version, 1);
        assert!(code.text.contains("renamed"));
    }

    #[test]
    fn test_closed_and_untracked_documents_send_nothing() {
        let buffers = Buffers::new();
        let manager = manager(&buffers);
        let path = Utf8Path::new("/w/page.tmpl");
        buffers.open(path.to_path_buf(), TextDocument::new("{{ a }}", 1));
        manager.document_opened(path).unwrap();
        let _ = buffers.close(path);
        manager.document_closed(path).unwrap();

        assert!(updates(&manager, &buffers, path).is_empty());
        assert!(updates(&manager, &buffers, Utf8Path::new("/w/never.tmpl")).is_empty());
    }

    #[test]
    fn test_only_content_changes_resend() {
        assert!(changes_generated_text(ChangeKind::DocumentAdded));
        assert!(changes_generated_text(ChangeKind::DocumentChanged));
        assert!(changes_generated_text(ChangeKind::ProjectChanged));
        assert!(!changes_generated_text(ChangeKind::DocumentRemoved));
        assert!(!changes_generated_text(ChangeKind::ProjectAdded));
        assert!(!changes_generated_text(ChangeKind::ProjectRemoved));
    }
}
