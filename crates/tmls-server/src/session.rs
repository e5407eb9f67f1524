use std::sync::Arc;

use anyhow::Result;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use tmls_codegen::LanguageKind;
use tmls_codegen::TemplateGenerator;
use tmls_conf::Settings;
use tmls_ide::CancellationToken;
use tmls_ide::DefinitionFeature;
use tmls_ide::Delegator;
use tmls_ide::HandlerRegistry;
use tmls_ide::HostPosition;
use tmls_ide::HostRequest;
use tmls_ide::HoverFeature;
use tmls_ide::ProjectionEngine;
use tmls_ide::TemplateHoverService;
use tmls_project::DocumentSnapshot;
use tmls_project::ProjectConfiguration;
use tmls_project::ProjectError;
use tmls_project::SnapshotStore;
use tmls_source::FileSystem;
use tmls_source::LineCol;
use tmls_source::PositionEncoding;
use tower_lsp_server::ls_types::TextDocumentContentChangeEvent;

use crate::delegate::ClientDelegate;
use crate::workspace::Buffers;
use crate::workspace::BufferedLoaderFactory;
use crate::workspace::ProjectManager;
use crate::workspace::TextDocument;

/// Everything the server knows about one client connection.
pub struct Session {
    settings: Settings,
    project_root: Option<Utf8PathBuf>,
    encoding: PositionEncoding,
    buffers: Buffers,
    manager: Arc<ProjectManager>,
    hover: Arc<Delegator<HoverFeature>>,
    definition: Arc<Delegator<DefinitionFeature>>,
    shutdown: CancellationToken,
}

impl Session {
    pub fn new(
        project_root: Option<Utf8PathBuf>,
        settings: Settings,
        encoding: PositionEncoding,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let store = Arc::new(SnapshotStore::new(Arc::new(TemplateGenerator)));
        let buffers = Buffers::new();
        let loaders = Arc::new(BufferedLoaderFactory::new(buffers.clone(), fs));
        let manager = Arc::new(ProjectManager::new(Arc::clone(&store), loaders)?);

        if let Some(root) = &project_root {
            manager.open_project(root, project_configuration(&settings))?;
        }

        let engine = ProjectionEngine::new(encoding);

        let mut hover_handlers = HandlerRegistry::new();
        let mut definition_handlers = HandlerRegistry::new();
        for kind in LanguageKind::EMBEDDED {
            hover_handlers.register(kind, Arc::new(ClientDelegate))?;
            definition_handlers.register(kind, Arc::new(ClientDelegate))?;
        }

        let hover = Delegator::new(Arc::clone(&store), engine, hover_handlers)
            .with_local_handler(Arc::new(TemplateHoverService));
        let definition = Delegator::new(store, engine, definition_handlers);

        let session = Self {
            settings,
            project_root,
            encoding,
            buffers,
            manager,
            hover: Arc::new(hover),
            definition: Arc::new(definition),
            shutdown: CancellationToken::new(),
        };
        session.apply_delegation_setting();
        Ok(session)
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn project_root(&self) -> Option<&Utf8Path> {
        self.project_root.as_deref()
    }

    #[must_use]
    pub fn encoding(&self) -> PositionEncoding {
        self.encoding
    }

    #[must_use]
    pub fn buffers(&self) -> &Buffers {
        &self.buffers
    }

    #[must_use]
    pub fn manager(&self) -> &Arc<ProjectManager> {
        &self.manager
    }

    #[must_use]
    pub fn hover(&self) -> &Arc<Delegator<HoverFeature>> {
        &self.hover
    }

    #[must_use]
    pub fn definition(&self) -> &Arc<Delegator<DefinitionFeature>> {
        &self.definition
    }

    /// Fires once the client asks the server to shut down.
    #[must_use]
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    #[must_use]
    pub fn is_template(&self, path: &Utf8Path) -> bool {
        self.settings.is_template(path.as_std_path())
    }

    pub fn open_document(
        &self,
        path: &Utf8Path,
        content: String,
        version: i32,
    ) -> Result<DocumentSnapshot, ProjectError> {
        self.buffers
            .open(path.to_path_buf(), TextDocument::new(content, version));
        self.manager.document_opened(path)
    }

    pub fn change_document(
        &self,
        path: &Utf8Path,
        changes: &[TextDocumentContentChangeEvent],
        version: i32,
    ) -> Result<DocumentSnapshot> {
        self.buffers
            .update(path, changes, version, self.encoding)?;
        Ok(self.manager.document_changed(path)?)
    }

    pub fn close_document(&self, path: &Utf8Path) -> Result<Option<DocumentSnapshot>, ProjectError> {
        if self.buffers.close(path).is_none() {
            tracing::debug!(%path, "closing a document that was not open");
        }
        self.manager.document_closed(path)
    }

    /// Replaces the settings and pushes the derived project configuration
    /// into the store.
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ProjectError> {
        let changed = self
            .manager
            .update_configuration(&project_configuration(&settings))?;
        tracing::debug!(projects = changed.len(), "applied configuration");
        self.settings = settings;
        self.apply_delegation_setting();
        Ok(())
    }

    /// A host-coordinate request for the tracked document at `path`.
    #[must_use]
    pub fn host_request(&self, path: &Utf8Path, position: LineCol) -> Option<HostRequest<()>> {
        let document = self.manager.document_key(path)?;
        Some(HostRequest {
            document,
            position: HostPosition::LineCol(position),
            params: (),
        })
    }

    fn apply_delegation_setting(&self) {
        let enabled = self.settings.single_server_support;
        self.hover.set_delegation_enabled(enabled);
        self.definition.set_delegation_enabled(enabled);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("project_root", &self.project_root)
            .field("encoding", &self.encoding)
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

#[must_use]
pub fn project_configuration(settings: &Settings) -> ProjectConfiguration {
    ProjectConfiguration {
        language_version: settings.language_version.clone(),
        root_namespace: settings.root_namespace.clone(),
    }
}
