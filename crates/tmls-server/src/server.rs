use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use camino::Utf8PathBuf;
use tmls_conf::Settings;
use tmls_ide::CancellationToken;
use tmls_ide::DelegationError;
use tmls_ide::Delegator;
use tmls_ide::Feature;
use tmls_ide::HostRequest;
use tmls_source::OsFileSystem;
use tokio::sync::RwLock;
use tower_lsp_server::jsonrpc;
use tower_lsp_server::jsonrpc::Result as LspResult;
use tower_lsp_server::ls_types;
use tower_lsp_server::LanguageServer;
use tracing_appender::non_blocking::WorkerGuard;

use crate::client;
use crate::delegate::hover_to_lsp;
use crate::delegate::locations_to_lsp;
use crate::diagnostics;
use crate::ext::negotiate_position_encoding;
use crate::ext::PositionEncodingExt;
use crate::ext::PositionExt;
use crate::ext::UriExt;
use crate::generated;
use crate::logging;
use crate::session::Session;

const SERVER_NAME: &str = "Template Language Server";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct TemplateLanguageServer {
    session: Arc<RwLock<Option<Session>>>,
    debug: bool,
    log_guard: Mutex<Option<WorkerGuard>>,
}

impl TemplateLanguageServer {
    #[must_use]
    pub fn new(debug: bool) -> Self {
        Self {
            session: Arc::new(RwLock::new(None)),
            debug,
            log_guard: Mutex::new(None),
        }
    }

    /// Runs `f` against the session. Requests that arrive before
    /// `initialize` see nothing and yield `None`.
    pub async fn with_session<R>(&self, f: impl FnOnce(&Session) -> R) -> Option<R> {
        let session = self.session.read().await;
        session.as_ref().map(f)
    }

    pub async fn with_session_mut<R>(&self, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut session = self.session.write().await;
        session.as_mut().map(f)
    }

    fn init_logging(&self, debug: bool) {
        let mut guard = self.log_guard.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(logging::init_tracing(
                |message_type, message| client::log_message(message_type, message),
                debug,
            ));
        }
    }

    /// Resolves the request against the session under the read lock, then
    /// awaits the delegator without holding it.
    async fn delegate<F>(
        &self,
        uri: &ls_types::Uri,
        position: ls_types::Position,
        delegator: impl FnOnce(&Session) -> Arc<Delegator<F>>,
    ) -> LspResult<Option<F::Response>>
    where
        F: Feature<Params = ()>,
    {
        let Some(path) = uri.to_utf8_path_buf() else {
            return Ok(None);
        };
        let prepared = self
            .with_session(|session| {
                session
                    .host_request(&path, position.to_line_col())
                    .map(|request| {
                        (
                            delegator(session),
                            request,
                            session.shutdown_token().clone(),
                        )
                    })
            })
            .await
            .flatten();
        let Some((delegator, request, token)) = prepared else {
            tracing::debug!(%path, feature = F::NAME, "request for an untracked document");
            return Ok(None);
        };

        handle::<F>(&delegator, request, &token).await
    }
}

async fn handle<F: Feature>(
    delegator: &Delegator<F>,
    request: HostRequest<F::Params>,
    token: &CancellationToken,
) -> LspResult<Option<F::Response>> {
    match delegator.handle(request, token).await {
        Ok(response) => Ok(response),
        Err(DelegationError::Cancelled) => Err(jsonrpc::Error::request_cancelled()),
        Err(DelegationError::DocumentNotFound(document)) => {
            tracing::debug!(%document, feature = F::NAME, "document went away");
            Ok(None)
        }
        Err(error @ DelegationError::Projection(_)) => {
            Err(jsonrpc::Error::invalid_params(error.to_string()))
        }
        Err(error) => {
            tracing::error!(feature = F::NAME, %error, "request failed");
            let mut lsp_error = jsonrpc::Error::internal_error();
            lsp_error.message = error.to_string().into();
            Err(lsp_error)
        }
    }
}

/// The first workspace folder, or the current directory when the client
/// sent none.
fn project_root(params: &ls_types::InitializeParams) -> Option<Utf8PathBuf> {
    if let Some(folder) = params
        .workspace_folders
        .as_ref()
        .and_then(|folders| folders.first())
    {
        return folder.uri.to_utf8_path_buf();
    }

    std::env::current_dir()
        .ok()
        .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
}

fn load_settings(root: Option<&Utf8PathBuf>, overrides: Option<&serde_json::Value>) -> Settings {
    let Some(root) = root else {
        return Settings::default();
    };
    Settings::with_overrides(root.as_std_path(), overrides).unwrap_or_else(|error| {
        tracing::error!(%root, %error, "failed to load settings, using defaults");
        Settings::default()
    })
}

impl LanguageServer for TemplateLanguageServer {
    async fn initialize(
        &self,
        params: ls_types::InitializeParams,
    ) -> LspResult<ls_types::InitializeResult> {
        let encoding = negotiate_position_encoding(&params);
        let root = project_root(&params);
        let settings = load_settings(root.as_ref(), params.initialization_options.as_ref());
        self.init_logging(self.debug || settings.debug);

        tracing::info!(root = ?root, ?encoding, "initializing");

        let session = Session::new(root, settings, encoding, Arc::new(OsFileSystem))
            .map_err(|error| {
                tracing::error!(%error, "failed to create session");
                jsonrpc::Error::internal_error()
            })?;
        *self.session.write().await = Some(session);

        Ok(ls_types::InitializeResult {
            capabilities: ls_types::ServerCapabilities {
                position_encoding: Some(encoding.to_lsp()),
                text_document_sync: Some(ls_types::TextDocumentSyncCapability::Options(
                    ls_types::TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(ls_types::TextDocumentSyncKind::INCREMENTAL),
                        will_save: Some(false),
                        will_save_wait_until: Some(false),
                        save: None,
                    },
                )),
                hover_provider: Some(ls_types::HoverProviderCapability::Simple(true)),
                definition_provider: Some(ls_types::OneOf::Left(true)),
                ..Default::default()
            },
            server_info: Some(ls_types::ServerInfo {
                name: SERVER_NAME.to_string(),
                version: Some(SERVER_VERSION.to_string()),
            }),
            offset_encoding: None,
        })
    }

    async fn initialized(&self, _params: ls_types::InitializedParams) {
        let started = self
            .with_session(|session| {
                tokio::spawn(diagnostics::run(
                    Arc::clone(session.manager()),
                    session.buffers().clone(),
                    session.encoding(),
                    session.shutdown_token().clone(),
                ));
                tokio::spawn(generated::run(
                    Arc::clone(session.manager()),
                    session.buffers().clone(),
                    session.shutdown_token().clone(),
                ));
                session.project_root().map(ToString::to_string)
            })
            .await;

        match started.flatten() {
            Some(root) => tracing::info!("project ready at {root}"),
            None => tracing::info!("no project root; all documents are miscellaneous files"),
        }
    }

    async fn shutdown(&self) -> LspResult<()> {
        self.with_session(|session| session.shutdown_token().cancel())
            .await;
        Ok(())
    }

    async fn did_open(&self, params: ls_types::DidOpenTextDocumentParams) {
        let Some(path) = params.text_document.uri.to_utf8_path_buf() else {
            return;
        };
        tracing::debug!(%path, "opened document");

        self.with_session(|session| {
            if !session.is_template(&path) {
                return;
            }
            if let Err(error) = session.open_document(
                &path,
                params.text_document.text,
                params.text_document.version,
            ) {
                tracing::error!(%path, %error, "failed to open document");
            }
        })
        .await;
    }

    async fn did_change(&self, params: ls_types::DidChangeTextDocumentParams) {
        let Some(path) = params.text_document.uri.to_utf8_path_buf() else {
            return;
        };

        self.with_session(|session| {
            if !session.buffers().contains(&path) {
                return;
            }
            if let Err(error) = session.change_document(
                &path,
                &params.content_changes,
                params.text_document.version,
            ) {
                tracing::error!(%path, %error, "failed to apply document change");
            }
        })
        .await;
    }

    async fn did_close(&self, params: ls_types::DidCloseTextDocumentParams) {
        let Some(path) = params.text_document.uri.to_utf8_path_buf() else {
            return;
        };
        tracing::debug!(%path, "closed document");

        self.with_session(|session| {
            if !session.buffers().contains(&path) {
                return;
            }
            if let Err(error) = session.close_document(&path) {
                tracing::error!(%path, %error, "failed to close document");
            }
        })
        .await;
    }

    async fn did_change_configuration(&self, params: ls_types::DidChangeConfigurationParams) {
        tracing::info!("configuration changed, reloading settings");

        self.with_session_mut(|session| {
            let root = session.project_root().map(Utf8PathBuf::from);
            let settings = load_settings(root.as_ref(), Some(&params.settings));
            if let Err(error) = session.update_settings(settings) {
                tracing::error!(%error, "failed to apply settings");
            }
        })
        .await;
    }

    async fn hover(&self, params: ls_types::HoverParams) -> LspResult<Option<ls_types::Hover>> {
        let position = params.text_document_position_params;
        let hover = self
            .delegate(&position.text_document.uri, position.position, |session| {
                Arc::clone(session.hover())
            })
            .await?;
        Ok(hover.map(hover_to_lsp))
    }

    async fn goto_definition(
        &self,
        params: ls_types::GotoDefinitionParams,
    ) -> LspResult<Option<ls_types::GotoDefinitionResponse>> {
        let position = params.text_document_position_params;
        let locations = self
            .delegate(&position.text_document.uri, position.position, |session| {
                Arc::clone(session.definition())
            })
            .await?;
        Ok(locations.map(locations_to_lsp))
    }
}
