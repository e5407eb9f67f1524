//! Routing of feature requests to the language that owns the cursor.
//!
//! A request arrives in host coordinates. The [`Delegator`] resolves the
//! current document snapshot, projects the position, and then either answers
//! locally, forwards a [`DelegatedRequest`] to the handler registered for the
//! projected [`LanguageKind`], or returns `None` when nobody can answer.
//! Responses from delegated handlers are mapped back to host coordinates with
//! a [`ResponseMapper`] built from the same generated document used for the
//! projection.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use tmls_codegen::GeneratedDocument;
use tmls_codegen::GeneratedOutput;
use tmls_codegen::LanguageKind;
use tmls_project::DocumentKey;
use tmls_project::DocumentSnapshot;
use tmls_project::ProjectSnapshot;
use tmls_project::SnapshotStore;
use tmls_source::LineCol;
use tmls_source::Offset;
use tmls_source::PositionEncoding;
use tmls_source::SourceText;
use tmls_source::Span;

use crate::CancellationToken;
use crate::Projection;
use crate::ProjectionEngine;
use crate::ProjectionError;
use crate::Range;

/// A response that may carry generated-document coordinates.
pub trait RemapToHost: Sized {
    /// Rewrites every generated position in `self` into host coordinates.
    /// Positions that cannot be mapped are dropped, never guessed.
    #[must_use]
    fn remap_to_host(self, mapper: &ResponseMapper<'_>) -> Self;
}

/// An editor feature that can be delegated.
pub trait Feature: Send + Sync + 'static {
    const NAME: &'static str;
    type Params: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static;
    type Response: RemapToHost + fmt::Debug + Send + 'static;
}

/// Names the generated document a delegated request targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentIdentifier {
    pub key: DocumentKey,
    pub version: u64,
    pub generated_path: Utf8PathBuf,
}

impl DocumentIdentifier {
    #[must_use]
    pub fn new(document: &DocumentSnapshot, kind: LanguageKind) -> Self {
        Self {
            key: document.key().clone(),
            version: document.version(),
            generated_path: generated_path(document.file_path(), kind),
        }
    }
}

/// The path a generated document is published under.
#[must_use]
pub fn generated_path(host_path: &Utf8Path, kind: LanguageKind) -> Utf8PathBuf {
    match kind.virtual_suffix() {
        Some(suffix) => Utf8PathBuf::from(format!("{host_path}{suffix}")),
        None => host_path.to_path_buf(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatedRequest<P> {
    pub document: DocumentIdentifier,
    /// Position in the generated document.
    pub position: LineCol,
    /// Byte offset in the generated document.
    pub offset: Offset,
    pub language_kind: LanguageKind,
    pub params: P,
}

impl<P> DelegatedRequest<P> {
    #[must_use]
    pub fn new(document: &DocumentSnapshot, projection: &Projection, params: P) -> Self {
        Self {
            document: DocumentIdentifier::new(document, projection.language_kind),
            position: projection.generated_position,
            offset: projection.generated_offset,
            language_kind: projection.language_kind,
            params,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostPosition {
    Offset(Offset),
    LineCol(LineCol),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRequest<P> {
    pub document: DocumentKey,
    pub position: HostPosition,
    pub params: P,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("delegated handler failed: {0}")]
    Failed(String),

    #[error("delegated handler is unreachable: {0}")]
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DelegationError {
    #[error("document '{0}' not found")]
    DocumentNotFound(DocumentKey),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("request was cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("handlers cannot be registered for the host template language")]
    HostLanguage,
}

/// Answers delegated requests for one embedded language.
#[async_trait]
pub trait DelegatedHandler<F: Feature>: Send + Sync {
    async fn handle(
        &self,
        request: DelegatedRequest<F::Params>,
    ) -> Result<Option<F::Response>, DispatchError>;
}

/// Everything a local handler gets to look at.
#[derive(Debug)]
pub struct LocalRequest<'a, P> {
    pub project: &'a ProjectSnapshot,
    pub document: &'a DocumentSnapshot,
    pub generated: &'a GeneratedDocument,
    pub projection: Projection,
    pub encoding: PositionEncoding,
    pub params: P,
}

/// In-process handler for the language kinds a feature answers itself.
///
/// Its responses are already in host coordinates and are returned as-is.
pub trait LocalHandler<F: Feature>: Send + Sync {
    fn owns(&self, kind: LanguageKind) -> bool;

    fn handle(
        &self,
        request: LocalRequest<'_, F::Params>,
    ) -> Result<Option<F::Response>, DispatchError>;
}

/// At most one delegated handler per embedded language.
pub struct HandlerRegistry<F: Feature> {
    handlers: FxHashMap<LanguageKind, Arc<dyn DelegatedHandler<F>>>,
}

impl<F: Feature> HandlerRegistry<F> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: FxHashMap::default(),
        }
    }

    /// Registers `handler` for `kind`, replacing any previous one.
    pub fn register(
        &mut self,
        kind: LanguageKind,
        handler: Arc<dyn DelegatedHandler<F>>,
    ) -> Result<(), RegistryError> {
        if !kind.is_embedded() {
            return Err(RegistryError::HostLanguage);
        }
        if self.handlers.insert(kind, handler).is_some() {
            tracing::debug!(feature = F::NAME, %kind, "replaced delegated handler");
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, kind: LanguageKind) -> Option<&Arc<dyn DelegatedHandler<F>>> {
        self.handlers.get(&kind)
    }

    #[must_use]
    pub fn contains(&self, kind: LanguageKind) -> bool {
        self.handlers.contains_key(&kind)
    }
}

impl<F: Feature> Default for HandlerRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Feature> fmt::Debug for HandlerRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("feature", &F::NAME)
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Translates generated-document coordinates back into the host document.
///
/// Built from the same [`GeneratedDocument`] the request was projected
/// through, so the inverse mapping uses exactly the spans the forward one
/// did.
#[derive(Debug)]
pub struct ResponseMapper<'a> {
    kind: LanguageKind,
    generated: &'a GeneratedDocument,
    output: Option<&'a GeneratedOutput>,
    host_text: &'a SourceText,
    host_path: &'a Utf8Path,
    generated_path: Utf8PathBuf,
    encoding: PositionEncoding,
}

impl<'a> ResponseMapper<'a> {
    #[must_use]
    pub fn new(
        kind: LanguageKind,
        generated: &'a GeneratedDocument,
        host_text: &'a SourceText,
        host_path: &'a Utf8Path,
        encoding: PositionEncoding,
    ) -> Self {
        Self {
            kind,
            generated,
            output: generated.output(kind),
            host_text,
            host_path,
            generated_path: generated_path(host_path, kind),
            encoding,
        }
    }

    #[must_use]
    pub fn language_kind(&self) -> LanguageKind {
        self.kind
    }

    #[must_use]
    pub fn host_path(&self) -> &Utf8Path {
        self.host_path
    }

    #[must_use]
    pub fn generated_path(&self) -> &Utf8Path {
        &self.generated_path
    }

    /// Whether `path` names the generated document this mapper inverts.
    #[must_use]
    pub fn is_generated_path(&self, path: &Utf8Path) -> bool {
        path == self.generated_path
    }

    #[must_use]
    pub fn map_offset(&self, generated: Offset) -> Option<Offset> {
        self.generated.map_to_host_offset(self.kind, generated)
    }

    #[must_use]
    pub fn map_span(&self, generated: Span) -> Option<Span> {
        self.generated.map_to_host_range(self.kind, generated)
    }

    /// Maps a generated line/column range to a host line/column range.
    #[must_use]
    pub fn map_range(&self, generated: Range) -> Option<Range> {
        let output = self.output?;
        let span = generated.to_span(output.text(), self.encoding)?;
        let host = self.map_span(span)?;
        Some(Range::from_span(host, self.host_text, self.encoding))
    }
}

/// Runs one feature's requests through resolve, project, gate, dispatch and
/// remap.
pub struct Delegator<F: Feature> {
    store: Arc<SnapshotStore>,
    engine: ProjectionEngine,
    registry: HandlerRegistry<F>,
    local: Option<Arc<dyn LocalHandler<F>>>,
    delegation_enabled: AtomicBool,
}

impl<F: Feature> Delegator<F> {
    #[must_use]
    pub fn new(
        store: Arc<SnapshotStore>,
        engine: ProjectionEngine,
        registry: HandlerRegistry<F>,
    ) -> Self {
        Self {
            store,
            engine,
            registry,
            local: None,
            delegation_enabled: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn with_local_handler(mut self, local: Arc<dyn LocalHandler<F>>) -> Self {
        self.local = Some(local);
        self
    }

    /// Turns forwarding to delegated handlers on or off. Local handling is
    /// unaffected.
    pub fn set_delegation_enabled(&self, enabled: bool) {
        self.delegation_enabled.store(enabled, Ordering::Relaxed);
    }

    #[must_use]
    pub fn delegation_enabled(&self) -> bool {
        self.delegation_enabled.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn engine(&self) -> &ProjectionEngine {
        &self.engine
    }

    pub async fn handle(
        &self,
        request: HostRequest<F::Params>,
        token: &CancellationToken,
    ) -> Result<Option<F::Response>, DelegationError> {
        if token.is_cancelled() {
            return Err(DelegationError::Cancelled);
        }

        let state = self.store.state();
        let Some((project, document)) = state
            .project(request.document.project())
            .zip(state.document(&request.document))
        else {
            return Err(DelegationError::DocumentNotFound(request.document));
        };

        let projection = match request.position {
            HostPosition::Offset(offset) => self.engine.project(document, offset)?,
            HostPosition::LineCol(position) => self.engine.project_position(document, position)?,
        };
        let kind = projection.language_kind;

        if let Some(local) = self.local.as_ref().filter(|local| local.owns(kind)) {
            let generated = document
                .generated_document()
                .map_err(ProjectionError::from)?;
            tracing::debug!(feature = F::NAME, %kind, document = %document.key(), "handling locally");
            return Ok(local.handle(LocalRequest {
                project,
                document,
                generated: &generated,
                projection,
                encoding: self.engine.encoding(),
                params: request.params,
            })?);
        }

        if !kind.is_embedded() {
            tracing::debug!(feature = F::NAME, "no local handler for template position");
            return Ok(None);
        }
        if !self.delegation_enabled() {
            tracing::debug!(feature = F::NAME, %kind, "delegation disabled");
            return Ok(None);
        }
        let Some(handler) = self.registry.get(kind) else {
            tracing::debug!(feature = F::NAME, %kind, "no delegated handler registered");
            return Ok(None);
        };

        let delegated = DelegatedRequest::new(document, &projection, request.params);
        tracing::debug!(
            feature = F::NAME,
            %kind,
            document = %delegated.document.generated_path,
            offset = %delegated.offset,
            "dispatching"
        );

        let response = tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!(feature = F::NAME, "cancelled during dispatch");
                return Err(DelegationError::Cancelled);
            }
            response = handler.handle(delegated) => response.inspect_err(|error| {
                tracing::error!(feature = F::NAME, %kind, %error, "delegated handler failed");
            })?,
        };
        if token.is_cancelled() {
            return Err(DelegationError::Cancelled);
        }
        let Some(response) = response else {
            return Ok(None);
        };

        let generated = document
            .generated_document()
            .map_err(ProjectionError::from)?;
        let host = document.text().map_err(ProjectionError::from)?;
        let mapper = ResponseMapper::new(
            kind,
            &generated,
            &host.text,
            document.file_path(),
            self.engine.encoding(),
        );

        Ok(Some(response.remap_to_host(&mapper)))
    }
}

impl<F: Feature> fmt::Debug for Delegator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegator")
            .field("feature", &F::NAME)
            .field("engine", &self.engine)
            .field("registry", &self.registry)
            .field("local", &self.local.is_some())
            .field("delegation_enabled", &self.delegation_enabled())
            .finish_non_exhaustive()
    }
}
