use std::fmt;
use std::sync::Arc;
use std::sync::OnceLock;

use camino::Utf8Path;
use tmls_codegen::DocumentGenerator;
use tmls_codegen::GeneratedDocument;
use tmls_codegen::GenerationContext;
use tmls_source::LoadedText;
use tmls_source::TextLoadError;
use tmls_source::TextLoader;

use crate::DocumentKey;
use crate::HostDocument;
use crate::ProjectConfiguration;

/// Immutable state of one document at one version.
///
/// Clones share the same underlying state, including the memoized text and
/// generated document.
#[derive(Clone)]
pub struct DocumentSnapshot(Arc<DocumentState>);

struct DocumentState {
    key: DocumentKey,
    host_document: HostDocument,
    version: u64,
    loader: Arc<dyn TextLoader>,
    configuration: ProjectConfiguration,
    generator: Arc<dyn DocumentGenerator>,
    text: OnceLock<LoadedText>,
    generated: OnceLock<Arc<GeneratedDocument>>,
}

impl DocumentSnapshot {
    pub(crate) fn new(
        key: DocumentKey,
        host_document: HostDocument,
        loader: Arc<dyn TextLoader>,
        configuration: ProjectConfiguration,
        generator: Arc<dyn DocumentGenerator>,
    ) -> Self {
        Self(Arc::new(DocumentState {
            key,
            host_document,
            version: 0,
            loader,
            configuration,
            generator,
            text: OnceLock::new(),
            generated: OnceLock::new(),
        }))
    }

    /// The next version of this document, backed by a new loader.
    pub(crate) fn with_loader(&self, loader: Arc<dyn TextLoader>) -> Self {
        Self(Arc::new(DocumentState {
            key: self.0.key.clone(),
            host_document: self.0.host_document.clone(),
            version: self.0.version + 1,
            loader,
            configuration: self.0.configuration.clone(),
            generator: Arc::clone(&self.0.generator),
            text: OnceLock::new(),
            generated: OnceLock::new(),
        }))
    }

    /// Same version and content under a new project configuration.
    ///
    /// Loaded text carries over; the generated document does not.
    pub(crate) fn with_configuration(&self, configuration: ProjectConfiguration) -> Self {
        let text = OnceLock::new();
        if let Some(loaded) = self.0.text.get() {
            let _ = text.set(loaded.clone());
        }
        Self(Arc::new(DocumentState {
            key: self.0.key.clone(),
            host_document: self.0.host_document.clone(),
            version: self.0.version,
            loader: Arc::clone(&self.0.loader),
            configuration,
            generator: Arc::clone(&self.0.generator),
            text,
            generated: OnceLock::new(),
        }))
    }

    #[must_use]
    pub fn key(&self) -> &DocumentKey {
        &self.0.key
    }

    #[must_use]
    pub fn file_path(&self) -> &Utf8Path {
        self.0.key.path()
    }

    #[must_use]
    pub fn host_document(&self) -> &HostDocument {
        &self.0.host_document
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.0.version
    }

    #[must_use]
    pub fn loader(&self) -> &Arc<dyn TextLoader> {
        &self.0.loader
    }

    #[must_use]
    pub fn configuration(&self) -> &ProjectConfiguration {
        &self.0.configuration
    }

    /// The document's text, loaded on first use.
    ///
    /// Failed loads are not cached.
    pub fn text(&self) -> Result<LoadedText, TextLoadError> {
        if let Some(loaded) = self.0.text.get() {
            return Ok(loaded.clone());
        }
        let loaded = self.0.loader.load()?;
        Ok(self.0.text.get_or_init(|| loaded).clone())
    }

    /// The generated document for this version, computed on first use.
    ///
    /// Two readers racing on the first computation both compute; whichever
    /// publishes first wins and both receive that value.
    pub fn generated_document(&self) -> Result<Arc<GeneratedDocument>, TextLoadError> {
        if let Some(generated) = self.0.generated.get() {
            return Ok(Arc::clone(generated));
        }

        let loaded = self.text()?;
        let context = GenerationContext {
            target_path: &self.0.host_document.target_path,
            language_version: &self.0.configuration.language_version,
            root_namespace: self.0.configuration.root_namespace.as_deref(),
        };
        let generated = Arc::new(self.0.generator.generate(&loaded.text, &context));
        tracing::trace!(document = %self.0.key, version = self.0.version, "computed generated document");

        Ok(Arc::clone(self.0.generated.get_or_init(|| generated)))
    }

    /// Whether the generated document has been computed for this version.
    #[must_use]
    pub fn has_generated_document(&self) -> bool {
        self.0.generated.get().is_some()
    }

    /// Whether both handles refer to the same snapshot instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for DocumentSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.0.key == other.0.key
                && self.0.version == other.0.version
                && Arc::ptr_eq(&self.0.loader, &other.0.loader))
    }
}

impl Eq for DocumentSnapshot {}

impl fmt::Debug for DocumentSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSnapshot")
            .field("key", &self.0.key)
            .field("version", &self.0.version)
            .field("loader", &self.0.loader)
            .finish_non_exhaustive()
    }
}
