//! Lazy, pluggable document content sources.
//!
//! A snapshot stores a [`TextLoader`] handle rather than content. The text is
//! only produced when something needs it, which lets the store accept
//! documents whose content lives in an editor buffer, on disk, or in a peer
//! process.

use std::fmt;
use std::io;
use std::sync::Arc;

use camino::Utf8Path;
use camino::Utf8PathBuf;

use crate::FileSystem;
use crate::SourceText;
use crate::TextEncoding;

/// Text and encoding produced by a [`TextLoader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedText {
    pub text: SourceText,
    pub encoding: TextEncoding,
}

impl LoadedText {
    #[must_use]
    pub fn new(text: SourceText) -> Self {
        let encoding = TextEncoding::detect(text.as_str());
        Self { text, encoding }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextLoadError {
    #[error("failed to read '{path}': {message}")]
    Io { path: Utf8PathBuf, message: String },
    #[error("document '{path}' is not available")]
    Unavailable { path: Utf8PathBuf },
}

impl TextLoadError {
    pub fn io(path: &Utf8Path, error: &io::Error) -> Self {
        Self::Io {
            path: path.to_owned(),
            message: error.to_string(),
        }
    }
}

/// Capability that produces a document's current content on demand.
pub trait TextLoader: Send + Sync + fmt::Debug {
    fn load(&self) -> Result<LoadedText, TextLoadError>;
}

/// A loader over text that is already in memory.
#[derive(Debug, Clone)]
pub struct InMemoryTextLoader {
    text: SourceText,
}

impl InMemoryTextLoader {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: SourceText::new(text),
        }
    }

    #[must_use]
    pub fn shared(text: impl Into<String>) -> Arc<dyn TextLoader> {
        Arc::new(Self::new(text))
    }
}

impl TextLoader for InMemoryTextLoader {
    fn load(&self) -> Result<LoadedText, TextLoadError> {
        Ok(LoadedText::new(self.text.clone()))
    }
}

/// A loader that reads a path through a [`FileSystem`] each time it is asked.
#[derive(Clone)]
pub struct FileTextLoader {
    path: Utf8PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileTextLoader {
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl fmt::Debug for FileTextLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileTextLoader")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl TextLoader for FileTextLoader {
    fn load(&self) -> Result<LoadedText, TextLoadError> {
        tracing::trace!(path = %self.path, "loading document text");
        match self.fs.read_to_string(&self.path) {
            Ok(source) => Ok(LoadedText::new(SourceText::new(source))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(TextLoadError::Unavailable {
                path: self.path.clone(),
            }),
            Err(err) => Err(TextLoadError::io(&self.path, &err)),
        }
    }
}
