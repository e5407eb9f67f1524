use std::fmt;
use std::sync::Arc;

use camino::Utf8Path;
use tmls_source::FileSystem;
use tmls_source::FileTextLoader;
use tmls_source::InMemoryTextLoader;
use tmls_source::TextLoader;

use super::Buffers;

/// Produces the text loader a document snapshot is created with.
pub trait TextLoaderFactory: Send + Sync + fmt::Debug {
    fn create(&self, path: &Utf8Path) -> Arc<dyn TextLoader>;
}

/// Open buffers win over the disk.
///
/// An open buffer is copied into the loader when it is created, so the
/// loader keeps answering with that content after later edits.
#[derive(Clone)]
pub struct BufferedLoaderFactory {
    buffers: Buffers,
    fs: Arc<dyn FileSystem>,
}

impl BufferedLoaderFactory {
    #[must_use]
    pub fn new(buffers: Buffers, fs: Arc<dyn FileSystem>) -> Self {
        Self { buffers, fs }
    }
}

impl TextLoaderFactory for BufferedLoaderFactory {
    fn create(&self, path: &Utf8Path) -> Arc<dyn TextLoader> {
        if let Some(document) = self.buffers.get(path) {
            tracing::trace!(%path, version = document.version(), "loader from open buffer");
            return Arc::new(InMemoryTextLoader::new(document.content()));
        }
        Arc::new(FileTextLoader::new(path, Arc::clone(&self.fs)))
    }
}

impl fmt::Debug for BufferedLoaderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedLoaderFactory")
            .field("buffers", &self.buffers)
            .finish_non_exhaustive()
    }
}
