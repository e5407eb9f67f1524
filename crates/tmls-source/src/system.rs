use std::io;

use camino::Utf8Path;
use camino::Utf8PathBuf;

use crate::FxDashMap;

/// Read access to file contents.
///
/// Text loaders read through this seam so that tests and editor overlays can
/// stand in for the disk.
pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Utf8Path) -> io::Result<String>;
    fn exists(&self, path: &Utf8Path) -> bool;
}

/// In-memory file system. Contents can be replaced while shared.
#[derive(Default)]
pub struct InMemoryFileSystem {
    files: FxDashMap<Utf8PathBuf, String>,
}

impl InMemoryFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: Utf8PathBuf, content: String) {
        self.files.insert(path, content);
    }

    pub fn remove_file(&self, path: &Utf8Path) {
        self.files.remove(path);
    }
}

impl FileSystem for InMemoryFileSystem {
    fn read_to_string(&self, path: &Utf8Path) -> io::Result<String> {
        self.files
            .get(path)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "File not found"))
    }

    fn exists(&self, path: &Utf8Path) -> bool {
        self.files.contains_key(path)
    }
}

/// Standard file system implementation that uses [`std::fs`].
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read_to_string(&self, path: &Utf8Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Utf8Path) -> bool {
        path.exists()
    }
}
