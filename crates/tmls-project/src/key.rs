use std::fmt;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use serde::Deserialize;
use serde::Serialize;
use tmls_source::Utf8PathClean;

/// Identity of a project, derived from its normalized file path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectKey(Utf8PathBuf);

impl ProjectKey {
    #[must_use]
    pub fn from_path(path: &Utf8Path) -> Self {
        Self(path.clean())
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.0
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a document: its project plus its own normalized path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentKey {
    project: ProjectKey,
    path: Utf8PathBuf,
}

impl DocumentKey {
    #[must_use]
    pub fn new(project: ProjectKey, path: &Utf8Path) -> Self {
        Self {
            project,
            path: path.clean(),
        }
    }

    #[must_use]
    pub fn project(&self) -> &ProjectKey {
        &self.project
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.project, self.path)
    }
}
