use camino::Utf8PathBuf;

use crate::DocumentKey;
use crate::ProjectKey;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectError {
    #[error("project '{0}' already exists")]
    DuplicateProject(ProjectKey),

    #[error("project '{0}' does not exist")]
    UnknownProject(ProjectKey),

    #[error("document '{document}' is already owned by project '{owner}'")]
    DuplicateDocument {
        document: Utf8PathBuf,
        owner: ProjectKey,
    },

    #[error("document '{document}' does not exist in project '{project}'")]
    UnknownDocument {
        project: ProjectKey,
        document: Utf8PathBuf,
    },

    #[error("the store cannot be mutated while change notifications are being delivered")]
    Reentrancy,
}

impl ProjectError {
    pub(crate) fn unknown_document(key: &DocumentKey) -> Self {
        Self::UnknownDocument {
            project: key.project().clone(),
            document: key.path().to_path_buf(),
        }
    }
}
