//! Descriptors handed to the store by the external authority.
//!
//! These carry identity and configuration only. Document content always
//! arrives separately through a [`tmls_source::TextLoader`].

use camino::Utf8Path;
use camino::Utf8PathBuf;
use serde::Deserialize;
use serde::Serialize;

use crate::ProjectKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfiguration {
    pub language_version: String,
    pub root_namespace: Option<String>,
}

impl Default for ProjectConfiguration {
    fn default() -> Self {
        Self {
            language_version: "latest".to_string(),
            root_namespace: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Tag,
    Filter,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: SymbolKind,
    pub documentation: Option<String>,
}

/// Symbol-derived state reported by the workspace for a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectWorkspaceState {
    pub symbols: Vec<SymbolInfo>,
    pub language_version: Option<String>,
}

impl ProjectWorkspaceState {
    #[must_use]
    pub fn symbol(&self, name: &str) -> Option<&SymbolInfo> {
        self.symbols.iter().find(|symbol| symbol.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostProject {
    pub file_path: Utf8PathBuf,
    pub configuration: ProjectConfiguration,
}

impl HostProject {
    #[must_use]
    pub fn new(file_path: impl Into<Utf8PathBuf>, configuration: ProjectConfiguration) -> Self {
        Self {
            file_path: file_path.into(),
            configuration,
        }
    }

    #[must_use]
    pub fn key(&self) -> ProjectKey {
        ProjectKey::from_path(&self.file_path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDocument {
    pub file_path: Utf8PathBuf,
    /// Logical path used to name generated documents.
    pub target_path: Utf8PathBuf,
}

impl HostDocument {
    #[must_use]
    pub fn new(file_path: impl Into<Utf8PathBuf>) -> Self {
        let file_path = file_path.into();
        Self {
            target_path: file_path.clone(),
            file_path,
        }
    }

    #[must_use]
    pub fn with_target_path(mut self, target_path: impl Into<Utf8PathBuf>) -> Self {
        self.target_path = target_path.into();
        self
    }

    #[must_use]
    pub fn file_path(&self) -> &Utf8Path {
        &self.file_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_defaults_from_partial_json() {
        let configuration: ProjectConfiguration =
            serde_json::from_str(r#"{"root_namespace": "Site"}"#).unwrap();
        assert_eq!(configuration.language_version, "latest");
        assert_eq!(configuration.root_namespace.as_deref(), Some("Site"));
    }

    #[test]
    fn test_workspace_state_symbol_lookup() {
        let state = ProjectWorkspaceState {
            symbols: vec![SymbolInfo {
                name: "include".to_string(),
                kind: SymbolKind::Tag,
                documentation: Some("Render another template.".to_string()),
            }],
            language_version: None,
        };
        assert!(state.symbol("include").is_some());
        assert!(state.symbol("extends").is_none());
    }

    #[test]
    fn test_host_document_target_defaults_to_file_path() {
        let document = HostDocument::new("/p/a.tmpl");
        assert_eq!(document.target_path, Utf8PathBuf::from("/p/a.tmpl"));

        let document = document.with_target_path("a.tmpl");
        assert_eq!(document.target_path, Utf8PathBuf::from("a.tmpl"));
    }
}
