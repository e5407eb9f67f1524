use std::path::Path;

use config::Config;
use config::ConfigError as ExternalConfigError;
use config::File;
use config::FileFormat;
use directories::ProjectDirs;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration build/deserialize error")]
    Config(#[from] ExternalConfigError),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub debug: bool,
    pub language_version: String,
    pub root_namespace: Option<String>,
    /// Forward embedded-language requests to the editor's own servers.
    pub single_server_support: bool,
    pub template_extensions: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            language_version: "latest".to_string(),
            root_namespace: None,
            single_server_support: true,
            template_extensions: vec!["tmpl".to_string(), "html".to_string()],
        }
    }
}

impl Settings {
    pub fn new(project_root: &Path) -> Result<Self, ConfigError> {
        Self::with_overrides(project_root, None)
    }

    /// Loads settings with editor-supplied values layered on top of every
    /// file source.
    pub fn with_overrides(
        project_root: &Path,
        overrides: Option<&serde_json::Value>,
    ) -> Result<Self, ConfigError> {
        let user_config_file = ProjectDirs::from("com.github", "tmls", "tmls")
            .map(|proj_dirs| proj_dirs.config_dir().join("tmls.toml"));

        Self::load_from_paths(project_root, user_config_file.as_deref(), overrides)
    }

    fn load_from_paths(
        project_root: &Path,
        user_config_path: Option<&Path>,
        overrides: Option<&serde_json::Value>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = user_config_path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        builder = builder.add_source(
            File::from(project_root.join(".tmls.toml"))
                .format(FileFormat::Toml)
                .required(false),
        );

        builder = builder.add_source(
            File::from(project_root.join("tmls.toml"))
                .format(FileFormat::Toml)
                .required(false),
        );

        if let Some(overrides) = overrides.filter(|value| value.is_object()) {
            builder = builder.add_source(Config::try_from(overrides)?);
        }

        let config = builder.build()?;
        let settings: Self = config.try_deserialize()?;
        tracing::debug!(?settings, root = %project_root.display(), "loaded settings");
        Ok(settings)
    }

    /// Whether `path` names a template this server should manage.
    #[must_use]
    pub fn is_template(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| {
                self.template_extensions
                    .iter()
                    .any(|candidate| candidate.eq_ignore_ascii_case(extension))
            })
    }
}
