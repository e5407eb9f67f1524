use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use clap::Parser;
use serde::Serialize;
use tmls_codegen::TemplateGenerator;
use tmls_conf::Settings;
use tmls_ide::generated_path;
use tmls_ide::Projection;
use tmls_ide::ProjectionEngine;
use tmls_project::HostDocument;
use tmls_project::HostProject;
use tmls_project::SnapshotStore;
use tmls_server::project_configuration;
use tmls_source::FileTextLoader;
use tmls_source::Offset;
use tmls_source::OsFileSystem;
use tmls_source::PositionEncoding;
use tmls_source::Utf8PathClean;
use tracing_subscriber::EnvFilter;

use crate::cli::GlobalArgs;
use crate::commands::Command;

#[derive(Debug, Parser)]
pub struct Project {
    /// Template file to load.
    file: Utf8PathBuf,

    /// Byte offset into the file.
    offset: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    document: Utf8PathBuf,
    version: u64,
    #[serde(flatten)]
    projection: Projection,
    generated_path: Option<Utf8PathBuf>,
}

impl Command for Project {
    async fn execute(&self, args: &GlobalArgs) -> Result<ExitCode> {
        init_stderr_logging(args.verbose);

        let path = absolute(&self.file)?;
        let root = path
            .parent()
            .with_context(|| format!("'{path}' has no parent directory"))?;
        let settings = Settings::new(root.as_std_path())?;

        let store = SnapshotStore::new(Arc::new(TemplateGenerator));
        let project = HostProject::new(root, project_configuration(&settings));
        store.add_project(&project)?;
        let document = store.add_document(
            &project,
            &HostDocument::new(path.clone()),
            Arc::new(FileTextLoader::new(path.clone(), Arc::new(OsFileSystem))),
        )?;
        tracing::debug!(%path, offset = self.offset, "projecting offset");

        let projection = ProjectionEngine::new(PositionEncoding::Utf8)
            .project(&document, Offset::new(self.offset))
            .with_context(|| format!("cannot project offset {} of '{path}'", self.offset))?;

        let report = Report {
            document: path.clone(),
            version: document.version(),
            generated_path: projection
                .language_kind
                .is_embedded()
                .then(|| generated_path(&path, projection.language_kind)),
            projection,
        };

        if !args.quiet {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Ok(ExitCode::SUCCESS)
    }
}

fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf> {
    if path.is_absolute() {
        return Ok(path.clean());
    }
    let cwd = std::env::current_dir().context("cannot read the current directory")?;
    let cwd = Utf8PathBuf::from_path_buf(cwd)
        .map_err(|cwd| anyhow::anyhow!("current directory is not UTF-8: {}", cwd.display()))?;
    Ok(cwd.join(path).clean())
}

fn init_stderr_logging(verbose: u8) {
    let level = match verbose {
        0 => return,
        1 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::new(level))
        .try_init();
}
