mod project;
mod serve;

use std::process::ExitCode;

use anyhow::Result;
use clap::Subcommand;

use crate::cli::GlobalArgs;

pub trait Command {
    async fn execute(&self, args: &GlobalArgs) -> Result<ExitCode>;
}

#[derive(Debug, Subcommand)]
pub enum TmlsCommand {
    /// Start the LSP server
    Serve(self::serve::Serve),
    /// Show where an offset of a template lands in its generated documents
    Project(self::project::Project),
}

impl Command for TmlsCommand {
    async fn execute(&self, args: &GlobalArgs) -> Result<ExitCode> {
        match self {
            TmlsCommand::Serve(command) => command.execute(args).await,
            TmlsCommand::Project(command) => command.execute(args).await,
        }
    }
}
