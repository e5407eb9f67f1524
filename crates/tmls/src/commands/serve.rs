use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use crate::cli::GlobalArgs;
use crate::commands::Command;

#[derive(Debug, Parser)]
pub struct Serve {
    /// Log at debug level to the log file and the client.
    #[arg(long)]
    debug: bool,
}

impl Command for Serve {
    async fn execute(&self, args: &GlobalArgs) -> Result<ExitCode> {
        tmls_server::run(self.debug || args.verbose > 0).await?;
        Ok(ExitCode::SUCCESS)
    }
}
