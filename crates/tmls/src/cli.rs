use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use crate::commands::Command;
use crate::commands::TmlsCommand;

#[derive(Parser)]
#[command(name = "tmls")]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: TmlsCommand,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Flags accepted before or after any subcommand.
#[derive(Parser, Debug, Clone)]
pub struct GlobalArgs {
    /// Suppress normal output; the exit code still reports failure.
    #[arg(global = true, long, short, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log to stderr: `-v` for debug, `-vv` for trace.
    #[arg(global = true, action = clap::ArgAction::Count, long, short, conflicts_with = "quiet")]
    pub verbose: u8,
}

pub async fn run(args: Vec<String>) -> Result<ExitCode> {
    let cli = Cli::try_parse_from(args).unwrap_or_else(|e| {
        e.exit();
    });

    cli.command.execute(&cli.global).await
}
