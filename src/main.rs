mod cli;
mod collectors;
mod model;
mod nav;
mod orchestrator;
mod sessions;
mod storage;
mod submitter;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    cli::run(args).await
}
