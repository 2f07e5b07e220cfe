mod audit;
mod catalog;
mod cli;
mod engine;
mod exec;
mod model;
mod orchestrator;
mod privilege;
mod summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let headless = args.text || args.json;

    cli::run(args).await?;

    // Explicit code 0 for headless modes used from scripts.
    if headless {
        std::process::exit(0);
    }
    Ok(())
}
