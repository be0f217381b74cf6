//! toolscout CLI: enriches raw tool-directory records into structured
//! profiles through an LLM analysis service.

mod commands;
mod http;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
