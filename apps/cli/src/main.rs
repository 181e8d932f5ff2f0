//! Dealboard CLI — local-first enrichment for a pitch-show database.
//!
//! Searches the web for stored products and investors, asks a model
//! for structured deal facts, and persists the validated results.

mod commands;

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
