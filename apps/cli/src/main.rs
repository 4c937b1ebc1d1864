//! RfpCheck CLI — validate RFP demands against authenticated help-center articles.
//!
//! Replays a browser session, indexes the articles it can reach, and asks a
//! language model for a grounded YES / NO / PARTIALLY verdict.

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
