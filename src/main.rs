//! Taskweave CLI entry point.

use clap::Parser;

use taskweave::cli::{self, Cli};
use taskweave::infrastructure::{config::ConfigLoader, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    logging::init(&config.logging)?;

    cli::execute(cli.command, config, cli.json).await
}
