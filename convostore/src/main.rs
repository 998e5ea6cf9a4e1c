use clap::Parser;
use eyre::{Context, Result};
use log::info;

use convostore::cli::Cli;

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env().filter_level(log::LevelFilter::Info).init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("failed to set up logging")?;
    let cli = Cli::parse();
    info!("convostore starting");
    convostore::cli::run(cli)
}
