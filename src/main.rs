mod ci;
mod cli;
mod config;
mod context;
mod error;
mod scm;
mod sheets;
mod store;
mod tools;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting perflens");
    cli.execute().await?;

    Ok(())
}
