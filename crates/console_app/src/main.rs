//! Command-line operator console for the image/video generation backend.

mod cli;
mod commands;
mod config;
mod credentials;
mod output;
mod persist;

use anyhow::Context;
use clap::Parser;
use console_logging::{console_debug, console_info};
use log::LevelFilter;

use crate::cli::Cli;
use crate::commands::Console;
use crate::config::ConsoleConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ConsoleConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let overrides = config.apply_env(|key| std::env::var(key).ok());
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        config.level_filter()
    };
    console_logging::initialize(&config.log_destination(), level);
    console_info!("Task console against {}", config.base_url);
    console_debug!("Configuration: {:?}", config);

    let console = Console::connect(config, overrides)?;
    console.run(cli.command).await
}
