//! Tally - a local report server for plain-text ledgers.

mod actor;
mod cli;
mod config;
mod core;
mod embed;
mod ledger;
mod logger;
mod mode;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::Cli;
use cli::serve::ServeError;
use config::ServerConfig;
use ledger::Ledgers;
use mode::ServingMode;

const PORT_IN_USE: &str = "Can not start webserver because the port is already in use. \
                           Please choose another port with the '-p' option.";

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = ServerConfig::resolve(cli, ServerConfig::env_file())
        .unwrap_or_else(|e| cli::usage_error(e));

    let ledgers = Ledgers::load(&config.filenames).context("failed to load ledgers")?;
    crate::debug!("load"; "{}", utils::plural::plural_count(ledgers.len(), "ledger"));
    let mode = ServingMode::select(&config);

    match cli::serve::run(mode, &config, Arc::new(ledgers)) {
        Err(e) if matches!(e.downcast_ref::<ServeError>(), Some(ServeError::PortInUse { .. })) => {
            cli::usage_error(PORT_IN_USE)
        }
        result => result,
    }
}
