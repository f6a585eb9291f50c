//! folio - an incremental static site builder.

#![allow(dead_code)]

mod address;
mod build;
mod cache;
mod cli;
mod config;
mod db;
mod env;
mod freshness;
mod hooks;
mod logger;
mod render;
mod template;
mod utils;

#[cfg(test)]
mod testing;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::SiteConfig;

fn main() -> Result<()> {
    // Ctrl+C handler goes in before anything blocks
    cli::serve::setup_shutdown_handler()?;

    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = SiteConfig::load(cli)?;

    match &cli.command {
        Commands::Build { .. } => cli::build::run_build(&config),
        Commands::Prune { all } => cli::build::run_prune(&config, *all),
        Commands::Clean => cli::build::run_clean(&config),
        Commands::Serve { .. } => cli::serve::run_serve(&config, cli),
        Commands::Query { target, alt, pretty } => {
            cli::query::run_query(&config, target, alt.as_deref(), *pretty)
        }
    }
}
