//! Liore CLI - Command-line admin tool for story owners
//!
//! Reads and edits the shared owner list with the same local-first policy as
//! the admin page: the local cache is always written, the remote store when
//! it is reachable.

mod cli;
mod commands;
mod error;
mod notifier;

#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::clear::run_clear;
use crate::commands::common::{load_config, open_store, resolve_cache_path, resolve_config_path};
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::export::run_export;
use crate::commands::import::run_import;
use crate::commands::list::run_list;
use crate::commands::status::run_status;
use crate::commands::update::run_update;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let config_path = resolve_config_path(cli.config)?;
    let command = match cli.command {
        Commands::Config { command } => return run_config(command, &config_path),
        command => command,
    };

    let config = load_config(&config_path)?;
    let cache_path = resolve_cache_path(cli.cache_path)?;
    let store = open_store(&config, &cache_path, cli.quiet)?;

    match command {
        Commands::List { json } => run_list(&store, json).await?,
        Commands::Add { name, fields } => {
            run_add(&store, &name, &fields).await?;
        }
        Commands::Update { id, name, fields } => {
            run_update(&store, &id, name.as_deref(), &fields).await?;
        }
        Commands::Delete { id } => run_delete(&store, &id).await?,
        Commands::Export { output } => run_export(&store, output.as_deref()).await?,
        Commands::Import { path } => run_import(&store, &path).await?,
        Commands::Watch { json } => run_watch(&store, json).await?,
        Commands::Status { json } => {
            run_status(&store, json).await?;
        }
        Commands::Clear { yes } => run_clear(&store, yes).await?,
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn init_tracing(quiet: bool) {
    let directive = if quiet { "liore=warn" } else { "liore=info" };
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = directive.parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
