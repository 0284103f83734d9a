//! quire CLI - Local-first notes from the command line
//!
//! Notes live in a local libSQL replica and are synced with the server on
//! demand.

mod cli;
mod commands;
mod config;
mod error;

#[cfg(test)]
mod tests;

use std::path::Path;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::resolve_db_path;
use crate::commands::config::run_config;
use crate::commands::edit::run_edit;
use crate::commands::list::{run_books, run_list};
use crate::commands::remove::run_remove;
use crate::commands::sync::run_sync;
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

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quire=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Config { command } => run_config(command),
        command => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_local(command, &db_path).await
        }
    }
}

async fn run_local(command: Commands, db_path: &Path) -> Result<(), CliError> {
    match command {
        Commands::Add { book, content } => run_add(&book, &content, db_path).await,
        Commands::List { book, limit, json } => {
            run_list(book.as_deref(), limit, json, db_path).await
        }
        Commands::Books { json } => run_books(json, db_path).await,
        Commands::Edit { id } => run_edit(&id, db_path).await,
        Commands::Remove { id, book } => {
            run_remove(id.as_deref(), book.as_deref(), db_path).await
        }
        Commands::Sync { full } => run_sync(full, db_path).await,
        Commands::Config { command } => run_config(command),
    }
}
