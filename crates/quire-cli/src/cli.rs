use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Local-first notes and books, synced with your quire server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a note to a book, creating the book if needed
    #[command(alias = "new")]
    Add {
        /// Book label
        book: String,
        /// Note content (read from stdin or $EDITOR when omitted)
        content: Vec<String>,
    },
    /// List recent notes
    #[command(alias = "ls")]
    List {
        /// Only show notes filed under this book
        book: Option<String>,
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List books
    Books {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing note in $EDITOR
    Edit {
        /// Note uuid or unique uuid prefix
        id: String,
    },
    /// Remove a note, or a whole book with --book
    #[command(alias = "rm")]
    Remove {
        /// Note uuid or unique uuid prefix
        #[arg(required_unless_present = "book", conflicts_with = "book")]
        id: Option<String>,
        /// Remove the book with this label and every note in it
        #[arg(long, value_name = "LABEL")]
        book: Option<String>,
    },
    /// Sync the local replica with the server
    Sync {
        /// Rebuild from scratch instead of pulling only recent changes
        #[arg(short, long)]
        full: bool,
    },
    /// Manage CLI configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update the config file
    Init {
        /// Server base URL, e.g. <https://api.example.com>
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,
        /// API key used as bearer token
        #[arg(long, value_name = "KEY")]
        api_key: Option<String>,
        /// HTTP request timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
    },
}
