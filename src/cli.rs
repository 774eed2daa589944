//! Command-line interface for stateless_chess.

use clap::{Parser, Subcommand};

/// Stateless Chess - tamper-evident correspondence chess server
#[derive(Parser, Debug)]
#[command(name = "stateless_chess")]
#[command(about = "Correspondence chess over stamped links", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP game server
    Serve {
        /// Port to bind to (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides HOST)
        #[arg(long)]
        host: Option<String>,

        /// Sqlite database path (overrides DATABASE_URL)
        #[arg(long)]
        database: Option<String>,

        /// Public base URL for minted links (overrides BASE_URL)
        #[arg(long)]
        base_url: Option<String>,
    },
}
