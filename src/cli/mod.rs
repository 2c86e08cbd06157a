//! CLI surface for the retrieva-server binary.
//!
//! Minimal by design (SPEC_FULL.md §10): `init` scaffolds a starter `ares.toml`
//! and `.env.example`, `serve` (the default with no subcommand) runs the HTTP
//! server. Uses clap for argument parsing and owo-colors for colored output,
//! mirroring the teacher's CLI conventions.

pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// retrieva-server - multi-tenant RAG retrieval and Deep Research service
#[derive(Parser, Debug)]
#[command(
    name = "retrieva-server",
    version,
    about = "Multi-tenant RAG retrieval and synthesis service",
    long_about = "A multi-tenant document retrieval, hybrid search, and Deep Research service.\n\n\
                  Run without arguments to start the server, or use 'init' to scaffold a new project.",
    after_help = "EXAMPLES:\n    \
                  retrieva-server init              # Scaffold a new project\n    \
                  retrieva-server                   # Start the server (requires ares.toml)\n    \
                  retrieva-server --config my.toml  # Use a custom config file"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "ares.toml", global = true)]
    pub config: PathBuf,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new project with a starter configuration
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files without prompting
        #[arg(short, long)]
        force: bool,

        /// Host address for the server
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for the server
        #[arg(long, default_value = "3000")]
        port: u16,
    },

    /// Start the HTTP server (same as running with no subcommand)
    Serve,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
