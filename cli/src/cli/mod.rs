mod server;
mod session;

pub use server::ServerCommands;
pub use session::{ClearCommands, ServerConfigCommands, SessionCommands};

use clap::{Parser, Subcommand};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check the conversion server and print its versions
    Ping,

    /// Send keys to a fresh session, e.g. `k a n Space` or `Ctrl+Space`
    Key {
        #[arg(required = true)]
        keys: Vec<String>,

        /// Ask whether the keys would be consumed without applying them
        #[arg(short, long)]
        test: bool,
    },

    /// Send a session command (revert, submit, select-candidate, ...)
    Command {
        name: String,

        /// Candidate id for candidate commands
        #[arg(long)]
        id: Option<u32>,
    },

    /// Read or write the conversion server's configuration
    ServerConfig {
        #[command(subcommand)]
        command: ServerConfigCommands,
    },

    /// Create or delete a conversion session
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Clear learned user data on the server
    Clear {
        #[command(subcommand)]
        command: ClearCommands,
    },

    /// Manage the conversion server process
    Server {
        #[command(subcommand)]
        command: ServerCommands,
    },

    /// Show or edit the local configuration
    Config {
        #[arg(long)]
        path: bool,

        #[arg(long)]
        reset: bool,

        #[arg(short, long)]
        edit: bool,
    },

    /// Print the latest client log file
    Logs {
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,

        #[arg(short, long)]
        follow: bool,
    },
}

/// Client for the henkan conversion server
#[derive(Debug, Parser)]
#[command(name = "henkan", version, verbatim_doc_comment)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Carry the cascading-window flag on every request
    #[arg(long, global = true)]
    pub cascading_window: Option<bool>,
}
