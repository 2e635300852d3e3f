use std::path::PathBuf;

use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum ServerConfigCommands {
    /// Print the server configuration as JSON
    Get,

    /// Replace the server configuration with a JSON file
    Set { file: PathBuf },
}

#[derive(Debug, Subcommand)]
pub enum SessionCommands {
    /// Create a session and print its id
    Create,

    /// Create a session and delete it again
    Delete,
}

#[derive(Debug, Subcommand)]
pub enum ClearCommands {
    History,

    Prediction,

    UnusedPrediction,
}
