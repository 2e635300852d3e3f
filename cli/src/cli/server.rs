use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum ServerCommands {
    Start,

    /// Ask the server to exit, or kill it with --force
    Stop {
        #[arg(short, long)]
        force: bool,
    },

    Restart,

    Status,
}
