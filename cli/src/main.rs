mod cli;
mod commands;
mod config;
mod logging;

use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::Result;
use henkan_client::{LifecycleRegistry, UsageStats};
use tracing::{info, warn};

use cli::{Cli, Commands};
use config::{ensure_dirs, LogLevel, UserConfig};
use logging::LogMode;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = UserConfig::load();
    let log_level_override = cli.log_level.as_deref().map(LogLevel::from_str);

    let mode = match cli.command {
        Commands::Config { .. } | Commands::Logs { .. } => LogMode::Stderr,
        _ => LogMode::Both,
    };
    let _guard = logging::init(config.log_level, mode, log_level_override);

    let stats = Arc::new(UsageStats::new());
    let mut lifecycle = LifecycleRegistry::new();
    lifecycle.register_initializer("runtime-dirs", || {
        if let Err(e) = ensure_dirs() {
            warn!(error = %e, "Failed to create henkan directories");
        }
    });
    let summary = stats.clone();
    lifecycle.register_finalizer("usage-summary", move || {
        let usage = summary.snapshot();
        if usage.total_requests() > 0 {
            info!(
                requests = usage.total_requests(),
                sessions = usage.sessions_created,
                consumed_keys = usage.consumed_keys,
                server_elapsed_us = usage.total_elapsed_us,
                "Usage summary"
            );
        }
    });

    lifecycle.run_initializers();
    let result = run(cli, &config, stats);
    lifecycle.run_finalizers();
    result
}

fn run(cli: Cli, config: &UserConfig, stats: Arc<UsageStats>) -> Result<()> {
    let mut client = commands::connect(config, cli.cascading_window, stats);

    match cli.command {
        Commands::Ping => commands::session::ping(&mut client),
        Commands::Key { keys, test } => commands::session::keys(&mut client, &keys, test),
        Commands::Command { name, id } => commands::session::command(&mut client, &name, id),
        Commands::ServerConfig { command } => commands::session::server_config(&mut client, command),
        Commands::Session { command } => commands::session::session(&mut client, command),
        Commands::Clear { command } => commands::session::clear(&mut client, command),
        Commands::Server { command } => commands::server::run(command, config, &mut client),
        Commands::Config { path, reset, edit } => commands::config::run(path, reset, edit),
        Commands::Logs { lines, follow } => commands::logs::run(lines, follow),
    }
}
