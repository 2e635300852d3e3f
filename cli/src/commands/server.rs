use std::sync::Arc;

use color_eyre::eyre::{bail, Result, WrapErr};
use henkan_client::{
    read_pid, LoggingErrorSink, ProcessLauncher, ServerLauncher, SessionClient, Transport,
    UnixSocketTransport,
};
use henkan_protocol::{compare_version, CommandType, Input, PRODUCT_VERSION, PROTOCOL_VERSION};

use crate::cli::ServerCommands;
use crate::config::{runtime_dir, UserConfig};

pub fn run(command: ServerCommands, config: &UserConfig, client: &mut SessionClient) -> Result<()> {
    let mut launcher = ProcessLauncher::new(config.launcher_config(), Arc::new(LoggingErrorSink));

    match command {
        ServerCommands::Start => start(config, &mut launcher),
        ServerCommands::Stop { force } => stop(config, client, &mut launcher, force),
        ServerCommands::Restart => {
            if is_reachable(config) {
                stop(config, client, &mut launcher, false)?;
            }
            start(config, &mut launcher)
        }
        ServerCommands::Status => status(config),
    }
}

fn is_reachable(config: &UserConfig) -> bool {
    UnixSocketTransport::new(config.socket_path()).connect()
}

fn start(config: &UserConfig, launcher: &mut ProcessLauncher) -> Result<()> {
    if is_reachable(config) {
        println!("Server is already running.");
        return Ok(());
    }

    println!("Starting {}...", config.server.program);
    if !launcher.start_server() {
        bail!(
            "Server did not come up within {}. Check logs:\n  henkan logs",
            config.server.startup_timeout
        );
    }
    println!("Server started.");
    println!("Socket: {:?}", config.socket_path());
    Ok(())
}

fn stop(
    config: &UserConfig,
    client: &mut SessionClient,
    launcher: &mut ProcessLauncher,
    force: bool,
) -> Result<()> {
    let pid = read_pid(&config.pid_path());

    if force {
        if !launcher.force_terminate_server(&config.server.channel) {
            bail!("No running server found for channel {}", config.server.channel);
        }
    } else {
        if !is_reachable(config) {
            println!("Server is not running.");
            return Ok(());
        }
        client
            .ensure_connection()
            .wrap_err("Server did not pass the version handshake; try --force")?;
        client.shutdown()?;
    }

    if let Some(pid) = pid {
        if !launcher.wait_server(pid) {
            bail!(
                "Server (pid {}) still running after {}; try --force",
                pid,
                config.server.terminate_timeout
            );
        }
    }
    println!("Server stopped.");
    Ok(())
}

fn status(config: &UserConfig) -> Result<()> {
    println!("Server Status");
    println!("{}", "-".repeat(40));
    println!("Channel:      {}", config.server.channel);
    println!("Socket:       {}", config.socket_path().display());
    println!("Logs:         {}", runtime_dir().display());

    match read_pid(&config.pid_path()) {
        Some(pid) => println!("Pid file:     {}", pid),
        None => println!("Pid file:     none"),
    }

    if !is_reachable(config) {
        println!("Running:      no");
        return Ok(());
    }
    println!("Running:      yes");

    // A plain probe never restarts anything, unlike `ping`.
    let mut transport = UnixSocketTransport::new(config.socket_path()).with_timeout(config.io_timeout());
    transport.connect();
    let request = Input::new(CommandType::NoOperation).to_json()?;
    match transport.call(request.as_bytes()) {
        Ok(reply) => {
            let product = reply.product_version.as_deref().unwrap_or("unknown");
            println!(
                "Protocol:     {} (client {})",
                reply.protocol_version, PROTOCOL_VERSION
            );
            println!("Version:      {} (client {})", product, PRODUCT_VERSION);
            let compatible = reply.protocol_version == PROTOCOL_VERSION
                && !compare_version(product, PRODUCT_VERSION).is_lt();
            println!("Compatible:   {}", if compatible { "yes" } else { "no" });
        }
        Err(e) => println!("Probe failed: {}", e),
    }

    Ok(())
}
