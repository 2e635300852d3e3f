use std::path::Path;

use color_eyre::eyre::{eyre, Result, WrapErr};
use henkan_client::SessionClient;
use henkan_protocol::{
    compare_version, Config, KeyEvent, Output, SessionCommand, SessionCommandType,
    PRODUCT_VERSION, PROTOCOL_VERSION,
};

use crate::cli::{ClearCommands, ServerConfigCommands, SessionCommands};

pub fn ping(client: &mut SessionClient) -> Result<()> {
    client.no_operation()?;

    let info = client.server_info();
    let server_product = info.product_version.as_deref().unwrap_or("unknown");
    println!("Server reachable");
    println!(
        "Protocol:  client {}, server {}",
        PROTOCOL_VERSION,
        info.protocol_version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );
    println!("Product:   client {}, server {}", PRODUCT_VERSION, server_product);
    if let Some(pid) = info.pid {
        println!("Pid:       {}", pid);
    }
    if compare_version(server_product, PRODUCT_VERSION).is_lt() {
        println!("Server is older than this client and could not be updated.");
    }
    Ok(())
}

pub fn keys(client: &mut SessionClient, specs: &[String], test: bool) -> Result<()> {
    let events = specs
        .iter()
        .map(|key| KeyEvent::parse(key).ok_or_else(|| eyre!("Invalid key: {:?}", key)))
        .collect::<Result<Vec<_>>>()?;

    let mut last = None;
    for (key, event) in specs.iter().zip(events) {
        let output = if test {
            client.test_send_key(event)?
        } else {
            client.send_key(event)?
        };
        println!("{:<12} consumed={}", key, output.consumed);
        last = Some(output);
    }
    if let Some(output) = &last {
        print_output(output);
    }

    client.delete_session()?;
    Ok(())
}

pub fn command(client: &mut SessionClient, name: &str, id: Option<u32>) -> Result<()> {
    let kind =
        SessionCommandType::from_name(name).ok_or_else(|| eyre!("Unknown command: {}", name))?;
    let mut command = SessionCommand::new(kind);
    command.id = id;

    let output = client.send_command(command)?;
    print_output(&output);
    Ok(())
}

pub fn server_config(client: &mut SessionClient, command: ServerConfigCommands) -> Result<()> {
    match command {
        ServerConfigCommands::Get => {
            let config = client.get_config()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            if let Some(modified) = config
                .last_modified_time
                .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            {
                eprintln!("Last modified: {}", modified.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
        ServerConfigCommands::Set { file } => {
            let config = read_config(&file)?;
            client.set_config(config)?;
            println!("Server configuration updated from {}", file.display());
        }
    }
    Ok(())
}

pub fn session(client: &mut SessionClient, command: SessionCommands) -> Result<()> {
    client.ensure_session()?;
    let id = client.session_id();
    match command {
        SessionCommands::Create => println!("{}", id),
        SessionCommands::Delete => {
            client.delete_session()?;
            println!("Deleted session {}", id);
        }
    }
    Ok(())
}

pub fn clear(client: &mut SessionClient, command: ClearCommands) -> Result<()> {
    let what = match command {
        ClearCommands::History => {
            client.clear_user_history()?;
            "user history"
        }
        ClearCommands::Prediction => {
            client.clear_user_prediction()?;
            "user prediction"
        }
        ClearCommands::UnusedPrediction => {
            client.clear_unused_user_prediction()?;
            "unused user prediction"
        }
    };
    println!("Cleared {}", what);
    Ok(())
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).wrap_err_with(|| format!("Invalid config in {}", path.display()))
}

fn print_output(output: &Output) {
    if let Some(preedit) = &output.preedit {
        println!("Preedit:    {} (cursor {})", preedit.text(), preedit.cursor);
    }
    if let Some(candidates) = &output.candidates {
        println!("Candidates: {}", candidates.size);
        for (index, candidate) in candidates.candidates.iter().enumerate() {
            let marker = if candidates.focused_index == Some(index as u32) {
                '>'
            } else {
                ' '
            };
            match &candidate.annotation {
                Some(note) => println!("  {} {:>3} {} ({})", marker, candidate.id, candidate.value, note),
                None => println!("  {} {:>3} {}", marker, candidate.id, candidate.value),
            }
        }
    }
    if let Some(result) = &output.result {
        println!("Result:     {}", result.value);
    }
    if let Some(elapsed) = output.elapsed_time {
        println!(
            "Elapsed:    {}",
            humantime::format_duration(std::time::Duration::from_micros(elapsed))
        );
    }
}
