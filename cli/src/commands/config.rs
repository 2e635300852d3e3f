use color_eyre::eyre::{Result, WrapErr};

use crate::config::{config_path, UserConfig};

pub fn run(path: bool, reset: bool, edit: bool) -> Result<()> {
    let config_file = config_path();

    if path {
        println!("{}", config_file.display());
        return Ok(());
    }

    if reset {
        UserConfig::default().save()?;
        println!("Config reset to defaults at: {}", config_file.display());
        return Ok(());
    }

    if edit {
        let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

        if !config_file.exists() {
            UserConfig::default().save()?;
        }

        std::process::Command::new(editor)
            .arg(&config_file)
            .status()?;

        // `load` silently falls back to defaults, so surface parse errors here.
        let content = std::fs::read_to_string(&config_file)?;
        toml::from_str::<UserConfig>(&content)
            .wrap_err_with(|| format!("{} is not valid", config_file.display()))?;
        return Ok(());
    }

    let config = UserConfig::load();
    println!("Config file: {}", config_file.display());
    println!("Socket:      {}", config.socket_path().display());
    println!();
    println!("{}", toml::to_string_pretty(&config)?);

    Ok(())
}
