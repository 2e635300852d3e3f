use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use henkan_client::{LauncherConfig, DEFAULT_CHANNEL_NAME};
use serde::{Deserialize, Serialize};
use tracing::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "off" | "none" => LogLevel::Off,
            "error" => LogLevel::Error,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Warn,
        }
    }

    pub fn as_tracing_level(&self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Conversion server binary, resolved through `PATH` when relative.
    pub program: String,
    pub args: Vec<String>,
    /// Channel name; the socket and pid file are named after it.
    pub channel: String,
    pub startup_timeout: String,
    pub terminate_timeout: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            program: "henkan-server".to_string(),
            args: Vec::new(),
            channel: DEFAULT_CHANNEL_NAME.to_string(),
            startup_timeout: "3s".to_string(),
            terminate_timeout: "3s".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub timeout: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: "5s".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UserConfig {
    pub log_level: LogLevel,
    pub server: ServerConfig,
    pub transport: TransportConfig,
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("henkan")
}

pub fn runtime_dir() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("henkan")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

pub fn ensure_dirs() -> std::io::Result<()> {
    fs::create_dir_all(config_dir())?;
    fs::create_dir_all(runtime_dir())?;
    Ok(())
}

impl UserConfig {
    pub fn load() -> Self {
        let path = config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let _ = ensure_dirs();
        let path = config_path();
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        fs::write(path, content)
    }

    pub fn socket_path(&self) -> PathBuf {
        runtime_dir().join(format!("{}.sock", self.server.channel))
    }

    pub fn pid_path(&self) -> PathBuf {
        runtime_dir().join(format!("{}.pid", self.server.channel))
    }

    pub fn io_timeout(&self) -> Duration {
        parse_duration(&self.transport.timeout, Duration::from_secs(5))
    }

    pub fn launcher_config(&self) -> LauncherConfig {
        let mut config = LauncherConfig::new(&self.server.program, self.socket_path());
        config.args = self.server.args.clone();
        config.pid_dir = runtime_dir();
        config.startup_timeout = parse_duration(
            &self.server.startup_timeout,
            henkan_client::DEFAULT_STARTUP_TIMEOUT,
        );
        config.terminate_timeout = parse_duration(
            &self.server.terminate_timeout,
            henkan_client::DEFAULT_TERMINATE_TIMEOUT,
        );
        config
    }
}

fn parse_duration(value: &str, fallback: Duration) -> Duration {
    match humantime::parse_duration(value.trim()) {
        Ok(duration) if !duration.is_zero() => duration,
        Ok(_) => fallback,
        Err(e) => {
            tracing::warn!(value, error = %e, "Invalid duration in config, using default");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let config = UserConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: UserConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: UserConfig = toml::from_str(
            r#"
            log_level = "debug"

            [server]
            program = "/opt/henkan/bin/server"
            startup_timeout = "750ms"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.log_level, LogLevel::Debug);
        assert_eq!(parsed.server.channel, DEFAULT_CHANNEL_NAME);
        assert_eq!(parsed.transport, TransportConfig::default());

        let launcher = parsed.launcher_config();
        assert_eq!(launcher.startup_timeout, Duration::from_millis(750));
        assert_eq!(launcher.terminate_timeout, Duration::from_secs(3));
        assert_eq!(launcher.program, PathBuf::from("/opt/henkan/bin/server"));
        assert_eq!(launcher.pid_file("henkan"), parsed.pid_path());
    }

    #[test]
    fn test_bad_durations_fall_back() {
        assert_eq!(
            parse_duration("soon", Duration::from_secs(5)),
            Duration::from_secs(5)
        );
        assert_eq!(
            parse_duration("0s", Duration::from_secs(5)),
            Duration::from_secs(5)
        );
        assert_eq!(
            parse_duration(" 2s ", Duration::from_secs(5)),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!(LogLevel::from_str("TRACE"), LogLevel::Trace);
        assert_eq!(LogLevel::from_str("none"), LogLevel::Off);
        assert_eq!(LogLevel::from_str("bogus"), LogLevel::Warn);
        assert_eq!(LogLevel::Off.as_tracing_level(), None);
    }

    #[test]
    fn test_socket_named_after_channel() {
        let mut config = UserConfig::default();
        config.server.channel = "henkan-dev".to_string();
        assert!(config.socket_path().ends_with("henkan/henkan-dev.sock"));
        assert!(config.pid_path().ends_with("henkan/henkan-dev.pid"));
    }
}
