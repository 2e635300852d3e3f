pub mod config;
pub mod logs;
pub mod server;
pub mod session;

use std::sync::Arc;

use henkan_client::{
    LoggingErrorSink, ProcessLauncher, SessionClient, UnixSocketTransport, UsageObserver,
};

use crate::config::UserConfig;

/// Builds a session client for the configured channel.
pub fn connect(
    config: &UserConfig,
    cascading_window: Option<bool>,
    observer: Arc<dyn UsageObserver>,
) -> SessionClient {
    let transport = UnixSocketTransport::new(config.socket_path()).with_timeout(config.io_timeout());
    let launcher = ProcessLauncher::new(config.launcher_config(), Arc::new(LoggingErrorSink));

    let mut client = SessionClient::new(transport, launcher)
        .with_channel_name(&config.server.channel)
        .with_observer(observer);
    if let Some(enabled) = cascading_window {
        client.enable_cascading_window(enabled);
    }
    client
}
