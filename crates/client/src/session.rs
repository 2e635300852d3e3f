//! The session client: connection handshake, version arbitration, bounded
//! server restarts and the public request operations.
//!
//! Every public operation starts a new call chain. A chain may restart
//! the server at most once, whatever step asked for it.

use std::sync::Arc;
use std::time::Instant;

use henkan_protocol::{
    CommandType, Config, ErrorCode, Input, KeyEvent, Output, SessionCommand, SessionId,
};
use tracing::{debug, error, info, warn};

use crate::arbiter::{Failure, Handshake, RestartReason, Verdict, VersionArbiter};
use crate::fatal::ServerErrorKind;
use crate::launcher::ServerLauncher;
use crate::observer::UsageObserver;
use crate::transport::{Reply, Transport, TransportError};

pub const DEFAULT_CHANNEL_NAME: &str = "henkan";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Conversion server is unreachable")]
    Unreachable,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Protocol version mismatch: client {client}, server {server}")]
    VersionMismatch { client: u32, server: u32 },

    #[error("Broken reply from conversion server: {0}")]
    BrokenMessage(String),

    #[error("Server restart failed ({0:?})")]
    RestartFailed(RestartReason),

    #[error("Request rejected by server: {0:?}")]
    Rejected(ErrorCode),

    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Unconnected,
    Connected,
    VersionMismatch,
    Broken,
}

/// State local to one top-level operation.
#[derive(Debug, Clone, Copy, Default)]
struct CallChain {
    restart_attempted: bool,
}

/// What the server last told us about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub protocol_version: Option<u32>,
    pub product_version: Option<String>,
    pub pid: Option<u32>,
}

pub struct SessionClient {
    transport: Box<dyn Transport>,
    launcher: Box<dyn ServerLauncher>,
    arbiter: VersionArbiter,
    channel_name: String,
    state: ConnectionState,
    session_id: SessionId,
    cascading_window: Option<bool>,
    server: ServerInfo,
    observers: Vec<Arc<dyn UsageObserver>>,
}

impl SessionClient {
    pub fn new(
        transport: impl Transport + 'static,
        launcher: impl ServerLauncher + 'static,
    ) -> Self {
        Self {
            transport: Box::new(transport),
            launcher: Box::new(launcher),
            arbiter: VersionArbiter::default(),
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            state: ConnectionState::Unconnected,
            session_id: SessionId::NONE,
            cascading_window: None,
            server: ServerInfo::default(),
            observers: Vec::new(),
        }
    }

    pub fn with_arbiter(mut self, arbiter: VersionArbiter) -> Self {
        self.arbiter = arbiter;
        self
    }

    pub fn with_channel_name(mut self, name: impl Into<String>) -> Self {
        self.channel_name = name.into();
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn UsageObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server
    }

    pub fn ensure_connection(&mut self) -> Result<()> {
        let mut chain = self.begin_chain();
        self.connect_in(&mut chain)
    }

    pub fn ensure_session(&mut self) -> Result<()> {
        let mut chain = self.begin_chain();
        self.session_in(&mut chain)
    }

    pub fn send_key(&mut self, key: KeyEvent) -> Result<Output> {
        self.session_request(Input::new(CommandType::SendKey).with_key(key))
    }

    /// Asks whether the server would consume `key` without applying it.
    pub fn test_send_key(&mut self, key: KeyEvent) -> Result<Output> {
        self.session_request(Input::new(CommandType::TestSendKey).with_key(key))
    }

    pub fn send_command(&mut self, command: SessionCommand) -> Result<Output> {
        self.session_request(Input::new(CommandType::SendCommand).with_command(command))
    }

    pub fn get_config(&mut self) -> Result<Config> {
        let output = self.connection_request(Input::new(CommandType::GetConfig))?;
        output
            .config
            .ok_or_else(|| SessionError::BrokenMessage("GET_CONFIG reply without config".into()))
    }

    /// Sends `config` to the server after stamping its metadata.
    pub fn set_config(&mut self, mut config: Config) -> Result<()> {
        config.stamp_metadata();
        self.connection_request(Input::new(CommandType::SetConfig).with_config(config))
            .map(|_| ())
    }

    pub fn no_operation(&mut self) -> Result<()> {
        self.connection_request(Input::new(CommandType::NoOperation))
            .map(|_| ())
    }

    pub fn clear_user_history(&mut self) -> Result<()> {
        self.connection_request(Input::new(CommandType::ClearUserHistory))
            .map(|_| ())
    }

    pub fn clear_user_prediction(&mut self) -> Result<()> {
        self.connection_request(Input::new(CommandType::ClearUserPrediction))
            .map(|_| ())
    }

    pub fn clear_unused_user_prediction(&mut self) -> Result<()> {
        self.connection_request(Input::new(CommandType::ClearUnusedUserPrediction))
            .map(|_| ())
    }

    /// Sets the cascading-window flag carried by every later request.
    pub fn enable_cascading_window(&mut self, enabled: bool) {
        self.cascading_window = Some(enabled);
    }

    /// Deletes the active session. Succeeds trivially when there is none.
    ///
    /// Needs an already verified connection; never restarts the server.
    pub fn delete_session(&mut self) -> Result<()> {
        if self.session_id.is_none() {
            return Ok(());
        }
        self.require_connected()?;
        let input = Input::new(CommandType::DeleteSession).with_id(self.session_id);
        self.session_id = SessionId::NONE;
        self.dispatch(input).map(|_| ())
    }

    /// Asks the server to exit. Never starts a server and never creates a
    /// session; the connection is dropped afterwards either way.
    ///
    /// Refused without traffic unless the connection is verified.
    pub fn shutdown(&mut self) -> Result<()> {
        self.require_connected()?;
        let result = self.dispatch(Input::new(CommandType::Shutdown));
        self.transport.disconnect();
        self.state = ConnectionState::Unconnected;
        self.session_id = SessionId::NONE;
        result.map(|_| ())
    }

    fn require_connected(&self) -> Result<()> {
        if self.state == ConnectionState::Connected {
            Ok(())
        } else {
            debug!(state = ?self.state, "Refusing request without a verified connection");
            Err(SessionError::Unreachable)
        }
    }

    fn begin_chain(&mut self) -> CallChain {
        if self.state != ConnectionState::Connected {
            self.state = ConnectionState::Unconnected;
        }
        CallChain::default()
    }

    fn session_request(&mut self, input: Input) -> Result<Output> {
        let mut chain = self.begin_chain();
        self.session_in(&mut chain)?;
        let input = input.with_id(self.session_id);
        self.dispatch(input)
    }

    fn connection_request(&mut self, input: Input) -> Result<Output> {
        let mut chain = self.begin_chain();
        self.connect_in(&mut chain)?;
        self.dispatch(input)
    }

    /// Carries the cascading-window flag on `input`. An explicit value in
    /// a caller-supplied config wins.
    fn decorate(&self, mut input: Input) -> Input {
        if let Some(enabled) = self.cascading_window {
            input
                .config
                .get_or_insert_with(Config::default)
                .use_cascading_window
                .get_or_insert(enabled);
        }
        input
    }

    fn record_server(&mut self, reply: &Reply) {
        self.server.protocol_version = Some(reply.protocol_version);
        if reply.product_version.is_some() {
            self.server.product_version = reply.product_version.clone();
        }
        if reply.server_pid.is_some() {
            self.server.pid = reply.server_pid;
        }
    }

    /// Sends one encoded request and records the server header.
    fn round_trip(&mut self, input: &Input) -> std::result::Result<Reply, TransportError> {
        if !self.transport.connect() {
            return Err(TransportError::NotConnected);
        }
        let body = input
            .to_json()
            .map_err(|e| TransportError::Frame(e.to_string()))?;
        let started = Instant::now();
        let reply = self.transport.call(body.as_bytes())?;
        debug!(
            kind = %input.kind,
            rtt_us = started.elapsed().as_micros() as u64,
            "Exchanged request with conversion server"
        );
        self.record_server(&reply);
        Ok(reply)
    }

    fn probe(&mut self) -> Handshake {
        let input = self.decorate(Input::new(CommandType::NoOperation));
        match self.round_trip(&input) {
            Ok(reply) => Handshake::reached(reply.protocol_version, reply.product_version),
            Err(e) => {
                debug!(error = %e, "Probe failed");
                Handshake::unreachable()
            }
        }
    }

    fn connect_in(&mut self, chain: &mut CallChain) -> Result<()> {
        if self.state == ConnectionState::Connected {
            return Ok(());
        }

        loop {
            let handshake = self.probe();
            match self.arbiter.decide(&handshake, chain.restart_attempted) {
                Verdict::Proceed => {
                    self.state = ConnectionState::Connected;
                    return Ok(());
                }
                Verdict::RestartServer(reason) => {
                    self.state = ConnectionState::VersionMismatch;
                    if !self.restart_server(chain, reason) {
                        return Err(match reason {
                            RestartReason::Unreachable => self.broken(SessionError::Unreachable),
                            _ => self.fatal(
                                ServerErrorKind::VersionMismatch,
                                SessionError::RestartFailed(reason),
                            ),
                        });
                    }
                }
                Verdict::Fail(Failure::ConnectionError) => {
                    return Err(self.broken(SessionError::Unreachable));
                }
                Verdict::Fail(Failure::Fatal(kind)) => {
                    let err = SessionError::VersionMismatch {
                        client: self.arbiter.protocol_version(),
                        server: handshake.protocol_version,
                    };
                    return Err(self.fatal(kind, err));
                }
            }
        }
    }

    fn session_in(&mut self, chain: &mut CallChain) -> Result<()> {
        self.connect_in(chain)?;
        if self.session_id.is_some() {
            return Ok(());
        }

        loop {
            let input = self.decorate(Input::new(CommandType::CreateSession));
            let reply = self.round_trip(&input);
            let handshake = match &reply {
                Ok(reply) => Handshake::reached(reply.protocol_version, reply.product_version.clone()),
                Err(e) => {
                    debug!(error = %e, "CREATE_SESSION exchange failed");
                    Handshake::unreachable()
                }
            };

            let step = match self.arbiter.decide(&handshake, chain.restart_attempted) {
                Verdict::Proceed => {
                    let detail = match &reply {
                        Ok(reply) => match self.accept_session(&input, reply, chain) {
                            Ok(()) => return Ok(()),
                            Err(detail) => detail,
                        },
                        Err(e) => e.to_string(),
                    };
                    if chain.restart_attempted {
                        Step::Fatal(detail)
                    } else {
                        warn!(%detail, "Broken CREATE_SESSION reply");
                        Step::Restart(RestartReason::BrokenReply)
                    }
                }
                Verdict::RestartServer(reason) => Step::Restart(reason),
                Verdict::Fail(Failure::ConnectionError) => {
                    return Err(self.broken(SessionError::Unreachable));
                }
                Verdict::Fail(Failure::Fatal(kind)) => Step::Fatal(format!(
                    "{} while creating session (server protocol {})",
                    kind, handshake.protocol_version
                )),
            };

            match step {
                Step::Restart(reason) => {
                    self.state = ConnectionState::VersionMismatch;
                    if !self.restart_server(chain, reason) {
                        return Err(match reason {
                            RestartReason::Unreachable => self.broken(SessionError::Unreachable),
                            _ => self.fatal(
                                ServerErrorKind::BrokenMessage,
                                SessionError::RestartFailed(reason),
                            ),
                        });
                    }
                }
                Step::Fatal(detail) => {
                    return Err(self.fatal(
                        ServerErrorKind::BrokenMessage,
                        SessionError::BrokenMessage(detail),
                    ));
                }
            }
        }
    }

    /// Validates a CREATE_SESSION reply and adopts its session id.
    fn accept_session(
        &mut self,
        input: &Input,
        reply: &Reply,
        chain: &CallChain,
    ) -> std::result::Result<(), String> {
        let output = decode_output(&reply.body)?;
        if !output.is_success() {
            return Err(format!("session creation rejected: {:?}", output.error_code));
        }
        if output.id.is_none() {
            return Err("session creation returned no id".to_string());
        }
        if chain.restart_attempted && self.arbiter.is_stale(reply.product_version.as_deref()) {
            return Err(format!(
                "server still reports stale version {}",
                reply.product_version.as_deref().unwrap_or("unknown")
            ));
        }

        self.session_id = output.id;
        self.state = ConnectionState::Connected;
        info!(session_id = %self.session_id, "Created session");
        self.notify(input, &output);
        Ok(())
    }

    /// Sends one request on an established connection.
    ///
    /// Failures never trigger a restart here; the next call chain deals
    /// with whatever state they leave behind.
    fn dispatch(&mut self, input: Input) -> Result<Output> {
        let input = self.decorate(input);
        if !self.transport.connect() {
            self.state = ConnectionState::VersionMismatch;
            return Err(SessionError::Unreachable);
        }

        let body = input.to_json()?;
        let started = Instant::now();
        let reply = match self.transport.call(body.as_bytes()) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(kind = %input.kind, error = %e, "Request failed");
                self.state = ConnectionState::VersionMismatch;
                return Err(e.into());
            }
        };
        debug!(
            kind = %input.kind,
            rtt_us = started.elapsed().as_micros() as u64,
            "Exchanged request with conversion server"
        );
        self.record_server(&reply);

        if reply.protocol_version != self.arbiter.protocol_version() {
            warn!(
                kind = %input.kind,
                client = self.arbiter.protocol_version(),
                server = reply.protocol_version,
                "Server protocol changed under an open connection"
            );
            self.state = ConnectionState::VersionMismatch;
            return Err(SessionError::VersionMismatch {
                client: self.arbiter.protocol_version(),
                server: reply.protocol_version,
            });
        }

        let output = decode_output(&reply.body).map_err(SessionError::BrokenMessage)?;
        if !output.is_success() {
            if input.kind.is_session_scoped() {
                debug!(session_id = %self.session_id, "Server dropped session");
                self.session_id = SessionId::NONE;
            }
            return Err(SessionError::Rejected(output.error_code));
        }

        self.notify(&input, &output);
        Ok(output)
    }

    /// Restarts the server once per call chain. Returns false when the
    /// restart could not be carried out.
    fn restart_server(&mut self, chain: &mut CallChain, reason: RestartReason) -> bool {
        chain.restart_attempted = true;
        warn!(?reason, channel = %self.channel_name, "Restarting conversion server");

        if reason != RestartReason::Unreachable {
            if !self.launcher.force_terminate_server(&self.channel_name) {
                warn!(channel = %self.channel_name, "Failed to terminate conversion server");
                return false;
            }
            let pid = self.server.pid.take().unwrap_or(0);
            if !self.launcher.wait_server(pid) {
                warn!(pid, "Conversion server did not exit in time");
            }
        }

        self.transport.disconnect();
        self.session_id = SessionId::NONE;
        self.launcher.start_server()
    }

    fn broken(&mut self, err: SessionError) -> SessionError {
        self.state = ConnectionState::Broken;
        err
    }

    fn fatal(&mut self, kind: ServerErrorKind, err: SessionError) -> SessionError {
        error!(kind = %kind, error = %err, "Giving up on conversion server");
        self.launcher.on_fatal(kind);
        self.broken(err)
    }

    fn notify(&self, input: &Input, output: &Output) {
        for observer in &self.observers {
            observer.observe(input, output);
        }
    }
}

enum Step {
    Restart(RestartReason),
    Fatal(String),
}

fn decode_output(body: &[u8]) -> std::result::Result<Output, String> {
    let text = std::str::from_utf8(body).map_err(|e| e.to_string())?;
    Output::from_json(text).map_err(|e| e.to_string())
}
