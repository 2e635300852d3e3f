//! Lifecycle control for the background conversion server process.

use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::fatal::{FatalErrorSink, ServerErrorKind};

/// Starts, kills and waits on the conversion server.
///
/// Implementations report success as booleans and never retry on their
/// own; the restart policy belongs to `SessionClient`.
pub trait ServerLauncher: Send {
    fn start_server(&mut self) -> bool;

    /// Kills the server listening on the channel called `name`.
    fn force_terminate_server(&mut self, name: &str) -> bool;

    /// Blocks until `pid` has exited, up to an implementation-chosen bound.
    fn wait_server(&mut self, pid: u32) -> bool;

    fn on_fatal(&mut self, kind: ServerErrorKind);
}

pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(3);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct LauncherConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Socket the server binds; used to detect readiness.
    pub socket_path: PathBuf,
    /// Directory holding `<channel>.pid` files written by the server.
    pub pid_dir: PathBuf,
    pub startup_timeout: Duration,
    pub terminate_timeout: Duration,
}

impl LauncherConfig {
    pub fn new(program: impl Into<PathBuf>, socket_path: impl Into<PathBuf>) -> Self {
        let socket_path = socket_path.into();
        let pid_dir = socket_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        Self {
            program: program.into(),
            args: Vec::new(),
            socket_path,
            pid_dir,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
        }
    }

    pub fn pid_file(&self, name: &str) -> PathBuf {
        self.pid_dir.join(format!("{}.pid", name))
    }
}

pub struct ProcessLauncher {
    config: LauncherConfig,
    sink: Arc<dyn FatalErrorSink>,
    child: Option<Child>,
}

impl ProcessLauncher {
    pub fn new(config: LauncherConfig, sink: Arc<dyn FatalErrorSink>) -> Self {
        Self {
            config,
            sink,
            child: None,
        }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Pid of the server started by this launcher, if it is still ours.
    pub fn child_pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    fn is_ready(&self) -> bool {
        UnixStream::connect(&self.config.socket_path).is_ok()
    }

    fn child_exited(&mut self) -> bool {
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(Some(status))) => {
                warn!(%status, "Conversion server exited during startup");
                self.child = None;
                true
            }
            Some(Err(e)) => {
                warn!(error = %e, "Failed to poll conversion server");
                false
            }
            _ => false,
        }
    }

    fn resolve_pid(&self, name: &str) -> Option<u32> {
        read_pid(&self.config.pid_file(name)).or_else(|| self.child_pid())
    }

    fn reap_child(&mut self, pid: u32, deadline: Instant) -> bool {
        let Some(child) = self.child.as_mut().filter(|c| c.id() == pid) else {
            return false;
        };
        while Instant::now() < deadline {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(pid, %status, "Reaped conversion server");
                    self.child = None;
                    return true;
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    warn!(pid, error = %e, "Failed to wait on conversion server");
                    return false;
                }
            }
        }
        false
    }
}

impl ServerLauncher for ProcessLauncher {
    fn start_server(&mut self) -> bool {
        if self.is_ready() {
            debug!("Conversion server already accepting connections");
            return true;
        }

        let spawned = Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(child) => {
                info!(
                    pid = child.id(),
                    program = %self.config.program.display(),
                    "Started conversion server"
                );
                self.child = Some(child);
            }
            Err(e) => {
                warn!(
                    program = %self.config.program.display(),
                    error = %e,
                    "Failed to spawn conversion server"
                );
                return false;
            }
        }

        let deadline = Instant::now() + self.config.startup_timeout;
        while Instant::now() < deadline {
            if self.is_ready() {
                return true;
            }
            if self.child_exited() {
                return false;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        warn!(
            timeout_ms = self.config.startup_timeout.as_millis() as u64,
            "Conversion server did not become ready"
        );
        false
    }

    fn force_terminate_server(&mut self, name: &str) -> bool {
        let Some(pid) = self.resolve_pid(name) else {
            warn!(name, "No pid known for conversion server");
            return false;
        };

        match kill(pid, Signal::SIGKILL) {
            Ok(()) => {
                info!(pid, name, "Killed conversion server");
                true
            }
            Err(Errno::ESRCH) => {
                debug!(pid, "Conversion server already gone");
                true
            }
            Err(e) => {
                warn!(pid, error = %e, "Failed to kill conversion server");
                false
            }
        }
    }

    fn wait_server(&mut self, pid: u32) -> bool {
        if pid == 0 {
            return true;
        }
        let deadline = Instant::now() + self.config.terminate_timeout;

        if self.child_pid() == Some(pid) {
            return self.reap_child(pid, deadline);
        }

        while Instant::now() < deadline {
            if !is_process_running(pid) {
                return true;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        warn!(pid, "Conversion server still running after terminate timeout");
        false
    }

    fn on_fatal(&mut self, kind: ServerErrorKind) {
        self.sink.on_fatal(kind);
    }
}

pub fn read_pid(path: &Path) -> Option<u32> {
    let pid_text = std::fs::read_to_string(path).ok()?;
    pid_text.trim().parse::<u32>().ok().filter(|pid| *pid > 0)
}

fn kill(pid: u32, signal: impl Into<Option<Signal>>) -> nix::Result<()> {
    let pid = i32::try_from(pid).map_err(|_| Errno::ESRCH)?;
    signal::kill(Pid::from_raw(pid), signal)
}

fn is_process_running(pid: u32) -> bool {
    matches!(kill(pid, None), Ok(()) | Err(Errno::EPERM))
}
