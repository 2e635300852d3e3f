mod arbiter;
mod fatal;
mod launcher;
mod lifecycle;
mod observer;
mod session;
mod transport;

pub use arbiter::{Failure, Handshake, RestartReason, Verdict, VersionArbiter};
pub use fatal::{CountingErrorSink, FatalErrorSink, LoggingErrorSink, ServerErrorKind};
pub use launcher::{
    read_pid, LauncherConfig, ProcessLauncher, ServerLauncher, DEFAULT_STARTUP_TIMEOUT,
    DEFAULT_TERMINATE_TIMEOUT,
};
pub use lifecycle::LifecycleRegistry;
pub use observer::{UsageObserver, UsageSnapshot, UsageStats};
pub use session::{
    ConnectionState, Result, ServerInfo, SessionClient, SessionError, DEFAULT_CHANNEL_NAME,
};
pub use transport::{Reply, Transport, TransportError, UnixSocketTransport, DEFAULT_IO_TIMEOUT};
