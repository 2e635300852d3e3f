use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::error;

/// Terminal outcomes of a call chain that the user may need to hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerErrorKind {
    VersionMismatch,
    BrokenMessage,
}

impl ServerErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerErrorKind::VersionMismatch => "SERVER_VERSION_MISMATCH",
            ServerErrorKind::BrokenMessage => "SERVER_BROKEN_MESSAGE",
        }
    }
}

impl fmt::Display for ServerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives terminal server errors. Implemented by whatever owns
/// user-facing error reporting.
pub trait FatalErrorSink: Send + Sync {
    fn on_fatal(&self, kind: ServerErrorKind);
}

#[derive(Debug, Default)]
pub struct LoggingErrorSink;

impl FatalErrorSink for LoggingErrorSink {
    fn on_fatal(&self, kind: ServerErrorKind) {
        error!(kind = %kind, "Conversion server is unusable");
    }
}

/// Counts fatal errors per kind and logs each one.
#[derive(Debug, Default)]
pub struct CountingErrorSink {
    version_mismatch: AtomicUsize,
    broken_message: AtomicUsize,
}

impl CountingErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, kind: ServerErrorKind) -> usize {
        self.counter(kind).load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.count(ServerErrorKind::VersionMismatch) + self.count(ServerErrorKind::BrokenMessage)
    }

    fn counter(&self, kind: ServerErrorKind) -> &AtomicUsize {
        match kind {
            ServerErrorKind::VersionMismatch => &self.version_mismatch,
            ServerErrorKind::BrokenMessage => &self.broken_message,
        }
    }
}

impl FatalErrorSink for CountingErrorSink {
    fn on_fatal(&self, kind: ServerErrorKind) {
        let count = self.counter(kind).fetch_add(1, Ordering::SeqCst) + 1;
        error!(kind = %kind, count, "Conversion server is unusable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting_sink_counts_per_kind() {
        let sink = CountingErrorSink::new();
        sink.on_fatal(ServerErrorKind::VersionMismatch);
        sink.on_fatal(ServerErrorKind::BrokenMessage);
        sink.on_fatal(ServerErrorKind::BrokenMessage);

        assert_eq!(sink.count(ServerErrorKind::VersionMismatch), 1);
        assert_eq!(sink.count(ServerErrorKind::BrokenMessage), 2);
        assert_eq!(sink.total(), 3);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(
            ServerErrorKind::VersionMismatch.to_string(),
            "SERVER_VERSION_MISMATCH"
        );
    }
}
