//! Byte transport to the conversion server.
//!
//! `SessionClient` only relies on the `Transport` trait: connect, then one
//! request in and one reply out per call. `UnixSocketTransport` is the
//! implementation used by the CLI.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use henkan_protocol::{RequestFrame, ResponseFrame, MAX_FRAME_SIZE};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not connected")]
    NotConnected,

    #[error("Connection closed by server")]
    Closed,

    #[error("Malformed frame: {0}")]
    Frame(String),

    #[error("Frame exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Header and body of one server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub protocol_version: u32,
    pub product_version: Option<String>,
    pub server_pid: Option<u32>,
    pub body: Vec<u8>,
}

pub trait Transport: Send {
    /// Establishes the channel if needed. Returns false when the server
    /// cannot be reached.
    fn connect(&mut self) -> bool;

    /// Sends one request body and waits for the matching reply.
    fn call(&mut self, request: &[u8]) -> Result<Reply>;

    /// Drops the current channel, if any.
    fn disconnect(&mut self) {}
}

pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

pub struct UnixSocketTransport {
    path: PathBuf,
    timeout: Duration,
    stream: Option<UnixStream>,
    read_buffer: Vec<u8>,
}

impl UnixSocketTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: DEFAULT_IO_TIMEOUT,
            stream: None,
            read_buffer: Vec::with_capacity(64 * 1024),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn open(&self) -> Result<UnixStream> {
        let stream = UnixStream::connect(&self.path)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        Ok(stream)
    }

    fn read_line_blocking(&mut self) -> Result<String> {
        let mut temp_buf = [0u8; 8192];
        loop {
            if let Some(pos) = self.read_buffer.iter().position(|&b| b == b'\n') {
                let line_bytes: Vec<u8> = self.read_buffer.drain(..=pos).collect();
                return String::from_utf8(line_bytes)
                    .map_err(|e| TransportError::Frame(e.to_string()));
            }
            if self.read_buffer.len() > MAX_FRAME_SIZE {
                return Err(TransportError::TooLarge {
                    limit: MAX_FRAME_SIZE,
                });
            }
            let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
            let n = stream.read(&mut temp_buf)?;
            if n == 0 {
                return Err(TransportError::Closed);
            }
            self.read_buffer.extend_from_slice(&temp_buf[..n]);
        }
    }

    fn exchange(&mut self, request: &[u8]) -> Result<Reply> {
        let body =
            String::from_utf8(request.to_vec()).map_err(|e| TransportError::Frame(e.to_string()))?;
        let line = RequestFrame::new(body)
            .to_json()
            .map_err(|e| TransportError::Frame(e.to_string()))?;
        if line.len() >= MAX_FRAME_SIZE {
            return Err(TransportError::TooLarge {
                limit: MAX_FRAME_SIZE,
            });
        }

        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        writeln!(stream, "{}", line)?;
        stream.flush()?;

        let line = self.read_line_blocking()?;
        tracing::trace!(line_len = line.len(), "Read reply frame");

        let frame =
            ResponseFrame::from_json(line.trim_end()).map_err(|e| TransportError::Frame(e.to_string()))?;

        Ok(Reply {
            protocol_version: frame.protocol_version,
            product_version: frame.product_version,
            server_pid: frame.pid,
            body: frame.body.into_bytes(),
        })
    }
}

impl Transport for UnixSocketTransport {
    fn connect(&mut self) -> bool {
        if self.stream.is_some() {
            return true;
        }
        match self.open() {
            Ok(stream) => {
                tracing::debug!(path = %self.path.display(), "Connected to conversion server");
                self.stream = Some(stream);
                self.read_buffer.clear();
                true
            }
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Connect failed");
                false
            }
        }
    }

    fn call(&mut self, request: &[u8]) -> Result<Reply> {
        let result = self.exchange(request);
        if let Err(e) = &result {
            tracing::debug!(error = %e, "Dropping connection after failed call");
            self.disconnect();
        }
        result
    }

    fn disconnect(&mut self) {
        self.stream = None;
        self.read_buffer.clear();
    }
}
