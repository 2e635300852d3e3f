//! Version arbitration between this client and the conversion server.
//!
//! The arbiter is a pure decision table. It never talks to the server and
//! never restarts anything itself; `SessionClient` acts on its verdicts.

use henkan_protocol::{is_older, PRODUCT_VERSION, PROTOCOL_VERSION};

use crate::fatal::ServerErrorKind;

/// What the client learned from one exchange with the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub reachable: bool,
    pub protocol_version: u32,
    pub product_version: Option<String>,
}

impl Handshake {
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            protocol_version: 0,
            product_version: None,
        }
    }

    pub fn reached(protocol_version: u32, product_version: Option<String>) -> Self {
        Self {
            reachable: true,
            protocol_version,
            product_version,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    Unreachable,
    ProtocolMismatch,
    StaleServer,
    BrokenReply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    ConnectionError,
    Fatal(ServerErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Proceed,
    RestartServer(RestartReason),
    Fail(Failure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionArbiter {
    protocol_version: u32,
    product_version: String,
}

impl Default for VersionArbiter {
    fn default() -> Self {
        Self::new(PROTOCOL_VERSION, PRODUCT_VERSION)
    }
}

impl VersionArbiter {
    pub fn new(protocol_version: u32, product_version: impl Into<String>) -> Self {
        Self {
            protocol_version,
            product_version: product_version.into(),
        }
    }

    pub fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    pub fn product_version(&self) -> &str {
        &self.product_version
    }

    /// Decides what to do about the server described by `handshake`.
    ///
    /// Rules are checked in order: unreachable, protocol mismatch, stale
    /// product version. Once `restart_attempted` is set the arbiter never
    /// asks for another restart.
    pub fn decide(&self, handshake: &Handshake, restart_attempted: bool) -> Verdict {
        if !handshake.reachable {
            return if restart_attempted {
                Verdict::Fail(Failure::ConnectionError)
            } else {
                Verdict::RestartServer(RestartReason::Unreachable)
            };
        }

        if handshake.protocol_version != self.protocol_version {
            return if restart_attempted {
                Verdict::Fail(Failure::Fatal(ServerErrorKind::VersionMismatch))
            } else {
                Verdict::RestartServer(RestartReason::ProtocolMismatch)
            };
        }

        if !restart_attempted && self.is_stale(handshake.product_version.as_deref()) {
            return Verdict::RestartServer(RestartReason::StaleServer);
        }

        Verdict::Proceed
    }

    /// True when the server reported a product version older than ours.
    pub fn is_stale(&self, server_product_version: Option<&str>) -> bool {
        server_product_version.is_some_and(|server| is_older(server, &self.product_version))
    }
}
