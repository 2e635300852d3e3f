//! Line framing for the session channel.
//!
//! Every message is a single line of JSON terminated by `\n`. The header
//! fields travel next to an opaque `body` string so that a peer can always
//! read the protocol version even when the body itself is unreadable.

use serde::{Deserialize, Serialize};

use crate::version::{PRODUCT_VERSION, PROTOCOL_VERSION};

/// Upper bound on a single frame, newline included.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub protocol_version: u32,
    pub product_version: String,
    pub body: String,
}

impl RequestFrame {
    pub fn new(body: String) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            product_version: PRODUCT_VERSION.to_string(),
            body,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub protocol_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub body: String,
}

impl ResponseFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
