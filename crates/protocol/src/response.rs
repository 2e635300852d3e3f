use serde::{Deserialize, Serialize};

use crate::types::{Candidates, Config, ErrorCode, Preedit, ResultText, SessionId};

/// The server's answer to one `Input`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Output {
    pub id: SessionId,
    pub consumed: bool,
    pub error_code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preedit: Option<Preedit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Candidates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultText>,
    /// Server-side processing time in microseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Config>,
}

impl Output {
    pub fn with_id(id: SessionId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_code == ErrorCode::SessionSuccess
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
