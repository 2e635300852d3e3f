use serde::{Deserialize, Serialize};

use crate::types::{CommandType, Config, KeyEvent, SessionCommand, SessionId};

/// One request to the conversion server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    #[serde(rename = "type")]
    pub kind: CommandType,
    #[serde(default, skip_serializing_if = "SessionId::is_none")]
    pub id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<KeyEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<SessionCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Config>,
}

impl Input {
    pub fn new(kind: CommandType) -> Self {
        Self {
            kind,
            id: SessionId::NONE,
            key: None,
            command: None,
            config: None,
        }
    }

    pub fn with_id(mut self, id: SessionId) -> Self {
        self.id = id;
        self
    }

    pub fn with_key(mut self, key: KeyEvent) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_command(mut self, command: SessionCommand) -> Self {
        self.command = Some(command);
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
