use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::PRODUCT_VERSION;

/// Schema version stamped into every configuration sent by this client.
pub const CONFIG_VERSION: u32 = 1;

/// Server-assigned handle for one editing session. Zero means "no session".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl SessionId {
    pub const NONE: SessionId = SessionId(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    pub fn is_some(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    CreateSession,
    DeleteSession,
    SendKey,
    TestSendKey,
    SendCommand,
    SetConfig,
    GetConfig,
    Shutdown,
    ClearUserHistory,
    ClearUserPrediction,
    ClearUnusedUserPrediction,
    NoOperation,
}

impl CommandType {
    pub const ALL: [CommandType; 12] = [
        CommandType::CreateSession,
        CommandType::DeleteSession,
        CommandType::SendKey,
        CommandType::TestSendKey,
        CommandType::SendCommand,
        CommandType::SetConfig,
        CommandType::GetConfig,
        CommandType::Shutdown,
        CommandType::ClearUserHistory,
        CommandType::ClearUserPrediction,
        CommandType::ClearUnusedUserPrediction,
        CommandType::NoOperation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::CreateSession => "CREATE_SESSION",
            CommandType::DeleteSession => "DELETE_SESSION",
            CommandType::SendKey => "SEND_KEY",
            CommandType::TestSendKey => "TEST_SEND_KEY",
            CommandType::SendCommand => "SEND_COMMAND",
            CommandType::SetConfig => "SET_CONFIG",
            CommandType::GetConfig => "GET_CONFIG",
            CommandType::Shutdown => "SHUTDOWN",
            CommandType::ClearUserHistory => "CLEAR_USER_HISTORY",
            CommandType::ClearUserPrediction => "CLEAR_USER_PREDICTION",
            CommandType::ClearUnusedUserPrediction => "CLEAR_UNUSED_USER_PREDICTION",
            CommandType::NoOperation => "NO_OPERATION",
        }
    }

    /// Whether requests of this kind are addressed to an existing session.
    pub fn is_session_scoped(&self) -> bool {
        matches!(
            self,
            CommandType::DeleteSession
                | CommandType::SendKey
                | CommandType::TestSendKey
                | CommandType::SendCommand
        )
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecialKey {
    Digit,
    On,
    Off,
    Space,
    Enter,
    Left,
    Right,
    Up,
    Down,
    Escape,
    Del,
    Backspace,
    Henkan,
    Muhenkan,
    Kana,
    Home,
    End,
    Tab,
    PageUp,
    PageDown,
    Insert,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

impl SpecialKey {
    pub fn from_name(name: &str) -> Option<Self> {
        let key = match name.to_ascii_lowercase().as_str() {
            "digit" => SpecialKey::Digit,
            "on" => SpecialKey::On,
            "off" => SpecialKey::Off,
            "space" => SpecialKey::Space,
            "enter" | "return" => SpecialKey::Enter,
            "left" => SpecialKey::Left,
            "right" => SpecialKey::Right,
            "up" => SpecialKey::Up,
            "down" => SpecialKey::Down,
            "escape" | "esc" => SpecialKey::Escape,
            "del" | "delete" => SpecialKey::Del,
            "backspace" | "bs" => SpecialKey::Backspace,
            "henkan" => SpecialKey::Henkan,
            "muhenkan" => SpecialKey::Muhenkan,
            "kana" => SpecialKey::Kana,
            "home" => SpecialKey::Home,
            "end" => SpecialKey::End,
            "tab" => SpecialKey::Tab,
            "pageup" => SpecialKey::PageUp,
            "pagedown" => SpecialKey::PageDown,
            "insert" => SpecialKey::Insert,
            "f1" => SpecialKey::F1,
            "f2" => SpecialKey::F2,
            "f3" => SpecialKey::F3,
            "f4" => SpecialKey::F4,
            "f5" => SpecialKey::F5,
            "f6" => SpecialKey::F6,
            "f7" => SpecialKey::F7,
            "f8" => SpecialKey::F8,
            "f9" => SpecialKey::F9,
            "f10" => SpecialKey::F10,
            "f11" => SpecialKey::F11,
            "f12" => SpecialKey::F12,
            _ => return None,
        };
        Some(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModifierKey {
    Ctrl,
    Alt,
    Shift,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct KeyEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_code: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_key: Option<SpecialKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifier_keys: Vec<ModifierKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_string: Option<String>,
}

impl KeyEvent {
    pub fn special(key: SpecialKey) -> Self {
        Self {
            special_key: Some(key),
            ..Self::default()
        }
    }

    pub fn character(c: char) -> Self {
        Self {
            key_code: Some(c as u32),
            ..Self::default()
        }
    }

    pub fn with_modifier(mut self, modifier: ModifierKey) -> Self {
        if !self.modifier_keys.contains(&modifier) {
            self.modifier_keys.push(modifier);
        }
        self
    }

    /// Parses specs such as `a`, `Enter`, `Ctrl+Space` or `Shift+F7`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (modifiers, key) = if text == "+" {
            ("", "+")
        } else if let Some(prefix) = text.strip_suffix("++") {
            (prefix, "+")
        } else {
            text.rsplit_once('+').unwrap_or(("", text))
        };
        let key = key.trim();
        if key.is_empty() {
            return None;
        }

        let mut event = if let Some(special) = SpecialKey::from_name(key) {
            KeyEvent::special(special)
        } else {
            let mut chars = key.chars();
            let c = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            KeyEvent::character(c)
        };

        for modifier in modifiers.split('+').filter(|m| !m.trim().is_empty()) {
            let modifier = match modifier.trim().to_ascii_lowercase().as_str() {
                "ctrl" | "control" => ModifierKey::Ctrl,
                "alt" | "option" => ModifierKey::Alt,
                "shift" => ModifierKey::Shift,
                _ => return None,
            };
            event = event.with_modifier(modifier);
        }

        Some(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionCommandType {
    Revert,
    Submit,
    SelectCandidate,
    HighlightCandidate,
    SwitchInputMode,
    GetStatus,
}

impl SessionCommandType {
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.to_ascii_lowercase().replace('-', "_").as_str() {
            "revert" => SessionCommandType::Revert,
            "submit" => SessionCommandType::Submit,
            "select_candidate" => SessionCommandType::SelectCandidate,
            "highlight_candidate" => SessionCommandType::HighlightCandidate,
            "switch_input_mode" => SessionCommandType::SwitchInputMode,
            "get_status" => SessionCommandType::GetStatus,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCommand {
    #[serde(rename = "type")]
    pub kind: SessionCommandType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
}

impl SessionCommand {
    pub fn new(kind: SessionCommandType) -> Self {
        Self { kind, id: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionKeymap {
    None,
    Custom,
    Atok,
    Msime,
    Kotoeri,
}

/// Configuration payload. Only the fields this client reads or stamps are
/// typed; everything else the server sends is preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_product_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incognito_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_keymap: Option<SessionKeymap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_cascading_window: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Config {
    pub fn is_empty(&self) -> bool {
        *self == Config::default()
    }

    /// Records who wrote this configuration and when.
    pub fn stamp_metadata(&mut self) {
        self.config_version = Some(CONFIG_VERSION);
        self.last_modified_time = Some(chrono::Utc::now().timestamp());
        self.last_modified_product_version = Some(PRODUCT_VERSION.to_string());
        self.platform = Some(format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    #[default]
    SessionSuccess,
    SessionFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PreeditSegment {
    pub value: String,
    #[serde(default)]
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Preedit {
    #[serde(default)]
    pub cursor: u32,
    #[serde(default)]
    pub segments: Vec<PreeditSegment>,
}

impl Preedit {
    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.value.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: i32,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Candidates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focused_index: Option<u32>,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultType {
    #[default]
    String,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResultText {
    #[serde(rename = "type", default)]
    pub kind: ResultType,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_character() {
        assert_eq!(KeyEvent::parse("a"), Some(KeyEvent::character('a')));
        assert_eq!(KeyEvent::parse("+"), Some(KeyEvent::character('+')));
    }

    #[test]
    fn test_parse_special_with_modifiers() {
        let event = KeyEvent::parse("Ctrl+Shift+F7").unwrap();
        assert_eq!(event.special_key, Some(SpecialKey::F7));
        assert_eq!(event.modifier_keys, vec![ModifierKey::Ctrl, ModifierKey::Shift]);

        let event = KeyEvent::parse("Shift++").unwrap();
        assert_eq!(event.key_code, Some('+' as u32));
        assert_eq!(event.modifier_keys, vec![ModifierKey::Shift]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(KeyEvent::parse(""), None);
        assert_eq!(KeyEvent::parse("Hyper+a"), None);
        assert_eq!(KeyEvent::parse("abc"), None);
    }

    #[test]
    fn test_session_id_sentinel() {
        assert!(SessionId::NONE.is_none());
        assert!(SessionId(42).is_some());
        assert_eq!(SessionId::default(), SessionId::NONE);
    }

    #[test]
    fn test_session_scoped_commands() {
        assert!(CommandType::SendKey.is_session_scoped());
        assert!(!CommandType::CreateSession.is_session_scoped());
        assert!(!CommandType::NoOperation.is_session_scoped());
    }

    #[test]
    fn test_stamp_metadata() {
        let mut config = Config::default();
        assert!(config.is_empty());
        config.stamp_metadata();
        assert_eq!(config.config_version, Some(CONFIG_VERSION));
        assert_eq!(
            config.last_modified_product_version.as_deref(),
            Some(PRODUCT_VERSION)
        );
        assert!(config.last_modified_time.is_some());
        assert!(!config.is_empty());
    }
}
