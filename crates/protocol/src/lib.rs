mod request;
mod response;
mod types;
mod version;
mod wire;

pub use request::Input;
pub use response::Output;
pub use types::{
    Candidate, Candidates, CommandType, Config, ErrorCode, KeyEvent, ModifierKey, Preedit,
    PreeditSegment, ResultText, ResultType, SessionCommand, SessionCommandType, SessionId,
    SessionKeymap, SpecialKey, CONFIG_VERSION,
};
pub use version::{compare_version, is_older, PRODUCT_VERSION, PROTOCOL_VERSION};
pub use wire::{RequestFrame, ResponseFrame, MAX_FRAME_SIZE};
