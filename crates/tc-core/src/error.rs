use std::fmt;

use uuid::Uuid;

#[derive(Debug)]
pub enum CoreError {
    UnknownThought(Uuid),
    UnknownInput(Uuid),
    /// The thought's interactivity mode does not permit the operation.
    NotInteractive(Uuid),
    InvalidConfig(String),
    Snapshot(serde_json::Error),
    UnsupportedSnapshot(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::UnknownThought(id) => write!(f, "unknown thought: {id}"),
            CoreError::UnknownInput(id) => write!(f, "unknown input: {id}"),
            CoreError::NotInteractive(id) => write!(f, "thought {id} is view-only"),
            CoreError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            CoreError::Snapshot(e) => write!(f, "snapshot error: {e}"),
            CoreError::UnsupportedSnapshot(v) => write!(f, "unsupported snapshot version: {v}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Snapshot(e)
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
