use std::fmt;

use tc_core::CoreError;

/// Failure talking to the generation service. Never escapes the generation
/// boundary: the session logs it and treats the trigger as producing nothing.
#[derive(Debug)]
pub enum ServiceError {
    Http(reqwest::Error),
    Status { status: u16, body: String },
    /// The service answered, but with something unusable.
    Invalid(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Http(e) => write!(f, "request failed: {e}"),
            ServiceError::Status { status, body } => write!(f, "service error {status}: {body}"),
            ServiceError::Invalid(msg) => write!(f, "invalid response: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        ServiceError::Http(e)
    }
}

#[derive(Debug)]
pub enum EngineError {
    Core(CoreError),
    Io(std::io::Error),
    ConfigParse(toml::de::Error),
    ConfigWrite(toml::ser::Error),
    Service(ServiceError),
    Script(String),
    /// The event loop has shut down.
    Closed,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Core(e) => write!(f, "{e}"),
            EngineError::Io(e) => write!(f, "I/O error: {e}"),
            EngineError::ConfigParse(e) => write!(f, "config parse error: {e}"),
            EngineError::ConfigWrite(e) => write!(f, "config write error: {e}"),
            EngineError::Service(e) => write!(f, "{e}"),
            EngineError::Script(msg) => write!(f, "script error: {msg}"),
            EngineError::Closed => write!(f, "event loop closed"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<CoreError> for EngineError {
    fn from(e: CoreError) -> Self {
        EngineError::Core(e)
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e)
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(e: toml::de::Error) -> Self {
        EngineError::ConfigParse(e)
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(e: toml::ser::Error) -> Self {
        EngineError::ConfigWrite(e)
    }
}

impl From<ServiceError> for EngineError {
    fn from(e: ServiceError) -> Self {
        EngineError::Service(e)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
