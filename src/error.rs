//! Error types for the bridge core.

use thiserror::Error;

/// Result type alias using our error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the bridge core.
///
/// Every failure surfaces as an `Err` to the immediate caller; there is no
/// process-fatal path and no automatic retry anywhere in the core.
#[derive(Error, Debug)]
pub enum Error {
    /// The messaging capability is missing in the current context. Raised
    /// synchronously, before anything is dispatched.
    #[error("Messaging capability unavailable in this context")]
    TransportUnavailable,

    /// The channel reported a failure after a request was sent.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with an explicit error field.
    #[error("Service error: {0}")]
    Application(String),

    /// An injected script element fired its error path.
    #[error("Failed to load script {url}: {message}")]
    ScriptLoad { url: String, message: String },

    /// Malformed construction or configuration input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] Box<serde_json::Error>),
}

impl Error {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create an application error.
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application(message.into())
    }

    /// Create a script-load error.
    pub fn script_load(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScriptLoad {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(Box::new(value))
    }
}
