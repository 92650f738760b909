use std::error::Error as StdError;
use std::fmt;

use crate::core::context::ContextLoadError;

/// Reason attached to [`AppError::Protocol`] when a stream keeps producing
/// lines that cannot be decoded.
pub const MALFORMED_PROTOCOL: &str = "malformed-protocol";

/// Failures that originate from asynchronous work and are shown on the
/// error screen.
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// The daemon could not be reached, or the connection dropped mid-stream.
    Connection(String),

    /// The daemon sent content that does not follow the expected protocol.
    Protocol(String),

    /// The daemon answered, but reported a failure of its own.
    Daemon {
        /// HTTP status, when the failure came from a non-success response.
        status: Option<u16>,
        /// Message extracted from the response body.
        message: String,
    },

    /// A context file or directory could not be loaded.
    ContextLoad(ContextLoadError),
}

impl AppError {
    pub fn malformed_protocol() -> Self {
        AppError::Protocol(MALFORMED_PROTOCOL.to_string())
    }

    pub fn is_malformed_protocol(&self) -> bool {
        matches!(self, AppError::Protocol(reason) if reason == MALFORMED_PROTOCOL)
    }

    /// Short label used as the error screen title.
    pub fn kind_label(&self) -> &'static str {
        match self {
            AppError::Connection(_) => "Connection error",
            AppError::Protocol(_) => "Protocol error",
            AppError::Daemon { .. } => "Daemon error",
            AppError::ContextLoad(_) => "Context error",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Connection(reason) => write!(f, "Connection failed: {reason}"),
            AppError::Protocol(reason) => write!(f, "Unexpected stream content: {reason}"),
            AppError::Daemon {
                status: Some(status),
                message,
            } => write!(f, "Daemon returned {status}: {message}"),
            AppError::Daemon {
                status: None,
                message,
            } => write!(f, "Daemon error: {message}"),
            AppError::ContextLoad(err) => write!(f, "{err}"),
        }
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            AppError::ContextLoad(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ContextLoadError> for AppError {
    fn from(err: ContextLoadError) -> Self {
        AppError::ContextLoad(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Connection(err.to_string())
    }
}

/// Intents rejected synchronously. These never reach the error screen; the
/// controller reports them on the status line and leaves state unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    WrongScreen {
        operation: &'static str,
        screen: &'static str,
    },
    StreamActive,
    InstallActive,
    AlreadyInstalled(String),
    NotInstalled(String),
    UnknownModel(String),
    EmptyMessage,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::WrongScreen { operation, screen } => {
                write!(f, "{operation} is not available on the {screen} screen")
            }
            ValidationError::StreamActive => {
                write!(f, "Wait for the current response or press Esc to interrupt")
            }
            ValidationError::InstallActive => write!(f, "An install is already running"),
            ValidationError::AlreadyInstalled(name) => write!(f, "{name} is already installed"),
            ValidationError::NotInstalled(name) => {
                write!(f, "{name} is not installed; press i to install it")
            }
            ValidationError::UnknownModel(name) => write!(f, "Unknown model: {name}"),
            ValidationError::EmptyMessage => write!(f, "Message is empty"),
        }
    }
}

impl StdError for ValidationError {}
