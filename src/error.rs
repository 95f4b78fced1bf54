//! Crate-level error types
//!
//! Per-frame and per-connection failures are handled locally by the
//! components that hit them. This error type covers the failures that
//! propagate: startup resource acquisition and illegal state transitions.

use crate::camera::ConnectionState;
use crate::source::SourceError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pipeline operations
#[derive(Debug)]
pub enum Error {
    /// I/O error (socket bind, accept)
    Io(std::io::Error),
    /// Frame source error surfaced past the retry loop
    Source(SourceError),
    /// Illegal connection state transition
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// Invalid configuration value
    Config(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Source(e) => write!(f, "frame source error: {}", e),
            Error::InvalidTransition { from, to } => {
                write!(f, "illegal state transition: {:?} -> {:?}", from, to)
            }
            Error::Config(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Source(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<SourceError> for Error {
    fn from(e: SourceError) -> Self {
        Error::Source(e)
    }
}
