//! Error types for Bleatkan.
//!
//! Every fallible operation in the crate returns [`BleatError`]. The variants
//! follow how a failure is handled rather than where it came from: argument
//! and state errors go straight back to the caller, format and protocol errors
//! are logged and the offending record is skipped, transport errors feed the
//! reconnect loop.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Bleatkan library.
#[derive(Debug, Error)]
pub enum BleatError {
    /// Malformed constructor or factory input.
    #[error("{0}")]
    Argument(String),

    /// Malformed InstanceID string or descriptor file content.
    #[error("{0}")]
    Format(String),

    /// A wire message could not be unframed or decoded.
    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        /// Offending frame, truncated for logging
        frame: Option<String>,
    },

    /// Connect, send or receive failure on the socket.
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<tokio_tungstenite::tungstenite::Error>>,
    },

    /// Operation invoked on a connection that cannot serve it, or a request
    /// that failed validation.
    #[error("{0}")]
    State(String),

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("File watcher error: {0}")]
    Watcher(String),
}

/// Result type alias using BleatError.
pub type Result<T> = std::result::Result<T, BleatError>;

impl From<std::io::Error> for BleatError {
    fn from(err: std::io::Error) -> Self {
        BleatError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for BleatError {
    fn from(err: serde_json::Error) -> Self {
        BleatError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BleatError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        BleatError::Transport {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<notify::Error> for BleatError {
    fn from(err: notify::Error) -> Self {
        BleatError::Watcher(err.to_string())
    }
}

impl BleatError {
    /// Attach a path to an IO error.
    pub fn io_at(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        BleatError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Build a protocol error, keeping at most the first 120 chars of the frame.
    pub fn protocol(message: impl Into<String>, frame: &str) -> Self {
        BleatError::Protocol {
            message: message.into(),
            frame: Some(frame.chars().take(120).collect()),
        }
    }

    /// Check if this error is retryable.
    ///
    /// Only socket-level IO failures are; a handshake the server rejected
    /// fails the same way on the next attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            BleatError::Transport {
                source: Some(err), ..
            } => matches!(**err, tokio_tungstenite::tungstenite::Error::Io(_)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BleatError::Argument("Timestamp must be greater than 0".into());
        assert_eq!(err.to_string(), "Timestamp must be greater than 0");

        let err = BleatError::protocol("missing channel", ":{}");
        assert_eq!(err.to_string(), "Protocol error: missing channel");
    }

    #[test]
    fn test_protocol_frame_truncated() {
        let long = "x".repeat(500);
        match BleatError::protocol("too long", &long) {
            BleatError::Protocol { frame: Some(f), .. } => assert_eq!(f.len(), 120),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_is_retryable() {
        use tokio_tungstenite::tungstenite::Error as WsError;

        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(BleatError::from(WsError::Io(refused)).is_retryable());
        assert!(!BleatError::from(WsError::AlreadyClosed).is_retryable());

        let bare = BleatError::Transport {
            message: "refused".into(),
            source: None,
        };
        assert!(!bare.is_retryable());
        assert!(!BleatError::State("closed".into()).is_retryable());
        assert!(!BleatError::Format("bad".into()).is_retryable());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: BleatError = io.into();
        assert!(matches!(err, BleatError::Io { path: None, .. }));
    }
}
