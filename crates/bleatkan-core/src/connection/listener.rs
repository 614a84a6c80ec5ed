//! Connection callbacks.

use super::Connection;
use crate::message::ResultMessage;
use std::fmt;

/// Why a connection reported an error to its listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionError {
    /// Generic failure: timeout, protocol error, dropped session.
    None,
    /// The instance's server or name does not form a valid URI.
    InvalidServerOrName,
    /// The server refused the connection or the socket was unusable.
    FailedToConnect,
    /// The reconnect loop gave up.
    ExceededRetries,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionError::None => "None",
            ConnectionError::InvalidServerOrName => "InvalidServerOrName",
            ConnectionError::FailedToConnect => "FailedToConnect",
            ConnectionError::ExceededRetries => "ExceededRetries",
        };
        f.write_str(s)
    }
}

/// Receives connection events.
///
/// Callbacks run on the connection's own tasks and must not block for long:
/// the receive pipeline waits for `on_connection_receive` before handing
/// over the next message. A panic inside a callback is logged and dropped.
pub trait ConnectionListener: Send + Sync + 'static {
    fn on_connection_error(&self, connection: &Connection, error: ConnectionError);

    /// `active` is true once a session opens and false when it ends.
    fn on_connection_change(&self, connection: &Connection, active: bool);

    fn on_connection_receive(&self, connection: &Connection, message: ResultMessage);
}
