//! A discovered veadotube instance.

use super::InstanceId;
use crate::cancel::CancellationToken;
use crate::connection::{Connection, ConnectionListener};
use crate::error::{BleatError, Result};
use std::fmt;
use std::sync::Arc;

/// A running veadotube instance as seen through its descriptor file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    id: InstanceId,
    name: String,
    server: String,
    last_seen_unix_seconds: i64,
}

impl Instance {
    /// Create an instance. `name` and `server` must not be blank.
    pub fn new(id: InstanceId, name: impl Into<String>, server: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let server = server.into();
        if name.trim().is_empty() {
            return Err(BleatError::Argument("Instance name must not be blank".into()));
        }
        if server.trim().is_empty() {
            return Err(BleatError::Argument("Instance server must not be blank".into()));
        }
        Ok(Self {
            id,
            name,
            server,
            last_seen_unix_seconds: 0,
        })
    }

    pub fn with_last_seen(mut self, unix_seconds: i64) -> Self {
        self.last_seen_unix_seconds = unix_seconds;
        self
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    /// Display name, as set in veadotube.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `host:port` of the instance's WebSocket server.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Last descriptor refresh, unix seconds.
    pub fn last_seen_unix_seconds(&self) -> i64 {
        self.last_seen_unix_seconds
    }

    pub(crate) fn touch(&mut self, unix_seconds: i64) {
        self.last_seen_unix_seconds = unix_seconds;
    }

    /// Key identifying a reconnect target: `name-server_id`.
    pub fn connection_key(&self) -> String {
        format!("{}-{}_{}", self.name, self.server, self.id)
    }

    /// `ws://<server>?n=<url-encoded name>`.
    pub fn websocket_uri(&self) -> String {
        format!("ws://{}?n={}", self.server, urlencoding::encode(&self.name))
    }

    /// Open a connection to this instance under the process-wide default scope.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self, listener: Arc<dyn ConnectionListener>) -> Result<Arc<Connection>> {
        Connection::new(self.clone(), listener, None)
    }

    /// Open a connection whose lifetime is bound to `parent`.
    pub fn connect_with_parent(
        &self,
        listener: Arc<dyn ConnectionListener>,
        parent: &CancellationToken,
    ) -> Result<Arc<Connection>> {
        Connection::new(self.clone(), listener, Some(parent))
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} @ {})", self.id, self.name, self.server)
    }
}
