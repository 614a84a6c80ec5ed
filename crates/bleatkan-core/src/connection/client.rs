//! Channel-scoped view of a connection.

use super::Connection;
use crate::callback;
use crate::error::{BleatError, Result};
use crate::message::{RequestMessage, ResultMessage};
use std::sync::{Arc, Mutex, PoisonError};

/// Receives the traffic a [`Client`] forwards.
pub trait ClientHandler: Send + Sync {
    fn on_connect(&self, active: bool);

    fn on_receive(&self, message: &ResultMessage);
}

/// Sends and receives on a fixed set of channels of one connection.
///
/// The owner routes connection events into the client with
/// [`emit_receive`](Client::emit_receive) and
/// [`emit_connect`](Client::emit_connect).
pub struct Client {
    connection: Mutex<Option<Arc<Connection>>>,
    channels: Vec<String>,
    handler: Arc<dyn ClientHandler>,
}

impl Client {
    /// Blank and duplicate channel names are dropped; order is kept.
    pub fn new<I, S>(connection: Arc<Connection>, channels: I, handler: Arc<dyn ClientHandler>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for channel in channels {
            let channel = channel.into();
            if !channel.trim().is_empty() && !unique.contains(&channel) {
                unique.push(channel);
            }
        }
        Self {
            connection: Mutex::new(Some(connection)),
            channels: unique,
            handler,
        }
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn connection(&self) -> Option<Arc<Connection>> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_closed(&self) -> bool {
        self.connection().is_none()
    }

    /// Send on the first channel. `Ok(false)` if there is nothing to send
    /// through.
    pub async fn send(&self, request: &RequestMessage) -> Result<bool> {
        match self.channels.first() {
            Some(channel) => self.send_on(channel, request).await,
            None => Ok(false),
        }
    }

    /// Send on one of this client's channels.
    pub async fn send_on(&self, channel: &str, request: &RequestMessage) -> Result<bool> {
        if !self.channels.iter().any(|c| c == channel) {
            return Err(BleatError::Argument(format!(
                "Channel {} is not one of {:?}",
                channel, self.channels
            )));
        }
        let Some(connection) = self.connection() else {
            return Ok(false);
        };
        connection.send(channel, request, false).await?;
        Ok(true)
    }

    /// Forward `message` if it arrived on one of this client's channels.
    pub fn emit_receive(&self, message: &ResultMessage) -> bool {
        if self.is_closed() || !self.channels.iter().any(|c| c == message.channel()) {
            return false;
        }
        callback::invoke("on_receive", || self.handler.on_receive(message))
    }

    pub fn emit_connect(&self, active: bool) {
        if !self.is_closed() {
            callback::invoke("on_connect", || self.handler.on_connect(active));
        }
    }

    /// Release the connection handle. The connection itself stays open.
    pub fn close(&self) {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::connection::{ConnectionError, ConnectionListener};
    use crate::instance::{Instance, InstanceId};
    use crate::message::event_list;

    struct Quiet;

    impl ConnectionListener for Quiet {
        fn on_connection_error(&self, _: &Connection, _: ConnectionError) {}
        fn on_connection_change(&self, _: &Connection, _: bool) {}
        fn on_connection_receive(&self, _: &Connection, _: ResultMessage) {}
    }

    #[derive(Default)]
    struct Seen {
        received: Mutex<Vec<String>>,
        connects: Mutex<Vec<bool>>,
    }

    impl ClientHandler for Seen {
        fn on_connect(&self, active: bool) {
            self.connects.lock().unwrap().push(active);
        }

        fn on_receive(&self, message: &ResultMessage) {
            self.received.lock().unwrap().push(message.channel().to_string());
        }
    }

    fn connection(parent: &CancellationToken) -> Arc<Connection> {
        let id = InstanceId::parse("mini-08dc8d3c583c0587-00000f38").unwrap();
        let instance = Instance::new(id, "mini", "127.0.0.1:9").unwrap();
        instance.connect_with_parent(Arc::new(Quiet), parent).unwrap()
    }

    fn list_on(channel: &str) -> ResultMessage {
        ResultMessage::from_json(r#"{"event":"list","entries":[]}"#)
            .unwrap()
            .with_channel(channel)
    }

    #[tokio::test]
    async fn test_channels_deduplicated() {
        let parent = CancellationToken::new();
        let client = Client::new(
            connection(&parent),
            ["nodes", " ", "nodes", "extra", ""],
            Arc::new(Seen::default()),
        );
        assert_eq!(client.channels(), ["nodes", "extra"]);
        parent.cancel();
    }

    #[tokio::test]
    async fn test_forwards_only_own_channels() {
        let parent = CancellationToken::new();
        let seen = Arc::new(Seen::default());
        let client = Client::new(connection(&parent), ["nodes"], seen.clone());

        assert!(client.emit_receive(&list_on("nodes")));
        assert!(!client.emit_receive(&list_on("other")));
        client.emit_connect(true);

        assert_eq!(*seen.received.lock().unwrap(), vec!["nodes".to_string()]);
        assert_eq!(*seen.connects.lock().unwrap(), vec![true]);
        parent.cancel();
    }

    #[tokio::test]
    async fn test_closed_client_is_inert() {
        let parent = CancellationToken::new();
        let seen = Arc::new(Seen::default());
        let client = Client::new(connection(&parent), ["nodes"], seen.clone());
        client.close();

        assert!(client.is_closed());
        assert!(!client.send(event_list()).await.unwrap());
        assert!(!client.emit_receive(&list_on("nodes")));
        client.emit_connect(false);
        assert!(seen.connects.lock().unwrap().is_empty());
        assert!(matches!(
            client.send_on("other", event_list()).await,
            Err(BleatError::Argument(_))
        ));
        parent.cancel();
    }
}
