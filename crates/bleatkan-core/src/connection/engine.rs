//! Reconnecting WebSocket connection to one veadotube instance.
//!
//! Each [`Connection`] owns a single background task. That task opens the
//! socket, runs the receive pipeline, performs every write requested through
//! [`Connection::send`], and tears the session down again, so no two socket
//! operations for one connection ever interleave.
//!
//! The task only holds a weak reference to its connection. Dropping the last
//! `Arc<Connection>` cancels it just like [`Connection::close`].

use super::framing::frame;
use super::listener::{ConnectionError, ConnectionListener};
use super::pipeline::ReceivePipeline;
use crate::callback;
use crate::cancel::CancellationToken;
use crate::config::{ConnectionConfig, DiscoveryConfig};
use crate::error::{BleatError, Result};
use crate::instance::Instance;
use crate::message::RequestMessage;
use crate::time::unix_time_millis;
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Parent of every connection created without an explicit one.
static DEFAULT_PARENT: LazyLock<CancellationToken> = LazyLock::new(CancellationToken::new);

/// Lifecycle of a [`Connection`]. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    /// Between sessions, waiting to retry.
    Disconnected,
    Closed,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Idle => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Disconnected => 3,
            ConnectionState::Closed => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Idle,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Disconnected,
            _ => ConnectionState::Closed,
        }
    }
}

/// A frame waiting for the connection task to write it.
struct Outbound {
    text: String,
    ack: oneshot::Sender<Result<()>>,
}

/// How a connect attempt or socket session ended.
enum SessionEnd {
    Cancelled,
    ConnectFailed(ConnectionError),
    /// Close frame received, with its code if it carried one.
    Closed(Option<CloseCode>),
    /// The socket went away without a close frame (1006).
    Abnormal(String),
    TimedOut,
    Failed(String),
}

/// A reconnecting WebSocket connection to one veadotube instance.
pub struct Connection {
    instance: Instance,
    id: String,
    connection_time_millis: i64,
    listener: Arc<dyn ConnectionListener>,
    token: CancellationToken,
    state: AtomicU8,
    active: AtomicBool,
    outbound: Mutex<Option<mpsc::Sender<Outbound>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Connect to `instance` and keep reconnecting until closed.
    ///
    /// Returns immediately; progress is reported through `listener`. Without
    /// a `parent` the connection belongs to the process-wide default scope
    /// cancelled by [`Connection::close_all`].
    ///
    /// Fails with [`BleatError::Argument`] if the instance does not form a
    /// valid URI (the listener also sees
    /// [`ConnectionError::InvalidServerOrName`]), and with
    /// [`BleatError::State`] outside a tokio runtime.
    pub fn new(
        instance: Instance,
        listener: Arc<dyn ConnectionListener>,
        parent: Option<&CancellationToken>,
    ) -> Result<Arc<Self>> {
        let parent = parent.unwrap_or(&*DEFAULT_PARENT);
        let id = instance.websocket_uri();
        let connection = Arc::new(Connection {
            instance,
            id,
            connection_time_millis: unix_time_millis(),
            listener,
            token: parent.child_token(),
            state: AtomicU8::new(ConnectionState::Idle.as_u8()),
            active: AtomicBool::new(true),
            outbound: Mutex::new(None),
            task: Mutex::new(None),
        });
        trace!("Connection websocket target: {}", connection.id);

        if let Err(message) = validate_uri(&connection.id) {
            connection.notify_error(ConnectionError::InvalidServerOrName);
            connection.close();
            return Err(BleatError::Argument(format!(
                "Invalid server or name for {}: {}",
                connection.instance, message
            )));
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                connection.close();
                return Err(BleatError::State(format!(
                    "Connection requires a tokio runtime: {}",
                    e
                )));
            }
        };

        let handle = runtime.spawn(run_loop(
            Arc::downgrade(&connection),
            connection.token.clone(),
            connection.id.clone(),
        ));
        *connection.task_slot() = Some(handle);

        Ok(connection)
    }

    /// Close every connection created without an explicit parent.
    ///
    /// Connections created afterwards are unaffected.
    pub fn close_all() {
        trace!("Connection::close_all: cancelling default scope");
        DEFAULT_PARENT.cancel_children();
    }

    /// The target URI.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// When this connection was created, in Unix milliseconds.
    pub fn connection_time_millis(&self) -> i64 {
        self.connection_time_millis
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// A socket session is currently open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// The reconnect loop is still running or will retry.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) && !self.token.is_cancelled()
    }

    /// Send `request` on `channel` as a single text frame.
    ///
    /// The frame is written by the connection task; this resolves once the
    /// write has completed or failed. Nothing is queued while disconnected.
    pub async fn send(&self, channel: &str, request: &RequestMessage, validate: bool) -> Result<()> {
        if self.is_closed() {
            return Err(BleatError::State("Connection is Closed".into()));
        }
        if !self.is_active() {
            return Err(BleatError::State("Connection Websocket not active".into()));
        }
        if channel.trim().is_empty() {
            return Err(BleatError::Argument("Channel cannot be blank".into()));
        }
        let sender = self
            .outbound_slot()
            .clone()
            .filter(|_| self.is_connected())
            .ok_or_else(|| {
                BleatError::State("Connection Websocket Session is not active".into())
            })?;
        if validate {
            request.validate()?;
        }

        let text = frame(channel, &request.to_json_string()?);
        trace!("Sending message: '{}'", text);
        let (ack, done) = oneshot::channel();
        sender
            .send(Outbound { text, ack })
            .await
            .map_err(|_| BleatError::State("Connection Websocket Session closed before send".into()))?;
        done.await
            .map_err(|_| BleatError::State("Connection Websocket Session closed during send".into()))?
    }

    /// Send `request` on the `nodes` channel without validation.
    pub async fn send_nodes(&self, request: &RequestMessage) -> Result<()> {
        self.send(ConnectionConfig::DEFAULT_CHANNEL, request, false)
            .await
    }

    /// Stop the reconnect loop and release the socket. Idempotent.
    pub fn close(&self) {
        let previous = self
            .state
            .swap(ConnectionState::Closed.as_u8(), Ordering::SeqCst);
        if previous == ConnectionState::Closed.as_u8() {
            return;
        }
        debug!("Closing {}", self);
        self.active.store(false, Ordering::SeqCst);
        self.outbound_slot().take();
        self.token.cancel();
    }

    /// Close and wait for the background task to finish.
    ///
    /// Must not be awaited from inside a listener callback of this
    /// connection.
    pub async fn shutdown(&self) {
        self.close();
        let task = self.task_slot().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let closed = ConnectionState::Closed.as_u8();
        let _ = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current != closed).then_some(state.as_u8())
            });
    }

    fn outbound_slot(&self) -> MutexGuard<'_, Option<mpsc::Sender<Outbound>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn task_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session_opened(&self, sender: mpsc::Sender<Outbound>) {
        *self.outbound_slot() = Some(sender);
        self.set_state(ConnectionState::Connected);
    }

    fn session_ended(&self) {
        self.outbound_slot().take();
        self.set_state(ConnectionState::Disconnected);
    }

    fn loop_ended(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.outbound_slot().take();
        self.state
            .store(ConnectionState::Closed.as_u8(), Ordering::SeqCst);
    }

    fn notify_error(&self, error: ConnectionError) {
        callback::invoke("on_connection_error", || {
            self.listener.on_connection_error(self, error)
        });
    }

    fn notify_change(&self, active: bool) {
        callback::invoke("on_connection_change", || {
            self.listener.on_connection_change(self, active)
        });
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.connection_time_millis == other.connection_time_millis
            && self.id == other.id
            && self.instance.id() == other.instance.id()
    }
}

impl Eq for Connection {}

impl Hash for Connection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.connection_time_millis.hash(state);
        self.id.hash(state);
        self.instance.id().hash(state);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("instance", self.instance.id())
            .field("id", &self.id)
            .field("connection_time_millis", &self.connection_time_millis)
            .field("state", &self.state())
            .finish()
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Connection(instance={}, id='{}', connectionTimeMillis={})",
            self.instance.id(),
            self.id,
            self.connection_time_millis
        )
    }
}

fn validate_uri(uri: &str) -> std::result::Result<(), String> {
    let url = Url::parse(uri).map_err(|e| e.to_string())?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err("missing host".into()),
    }
}

/// Run `f` against the connection if it is still alive.
fn with_connection(weak: &Weak<Connection>, f: impl FnOnce(&Connection)) -> bool {
    match weak.upgrade() {
        Some(connection) => {
            f(&connection);
            true
        }
        None => false,
    }
}

/// Sleep unless cancelled first. Returns `false` on cancellation.
async fn pause(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

async fn run_loop(weak: Weak<Connection>, token: CancellationToken, uri: String) {
    trace!("{}: reconnect loop started", uri);
    let mut error_count: u32 = 0;

    loop {
        let proceed = match weak.upgrade() {
            Some(connection) if connection.is_active() => {
                connection.set_state(ConnectionState::Connecting);
                true
            }
            _ => false,
        };
        if !proceed {
            break;
        }

        let attempt = tokio::select! {
            _ = token.cancelled() => break,
            attempt = open_socket(&uri) => attempt,
        };

        let was_connected = attempt.is_ok();
        let end = match attempt {
            Ok(stream) => {
                error_count = 0;
                run_session(&weak, &token, &uri, stream).await
            }
            Err(kind) => SessionEnd::ConnectFailed(kind),
        };

        let mut retry = true;
        match end {
            SessionEnd::Cancelled => retry = false,
            SessionEnd::ConnectFailed(kind) => {
                debug!("{}: connect failed ({})", uri, kind);
                with_connection(&weak, |c| c.notify_error(kind));
                error_count += 1;
            }
            SessionEnd::Closed(Some(CloseCode::Normal | CloseCode::Away)) => {
                debug!("{}: closed by server", uri);
                retry = false;
            }
            SessionEnd::Closed(Some(CloseCode::Abnormal)) | SessionEnd::Abnormal(_) => {
                trace!(
                    "{}: closed without close frame, instance probably exited",
                    uri
                );
                error_count += 1;
                // Give discovery one loop to reap the instance first.
                let wait = DiscoveryConfig::READ_LOOP_DELAY_MAX
                    .saturating_sub(ConnectionConfig::ERROR_WAIT);
                if !pause(&token, wait).await {
                    retry = false;
                }
            }
            SessionEnd::Closed(code) => {
                debug!("{}: closed abnormally ({:?})", uri, code);
                error_count += 1;
            }
            SessionEnd::TimedOut => {
                debug!(
                    "{}: no frame for {:?}, dropping session",
                    uri,
                    ConnectionConfig::SOCKET_TIMEOUT
                );
                with_connection(&weak, |c| c.notify_error(ConnectionError::None));
                error_count += 1;
            }
            SessionEnd::Failed(message) => {
                debug!("{}: session failed: {}", uri, message);
                with_connection(&weak, |c| c.notify_error(ConnectionError::None));
                error_count += 1;
            }
        }

        if retry && error_count >= ConnectionConfig::ERROR_MAX {
            warn!("{}: max reconnect retries reached", uri);
            retry = false;
            with_connection(&weak, |c| {
                c.active.store(false, Ordering::SeqCst);
                c.notify_error(ConnectionError::ExceededRetries);
            });
        }

        if was_connected {
            with_connection(&weak, |c| {
                info!("Disconnected from {}", c.instance);
                c.notify_change(false);
            });
        }

        if !retry {
            break;
        }
        if !pause(&token, ConnectionConfig::ERROR_WAIT * error_count).await {
            break;
        }
    }

    with_connection(&weak, Connection::loop_ended);
    trace!("{}: reconnect loop ended", uri);
}

/// Open the socket, retrying connect-level failures.
async fn open_socket(uri: &str) -> std::result::Result<WsStream, ConnectionError> {
    let mut failure = ConnectionError::None;
    for attempt in 1..=ConnectionConfig::CONNECT_ATTEMPTS {
        match tokio::time::timeout(ConnectionConfig::CONNECT_TIMEOUT, connect_async(uri)).await {
            Ok(Ok((stream, response))) => {
                debug!("{}: handshake complete ({})", uri, response.status());
                return Ok(stream);
            }
            Ok(Err(e)) => {
                failure = classify_connect_error(&e);
                let err = BleatError::from(e);
                trace!("{}: connect attempt {} failed: {}", uri, attempt, err);
                if !err.is_retryable() {
                    break;
                }
            }
            Err(_) => {
                trace!(
                    "{}: connect attempt {} timed out after {:?}",
                    uri,
                    attempt,
                    ConnectionConfig::CONNECT_TIMEOUT
                );
                failure = ConnectionError::None;
            }
        }
    }
    Err(failure)
}

fn classify_connect_error(err: &WsError) -> ConnectionError {
    match err {
        WsError::Io(e)
            if matches!(
                e.kind(),
                ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::NotConnected
                    | ErrorKind::AddrNotAvailable
            ) =>
        {
            ConnectionError::FailedToConnect
        }
        WsError::ConnectionClosed | WsError::AlreadyClosed => ConnectionError::FailedToConnect,
        _ => ConnectionError::None,
    }
}

fn classify_read_error(err: WsError) -> SessionEnd {
    match err {
        WsError::Io(_)
        | WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
            SessionEnd::Abnormal(err.to_string())
        }
        other => SessionEnd::Failed(other.to_string()),
    }
}

async fn run_session(
    weak: &Weak<Connection>,
    token: &CancellationToken,
    uri: &str,
    stream: WsStream,
) -> SessionEnd {
    let (mut sink, mut source) = stream.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(ConnectionConfig::OUTBOUND_CAPACITY);

    let deliver_to = weak.clone();
    let pipeline = ReceivePipeline::spawn(uri.to_string(), token.child_token(), move |message| {
        if let Some(connection) = deliver_to.upgrade() {
            connection
                .listener
                .on_connection_receive(&connection, message);
        }
    });

    let opened = with_connection(weak, |c| {
        c.session_opened(outbound_tx);
        info!("Connected to {}", c.instance);
        c.notify_change(true);
    });

    let mut ping = tokio::time::interval_at(
        Instant::now() + ConnectionConfig::PING_INTERVAL,
        ConnectionConfig::PING_INTERVAL,
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let end = if !opened {
        SessionEnd::Cancelled
    } else {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "bye".into(),
                        })))
                        .await;
                    break SessionEnd::Cancelled;
                }
                next = tokio::time::timeout(ConnectionConfig::SOCKET_TIMEOUT, source.next()) => match next {
                    Err(_) => break SessionEnd::TimedOut,
                    Ok(None) => break SessionEnd::Abnormal("stream ended".into()),
                    Ok(Some(Ok(Message::Close(close)))) => {
                        break SessionEnd::Closed(close.map(|c| c.code));
                    }
                    Ok(Some(Ok(message))) => {
                        tokio::select! {
                            _ = token.cancelled() => {}
                            _ = pipeline.push(message) => {}
                        }
                    }
                    Ok(Some(Err(e))) => break classify_read_error(e),
                },
                Some(outbound) = outbound_rx.recv() => {
                    let result = sink
                        .send(Message::Text(outbound.text))
                        .await
                        .map_err(BleatError::from);
                    if let Err(e) = &result {
                        debug!("{}: {}", uri, e);
                    }
                    let _ = outbound.ack.send(result);
                }
                _ = ping.tick() => {
                    if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                        break classify_read_error(e);
                    }
                }
            }
        }
    };

    with_connection(weak, Connection::session_ended);
    drop(outbound_rx);
    let _ = tokio::time::timeout(Duration::from_secs(1), sink.close()).await;
    drop(source);
    pipeline.finish().await;
    end
}
