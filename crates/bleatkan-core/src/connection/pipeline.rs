//! Receive pipeline.
//!
//! Frames pass through bounded stages, so a slow listener stalls socket reads
//! instead of growing a queue:
//!
//! ```text
//! socket ─▶ [text only] ─▶ [unframe] ─▶ [decode] ─▶ [deliver] ─▶ listener
//! ```
//!
//! A frame that fails to unframe or decode is logged and dropped.

use super::framing::unframe;
use crate::callback;
use crate::cancel::CancellationToken;
use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::message::ResultMessage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

/// Stage tasks for one socket session.
pub(crate) struct ReceivePipeline {
    input: Option<mpsc::Sender<Message>>,
    tasks: Vec<JoinHandle<()>>,
}

impl ReceivePipeline {
    /// Start the stages. `deliver` runs once per decoded message, in arrival
    /// order.
    pub(crate) fn spawn<F>(label: String, token: CancellationToken, deliver: F) -> Self
    where
        F: Fn(ResultMessage) + Send + 'static,
    {
        let capacity = ConnectionConfig::PIPELINE_CAPACITY;
        let (frame_tx, frame_rx) = mpsc::channel::<Message>(capacity);
        let (text_tx, text_rx) = mpsc::channel::<String>(capacity);
        let (framed_tx, framed_rx) = mpsc::channel::<Framed>(capacity);
        let (decoded_tx, decoded_rx) = mpsc::channel::<ResultMessage>(capacity);

        let tasks = vec![
            tokio::spawn(accept_text(frame_rx, text_tx, token.clone(), label.clone())),
            tokio::spawn(split_frames(text_rx, framed_tx, token.clone(), label.clone())),
            tokio::spawn(decode(framed_rx, decoded_tx, token.clone(), label.clone())),
            tokio::spawn(dispatch(decoded_rx, deliver, token, label)),
        ];

        Self {
            input: Some(frame_tx),
            tasks,
        }
    }

    /// Queue a frame, waiting for room. Returns `false` once the pipeline has
    /// stopped.
    pub(crate) async fn push(&self, message: Message) -> bool {
        match &self.input {
            Some(input) => input.send(message).await.is_ok(),
            None => false,
        }
    }

    /// Stop accepting frames and wait for the queued ones to drain.
    pub(crate) async fn finish(mut self) {
        self.input = None;
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

/// A text frame split into its channel and JSON body.
#[derive(Debug)]
struct Framed {
    channel: String,
    json: String,
}

impl Framed {
    fn split(text: &str) -> Result<Self> {
        let (channel, json) = unframe(text)?;
        Ok(Self {
            channel: channel.to_string(),
            json: json.to_string(),
        })
    }

    /// Decode the body, tagging the result with the channel.
    fn decode(&self) -> Result<ResultMessage> {
        let message = ResultMessage::from_json(&self.json)?;
        Ok(message.with_channel(self.channel.as_str()))
    }
}

async fn next_item<T>(rx: &mut mpsc::Receiver<T>, token: &CancellationToken) -> Option<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        item = rx.recv() => item,
    }
}

async fn accept_text(
    mut rx: mpsc::Receiver<Message>,
    tx: mpsc::Sender<String>,
    token: CancellationToken,
    label: String,
) {
    while let Some(message) = next_item(&mut rx, &token).await {
        match message {
            Message::Text(text) => {
                trace!("{}: text frame with {} bytes", label, text.len());
                if tx.send(text).await.is_err() {
                    break;
                }
            }
            Message::Ping(_) | Message::Pong(_) => {}
            other => debug!(
                "{}: dropping unexpected frame with {} bytes",
                label,
                other.len()
            ),
        }
    }
}

async fn split_frames(
    mut rx: mpsc::Receiver<String>,
    tx: mpsc::Sender<Framed>,
    token: CancellationToken,
    label: String,
) {
    while let Some(text) = next_item(&mut rx, &token).await {
        match Framed::split(&text) {
            Ok(framed) => {
                if tx.send(framed).await.is_err() {
                    break;
                }
            }
            Err(e) => debug!("{}: dropping malformed frame: {}", label, e),
        }
    }
}

async fn decode(
    mut rx: mpsc::Receiver<Framed>,
    tx: mpsc::Sender<ResultMessage>,
    token: CancellationToken,
    label: String,
) {
    while let Some(framed) = next_item(&mut rx, &token).await {
        match framed.decode() {
            Ok(message) => {
                if tx.send(message).await.is_err() {
                    break;
                }
            }
            Err(e) => debug!("{}: dropping message on {}: {}", label, framed.channel, e),
        }
    }
}

async fn dispatch<F>(
    mut rx: mpsc::Receiver<ResultMessage>,
    deliver: F,
    token: CancellationToken,
    label: String,
) where
    F: Fn(ResultMessage),
{
    while let Some(message) = next_item(&mut rx, &token).await {
        trace!("{}: delivering {} on {}", label, message.event(), message.channel());
        callback::invoke("on_connection_receive", || deliver(message));
    }
}
