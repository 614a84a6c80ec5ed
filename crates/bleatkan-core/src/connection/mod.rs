//! WebSocket connections to veadotube instances.
//!
//! A [`Connection`] reconnects on its own until closed, retries exhausted, or
//! the server closes normally. Everything it sees is reported to a
//! [`ConnectionListener`]; requests go out through [`Connection::send`].

mod client;
mod engine;
mod framing;
mod listener;
mod pipeline;

pub use client::{Client, ClientHandler};
pub use engine::{Connection, ConnectionState};
pub use framing::{frame, unframe};
pub use listener::{ConnectionError, ConnectionListener};
