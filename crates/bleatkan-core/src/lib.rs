//! Bleatkan Core - client library for veadotube instances.
//!
//! Finds running veadotube instances through the descriptor files they write
//! under `~/.veadotube/instances`, keeps a reconnecting WebSocket connection
//! to each, and caches the avatar states and thumbnails they report.
//!
//! # Example
//!
//! ```rust,ignore
//! use bleatkan_core::{InstancesListener, InstancesManager, Instance, InstanceId};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl InstancesListener for Printer {
//!     fn on_instance_start(&self, instance: &Instance) {
//!         println!("started: {}", instance);
//!     }
//!     fn on_instance_change(&self, new: &Instance, _old: &Instance) {
//!         println!("changed: {}", new);
//!     }
//!     fn on_instance_end(&self, id: &InstanceId) {
//!         println!("ended: {}", id);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> bleatkan_core::Result<()> {
//!     let manager = InstancesManager::start(Arc::new(Printer))?;
//!     tokio::signal::ctrl_c().await?;
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cancel;
pub mod config;
pub mod connection;
pub mod error;
pub mod instance;
pub mod message;
pub mod time;

mod callback;

// Re-export commonly used types
pub use cache::{CacheStats, VeadoConnectionData, VtState, VtThumbnail};
pub use cancel::CancellationToken;
pub use config::{CacheConfig, ConnectionConfig, DiscoveryConfig, DiscoveryOptions};
pub use connection::{
    Client, ClientHandler, Connection, ConnectionError, ConnectionListener, ConnectionState,
};
pub use error::{BleatError, Result};
pub use instance::{
    instances_dir, Instance, InstanceId, InstancesListener, InstancesManager, VtInstance,
};
pub use message::{RequestMessage, RequestPayload, ResultMessage, ResultPayload};
