//! Avatar state cache.
//!
//! Keeps the states, the current state and state thumbnails reported by one
//! connection, with thumbnails retained through two LRU tiers.

mod data;
mod lru;
mod state;

pub use data::{CacheStats, VeadoConnectionData};
pub use state::{VtState, VtThumbnail};
