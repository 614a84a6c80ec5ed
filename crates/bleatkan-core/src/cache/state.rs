//! Cached avatar states and thumbnails.

use crate::error::{BleatError, Result};
use crate::message::{ResultPayloadPng, State};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

#[derive(Clone)]
struct ThumbnailData {
    png: String,
    width: i32,
    height: i32,
    png_hash: blake3::Hash,
}

/// Thumbnail of one avatar state, updated in place when the server sends a
/// new image.
pub struct VtThumbnail {
    data: RwLock<ThumbnailData>,
}

impl VtThumbnail {
    pub(crate) fn new(payload: &ResultPayloadPng) -> Self {
        Self {
            data: RwLock::new(ThumbnailData {
                png: payload.png.clone(),
                width: payload.width,
                height: payload.height,
                png_hash: payload.png_hash(),
            }),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ThumbnailData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Base64 PNG body as received.
    pub fn png(&self) -> String {
        self.read().png.clone()
    }

    pub fn png_bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.read().png.trim())
            .map_err(|e| BleatError::Protocol {
                message: format!("thumbnail is not valid base64: {}", e),
                frame: None,
            })
    }

    pub fn width(&self) -> i32 {
        self.read().width
    }

    pub fn height(&self) -> i32 {
        self.read().height
    }

    pub fn png_hash(&self) -> blake3::Hash {
        self.read().png_hash
    }

    /// Replace the image unless `payload` is blank or identical.
    pub(crate) fn update(&self, payload: &ResultPayloadPng) -> bool {
        if payload.png.trim().is_empty() {
            return false;
        }
        let hash = payload.png_hash();
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        if data.png_hash == hash {
            return false;
        }
        *data = ThumbnailData {
            png: payload.png.clone(),
            width: payload.width,
            height: payload.height,
            png_hash: hash,
        };
        true
    }
}

impl fmt::Debug for VtThumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.read();
        f.debug_struct("VtThumbnail")
            .field("width", &data.width)
            .field("height", &data.height)
            .field("png_len", &data.png.len())
            .finish()
    }
}

/// One avatar state of a connection.
///
/// Only a weak reference to the thumbnail is kept here; the cache tiers
/// decide how long it lives.
pub struct VtState {
    id: String,
    name: RwLock<Option<String>>,
    thumbnail: RwLock<Weak<VtThumbnail>>,
}

impl VtState {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: RwLock::new(name.filter(|n| !n.trim().is_empty())),
            thumbnail: RwLock::new(Weak::new()),
        }
    }

    pub(crate) fn from_state(state: &State) -> Self {
        Self::new(state.id.clone(), Some(state.name.clone()))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name, once a state list has provided one.
    pub fn name(&self) -> Option<String> {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The thumbnail, if something still holds it.
    pub fn thumbnail(&self) -> Option<Arc<VtThumbnail>> {
        self.thumbnail
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }

    pub(crate) fn update_name(&self, state: &State) -> bool {
        if state.id != self.id || state.name.trim().is_empty() {
            return false;
        }
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = Some(state.name.clone());
        true
    }

    /// Apply a thumbnail payload. Returns the thumbnail if it changed; the
    /// caller must keep it alive.
    pub(crate) fn update_thumbnail(&self, payload: &ResultPayloadPng) -> Option<Arc<VtThumbnail>> {
        if payload.state != self.id || payload.png.trim().is_empty() {
            return None;
        }
        let mut slot = self
            .thumbnail
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match slot.upgrade() {
            Some(existing) => existing.update(payload).then_some(existing),
            None => {
                let thumbnail = Arc::new(VtThumbnail::new(payload));
                *slot = Arc::downgrade(&thumbnail);
                Some(thumbnail)
            }
        }
    }

    pub(crate) fn clear_thumbnail(&self) -> bool {
        let mut slot = self
            .thumbnail
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let had = slot.strong_count() > 0;
        *slot = Weak::new();
        had
    }
}

impl fmt::Debug for VtState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VtState")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("thumbnail", &self.thumbnail())
            .finish()
    }
}
