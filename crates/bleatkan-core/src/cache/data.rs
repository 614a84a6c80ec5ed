//! Per-connection state cache.

use super::lru::LruTier;
use super::state::{VtState, VtThumbnail};
use crate::config::CacheConfig;
use crate::connection::Connection;
use crate::message::{ResultPayloadPng, ResultPayloadState, ResultPayloadStateList};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tracing::trace;

/// Cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub states: usize,
    pub strict_entries: usize,
    pub reclaimable_entries: usize,
    pub current_pinned: bool,
}

/// Avatar states and thumbnails seen on one connection.
///
/// `VtState` values keep their identity across updates, so consumers can hold
/// on to an `Arc<VtState>` and see later name and thumbnail changes.
///
/// Thumbnails are kept alive by two LRU tiers: a small strict tier and a
/// larger reclaimable one that is dropped wholesale by
/// [`release_reclaimable`](Self::release_reclaimable). The thumbnail of the
/// current state is pinned for as long as it stays current.
#[derive(Debug)]
pub struct VeadoConnectionData {
    connection: Weak<Connection>,
    states_all: Vec<Arc<VtState>>,
    states_by_id: HashMap<String, Arc<VtState>>,
    current_state: Option<Arc<VtState>>,
    current_state_thumbnail: Option<Arc<VtThumbnail>>,
    strict: LruTier<Arc<VtThumbnail>>,
    reclaimable: LruTier<Arc<VtThumbnail>>,
}

impl Default for VeadoConnectionData {
    /// A cache not tied to any connection.
    fn default() -> Self {
        Self {
            connection: Weak::new(),
            states_all: Vec::new(),
            states_by_id: HashMap::new(),
            current_state: None,
            current_state_thumbnail: None,
            strict: LruTier::new(CacheConfig::LRU_HARD_SIZE),
            reclaimable: LruTier::new(CacheConfig::LRU_SOFT_SIZE),
        }
    }
}

impl VeadoConnectionData {
    pub fn new(connection: &Arc<Connection>) -> Self {
        Self {
            connection: Arc::downgrade(connection),
            ..Self::default()
        }
    }

    /// The connection, if it is still alive.
    pub fn connection(&self) -> Option<Arc<Connection>> {
        self.connection.upgrade()
    }

    /// States in server order.
    pub fn states_all(&self) -> &[Arc<VtState>] {
        &self.states_all
    }

    pub fn get_state_by_id(&self, state_id: &str) -> Option<&Arc<VtState>> {
        self.states_by_id.get(state_id)
    }

    pub fn current_state(&self) -> Option<&Arc<VtState>> {
        self.current_state.as_ref()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            states: self.states_by_id.len(),
            strict_entries: self.strict.len(),
            reclaimable_entries: self.reclaimable.len(),
            current_pinned: self.current_state_thumbnail.is_some(),
        }
    }

    /// Merge a state list, reusing existing entries.
    ///
    /// An entry whose id sits at the same position keeps its place and only
    /// has its name refreshed. Any other id is looked up or created. When
    /// the order changed, entries no longer listed are dropped along with
    /// their cached thumbnails.
    pub fn update_states(&mut self, payload: &ResultPayloadStateList) {
        let mut replace = payload.states.len() != self.states_all.len();
        let mut next = Vec::with_capacity(payload.states.len());

        for (index, state) in payload.states.iter().enumerate() {
            let entry = match self.states_all.get(index) {
                Some(existing) if existing.id() == state.id => existing.clone(),
                _ => {
                    replace = true;
                    self.states_by_id
                        .entry(state.id.clone())
                        .or_insert_with(|| Arc::new(VtState::from_state(state)))
                        .clone()
                }
            };
            entry.update_name(state);
            next.push(entry);
        }

        if replace {
            let keep: HashSet<String> = next.iter().map(|s| s.id().to_string()).collect();
            trace!("State list replaced: {} states", keep.len());
            self.states_all = next;
            self.states_by_id.retain(|id, _| keep.contains(id));
            self.strict.retain_keys(|id| keep.contains(id));
            self.reclaimable.retain_keys(|id| keep.contains(id));
        }
    }

    /// Point the current state at `payload.state`. Returns `false` if it
    /// already was.
    pub fn update_current_state(&mut self, payload: &ResultPayloadState) -> bool {
        if self
            .current_state
            .as_ref()
            .is_some_and(|current| current.id() == payload.state)
        {
            return false;
        }
        let entry = self.resolve(&payload.state);
        self.current_state_thumbnail = entry.thumbnail();
        self.current_state = Some(entry);
        true
    }

    /// Store a thumbnail. Returns whether anything changed.
    ///
    /// With `update_to_mru` the thumbnail is always placed as most recent,
    /// evicting if needed; otherwise it only fills free slots.
    pub fn update_state_thumbnail(&mut self, payload: &ResultPayloadPng, update_to_mru: bool) -> bool {
        let entry = self.resolve(&payload.state);
        let Some(thumbnail) = entry.update_thumbnail(payload) else {
            return false;
        };

        if self
            .current_state
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &entry))
        {
            self.current_state_thumbnail = Some(thumbnail.clone());
        }

        let id = entry.id();
        if (self.strict.get(id, update_to_mru).is_none() && update_to_mru) || !self.strict.is_full() {
            self.strict.insert(id, thumbnail.clone());
        }
        if (self.reclaimable.get(id, update_to_mru).is_none() && update_to_mru)
            || !self.reclaimable.is_full()
        {
            self.reclaimable.insert(id, thumbnail);
        }
        true
    }

    /// Forget the thumbnail of `state`.
    pub fn cleared_state_thumbnail(&mut self, state: &VtState) {
        state.clear_thumbnail();
        if self
            .current_state
            .as_ref()
            .is_some_and(|current| current.id() == state.id())
        {
            self.current_state_thumbnail = None;
        }
        self.strict.remove(state.id());
        self.reclaimable.remove(state.id());
    }

    /// Drop the reclaimable tier. Thumbnails held nowhere else disappear.
    pub fn release_reclaimable(&mut self) {
        trace!(
            "Releasing reclaimable thumbnails: {:?}",
            self.reclaimable.keys().collect::<Vec<_>>()
        );
        self.reclaimable.clear();
    }

    /// Whether the cache itself keeps `state_id`'s thumbnail alive.
    pub fn thumbnail_retained(&self, state_id: &str) -> bool {
        let pinned = self
            .current_state
            .as_ref()
            .is_some_and(|current| current.id() == state_id)
            && self.current_state_thumbnail.is_some();
        pinned || self.strict.contains(state_id) || self.reclaimable.contains(state_id)
    }

    fn resolve(&mut self, state_id: &str) -> Arc<VtState> {
        self.states_by_id
            .entry(state_id.to_string())
            .or_insert_with(|| Arc::new(VtState::new(state_id, None)))
            .clone()
    }
}
