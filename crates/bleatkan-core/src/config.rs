//! Centralized configuration for Bleatkan.
//!
//! Timing and sizing constants for the connection engine, the discovery
//! service and the state cache. Runtime-tunable knobs live on
//! [`DiscoveryOptions`]; everything else is fixed by the wire protocol or by
//! how often veadotube refreshes its descriptor files.

use std::path::PathBuf;
use std::time::Duration;

/// WebSocket connection configuration.
pub struct ConnectionConfig;

impl ConnectionConfig {
    /// Default channel for node requests.
    pub const DEFAULT_CHANNEL: &'static str = "nodes";

    // Reconnect loop
    pub const ERROR_MAX: u32 = 5;
    pub const ERROR_WAIT: Duration = Duration::from_millis(500);

    // Transport
    pub const PING_INTERVAL: Duration = Duration::from_secs(4);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(6);
    pub const CONNECT_ATTEMPTS: u32 = 3;
    pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(12);

    /// Capacity of each receive pipeline stage.
    pub const PIPELINE_CAPACITY: usize = 5;
    /// Capacity of the outbound frame queue.
    pub const OUTBOUND_CAPACITY: usize = 16;
}

/// Instance discovery constants.
pub struct DiscoveryConfig;

impl DiscoveryConfig {
    pub const INSTANCES_DIR: &'static str = ".veadotube/instances";
    pub const READ_TIMEOUT_SECS: i64 = 10;
    pub const READ_LOOP_DELAY_MAX: Duration = Duration::from_millis(3000);
    pub const READ_LOOP_DELAY_MIN: Duration = Duration::from_millis(100);
    /// Shortest server string accepted. ":0" shows up while the server toggles.
    pub const SERVER_MIN_LEN: usize = 4;
}

/// State cache sizing.
pub struct CacheConfig;

impl CacheConfig {
    pub const LRU_HARD_SIZE: usize = 5;
    pub const LRU_SOFT_SIZE: usize = Self::LRU_HARD_SIZE + 5;
}

/// Runtime options for [`InstancesManager`](crate::instance::InstancesManager).
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Directory to watch. `None` resolves to `~/.veadotube/instances`.
    pub directory: Option<PathBuf>,
    /// Descriptors older than this many seconds are stale.
    pub read_timeout_secs: i64,
    /// Target pacing of the directory watcher and the stale sweep.
    pub loop_delay_max: Duration,
    /// Floor of the directory watcher pacing.
    pub loop_delay_min: Duration,
    /// Process files already present in the directory on start.
    pub initial_scan: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            directory: None,
            read_timeout_secs: DiscoveryConfig::READ_TIMEOUT_SECS,
            loop_delay_max: DiscoveryConfig::READ_LOOP_DELAY_MAX,
            loop_delay_min: DiscoveryConfig::READ_LOOP_DELAY_MIN,
            initial_scan: true,
        }
    }
}

impl DiscoveryOptions {
    /// Watch a specific directory instead of the per-user default.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Set the staleness window in seconds.
    pub fn with_read_timeout_secs(mut self, secs: i64) -> Self {
        self.read_timeout_secs = secs;
        self
    }

    /// Set watcher pacing bounds.
    pub fn with_loop_delays(mut self, min: Duration, max: Duration) -> Self {
        self.loop_delay_min = min;
        self.loop_delay_max = max.max(min);
        self
    }

    pub fn with_initial_scan(mut self, initial_scan: bool) -> Self {
        self.initial_scan = initial_scan;
        self
    }
}
