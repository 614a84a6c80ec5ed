//! Time helpers.

use chrono::Utc;

/// .NET ticks at 1970-01-01T00:00:00Z.
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// .NET ticks per second (100ns resolution).
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Current unix time in seconds.
pub fn unix_time_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Current unix time in milliseconds.
pub fn unix_time_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert .NET universal ticks to unix seconds.
///
/// veadotube encodes its launch time this way in the instance ID.
pub fn universal_ticks_to_unix_seconds(ticks: i64) -> i64 {
    (ticks - UNIX_EPOCH_TICKS) / TICKS_PER_SECOND
}
