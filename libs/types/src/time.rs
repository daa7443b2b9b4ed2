//! Wall-clock helpers

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in nanoseconds.
pub fn unix_now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
