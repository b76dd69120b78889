//! Time utilities

use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Current Unix timestamp in seconds, used to stamp scanned records
///
/// Returns 0 if the system clock is before the epoch rather than panicking.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| {
            warn!("System time is before UNIX epoch, stamping record with 0");
            std::time::Duration::from_secs(0)
        })
        .as_secs()
}
