//! Wall-clock and uptime helpers

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Record the process start; later calls keep the first instant
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Seconds since `init_server_time`, zero before it
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}
