//! Resident-memory sampler
//!
//! Feeds the memory gauge once a second from `/proc/self/statm`.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::StubMetrics;

/// Sampling interval
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Spawn the background sampler task
pub fn spawn_memory_sampler(metrics: Arc<StubMetrics>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SAMPLE_INTERVAL);
        loop {
            tick.tick().await;
            if let Some(bytes) = resident_bytes() {
                metrics.set_resident_bytes(bytes);
            }
        }
    })
}

/// Resident set size in bytes, when the platform exposes it
pub fn resident_bytes() -> Option<f64> {
    // statm reports pages; assume the common 4 KiB page size
    const PAGE_SIZE: f64 = 4096.0;

    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: f64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident_pages * PAGE_SIZE)
}
