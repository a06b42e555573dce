//! Probe engine
//!
//! Single-attempt probes against the proxied backends plus outcome
//! classification against the slow threshold.

mod probes;

pub use probes::{HttpProbe, TcpProbe};

use crate::contracts::ProbeOutcome;
use std::time::Duration;

/// Elapsed time at or beyond which a successful probe counts as slow
pub const SLOW_THRESHOLD: Duration = Duration::from_millis(900);

/// Latency injected by the slow-simulation toxic
pub const INJECTED_LATENCY_MS: u64 = 1000;

/// Probe errors
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("command failed: {0}")]
    Command(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("client construction failed: {0}")]
    Client(String),
}

/// Classify a probe result: errors are down, fast successes are up,
/// anything at or past [`SLOW_THRESHOLD`] is slow.
pub fn classify<T, E>(result: &Result<T, E>, elapsed: Duration) -> ProbeOutcome {
    if result.is_err() {
        ProbeOutcome::Down
    } else if elapsed < SLOW_THRESHOLD {
        ProbeOutcome::Up
    } else {
        ProbeOutcome::Slow
    }
}
