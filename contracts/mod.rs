//! Fault Stub Contracts
//!
//! Shared types for probe outcomes and the collector wire format.

mod wire;

pub use wire::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of a single probe through a fault proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Backend answered promptly
    Up,
    /// Connection or request failed
    Down,
    /// Backend answered, but past the slow threshold
    Slow,
}

/// Backend a probe targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeService {
    /// Cache backend behind the cache proxy
    Redis,
    /// Source-control HTTP backend behind the SCM proxy
    Git,
}

impl ProbeService {
    /// Proxy name on the control API
    pub fn proxy_name(&self) -> &'static str {
        match self {
            ProbeService::Redis => "redis",
            ProbeService::Git => "git",
        }
    }
}

/// Result of one probe invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Correlation id for this probe
    pub request_id: Uuid,

    /// Backend probed
    pub service: ProbeService,

    /// Classified outcome
    pub outcome: ProbeOutcome,

    /// Observed latency in milliseconds
    pub latency_ms: u64,

    /// Error message when the probe failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Probe timestamp
    pub checked_at: DateTime<Utc>,
}

impl ProbeReport {
    /// Create an up report
    pub fn up(service: ProbeService, latency_ms: u64) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            service,
            outcome: ProbeOutcome::Up,
            latency_ms,
            error: None,
            checked_at: Utc::now(),
        }
    }

    /// Create a down report
    pub fn down(service: ProbeService, error: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            service,
            outcome: ProbeOutcome::Down,
            latency_ms: 0,
            error: Some(error.into()),
            checked_at: Utc::now(),
        }
    }

    /// Create a slow report
    pub fn slow(service: ProbeService, latency_ms: u64) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            service,
            outcome: ProbeOutcome::Slow,
            latency_ms,
            error: None,
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_report_constructors() {
        let up = ProbeReport::up(ProbeService::Redis, 12);
        assert_eq!(up.outcome, ProbeOutcome::Up);
        assert_eq!(up.latency_ms, 12);
        assert!(up.error.is_none());

        let down = ProbeReport::down(ProbeService::Git, "connection refused");
        assert_eq!(down.outcome, ProbeOutcome::Down);
        assert_eq!(down.latency_ms, 0);
        assert!(down.error.is_some());

        let slow = ProbeReport::slow(ProbeService::Redis, 950);
        assert_eq!(slow.outcome, ProbeOutcome::Slow);
    }

    #[test]
    fn test_outcome_serialization() {
        assert_eq!(
            serde_json::to_string(&ProbeOutcome::Slow).unwrap(),
            "\"slow\""
        );
        assert_eq!(
            serde_json::to_string(&ProbeService::Git).unwrap(),
            "\"git\""
        );
    }

    #[test]
    fn test_proxy_names() {
        assert_eq!(ProbeService::Redis.proxy_name(), "redis");
        assert_eq!(ProbeService::Git.proxy_name(), "git");
    }
}
