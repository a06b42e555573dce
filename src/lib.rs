//! Fault Stub
//!
//! HTTP harness that simulates a dependent cache and a source-control
//! backend being up, down, or slow through fault-injection proxies,
//! counts each observed outcome, and periodically ships the counters
//! along with synthetic spans and events to a remote collector.
//!
//! # Design Principles
//! - Single attempt per probe: no retries, no backpressure
//! - Outcomes surface through counters and logs, never through the
//!   HTTP status of the stub's own responses
//! - Telemetry emission is fire-and-forget and never blocks a request

pub mod client;
pub mod driver;
pub mod engine;
pub mod handler;
pub mod telemetry;

// Re-export contracts
#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use contracts::*;
