//! Clients for external control surfaces
//!
//! Currently only the toxiproxy control API.

pub mod toxiproxy;

pub use toxiproxy::{Proxy, ProxyDescriptor, ProxyError, Toxic, ToxiproxyClient};
