//! Probe implementations
//!
//! One probe type per transport: a TCP probe for the cache backend and an
//! HTTP probe for the source-control backend. Each makes exactly one
//! attempt per invocation.

use super::ProbeError;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// TCP probe against the cache proxy listen address
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Address this probe dials
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Single connection attempt
    pub async fn dial(&self) -> Result<(), ProbeError> {
        TcpStream::connect(&self.addr)
            .await
            .map(|_| ())
            .map_err(|e| ProbeError::Connect(e.to_string()))
    }

    /// Connect and run one inline `PING` round trip, so injected
    /// downstream latency shows up in the elapsed time
    pub async fn ping(&self) -> Result<(), ProbeError> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| ProbeError::Connect(e.to_string()))?;

        stream
            .write_all(b"PING\r\n")
            .await
            .map_err(|e| ProbeError::Command(e.to_string()))?;

        let mut buf = [0u8; 64];
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| ProbeError::Command(e.to_string()))?;

        if n == 0 {
            return Err(ProbeError::Command("connection closed before reply".into()));
        }
        if buf[0] != b'+' {
            return Err(ProbeError::Command(format!(
                "unexpected reply: {}",
                String::from_utf8_lossy(&buf[..n]).trim_end()
            )));
        }

        Ok(())
    }
}

/// HTTP probe against the SCM proxy listen address
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    /// Single GET, returning the response status
    pub async fn fetch(&self, url: &str) -> Result<u16, ProbeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        Ok(response.status().as_u16())
    }
}
