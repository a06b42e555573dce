//! toxiproxy control API client
//!
//! Drives the fault-injection proxies over the toxiproxy v2 HTTP API:
//! proxy creation, enable/disable toggling, and latency toxics. The stub
//! holds one [`Proxy`] handle per fronted backend; the proxies themselves
//! live in the external toxiproxy process.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default control endpoint of the local toxiproxy daemon
pub const DEFAULT_CONTROL_URL: &str = "http://localhost:8474";

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("control API request failed: {0}")]
    Http(String),

    #[error("control API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse control API response: {0}")]
    Parse(String),
}

/// Proxy document as the control API represents it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyDescriptor {
    pub name: String,

    /// Address the proxy accepts connections on; assigned by the control
    /// API when created empty
    pub listen: String,

    /// Address the proxy forwards to
    pub upstream: String,

    pub enabled: bool,

    #[serde(default)]
    pub toxics: Vec<Toxic>,
}

/// Injected network fault applied to a proxy connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toxic {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: String,

    /// "upstream" or "downstream"
    pub stream: String,

    pub toxicity: f32,

    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// HTTP client for the toxiproxy control API
#[derive(Debug, Clone)]
pub struct ToxiproxyClient {
    base_url: String,
    client: reqwest::Client,
}

impl ToxiproxyClient {
    /// Create a client against the given control endpoint
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| ProxyError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    /// Create a proxy; an empty `listen` lets the control API assign one
    pub async fn create_proxy(
        &self,
        name: &str,
        listen: &str,
        upstream: &str,
    ) -> Result<Proxy, ProxyError> {
        let url = format!("{}/proxies", self.base_url);
        let body = serde_json::json!({
            "name": name,
            "listen": listen,
            "upstream": upstream,
            "enabled": true,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProxyError::Http(e.to_string()))?;

        let descriptor = read_descriptor(response).await?;
        Ok(Proxy {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            name: descriptor.name.clone(),
            listen: descriptor.listen.clone(),
        })
    }

    /// Fetch an existing proxy by name
    pub async fn proxy(&self, name: &str) -> Result<Proxy, ProxyError> {
        let url = format!("{}/proxies/{}", self.base_url, name);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProxyError::Http(e.to_string()))?;

        let descriptor = read_descriptor(response).await?;
        Ok(Proxy {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            name: descriptor.name.clone(),
            listen: descriptor.listen.clone(),
        })
    }

    /// Re-enable every proxy and remove all toxics
    pub async fn reset(&self) -> Result<(), ProxyError> {
        let url = format!("{}/reset", self.base_url);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| ProxyError::Http(e.to_string()))?;

        expect_success(response).await
    }
}

/// Handle to one proxy on the control API
#[derive(Debug, Clone)]
pub struct Proxy {
    client: reqwest::Client,
    base_url: String,
    name: String,
    listen: String,
}

impl Proxy {
    /// Proxy name on the control API
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address the proxy accepts connections on
    pub fn listen(&self) -> &str {
        &self.listen
    }

    /// Stop accepting connections; simulates the backend being down
    pub async fn disable(&self) -> Result<(), ProxyError> {
        self.set_enabled(false).await
    }

    /// Resume accepting connections
    pub async fn enable(&self) -> Result<(), ProxyError> {
        self.set_enabled(true).await
    }

    async fn set_enabled(&self, enabled: bool) -> Result<(), ProxyError> {
        let url = format!("{}/proxies/{}", self.base_url, self.name);
        let body = serde_json::json!({ "enabled": enabled });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProxyError::Http(e.to_string()))?;

        expect_success(response).await
    }

    /// Add a toxic to this proxy
    pub async fn add_toxic(
        &self,
        name: &str,
        kind: &str,
        stream: &str,
        toxicity: f32,
        attributes: HashMap<String, serde_json::Value>,
    ) -> Result<Toxic, ProxyError> {
        let url = format!("{}/proxies/{}/toxics", self.base_url, self.name);
        let body = Toxic {
            name: name.to_string(),
            kind: kind.to_string(),
            stream: stream.to_string(),
            toxicity,
            attributes,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProxyError::Http(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| ProxyError::Parse(e.to_string()))
        } else {
            Err(api_error(status, response).await)
        }
    }

    /// Add a downstream latency toxic of the given delay
    pub async fn add_latency_toxic(&self, name: &str, latency_ms: u64) -> Result<Toxic, ProxyError> {
        let attributes = [("latency".to_string(), latency_ms.into())]
            .into_iter()
            .collect();
        self.add_toxic(name, "latency", "downstream", 1.0, attributes)
            .await
    }

    /// Remove a toxic by name
    pub async fn remove_toxic(&self, toxic_name: &str) -> Result<(), ProxyError> {
        let url = format!(
            "{}/proxies/{}/toxics/{}",
            self.base_url, self.name, toxic_name
        );

        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| ProxyError::Http(e.to_string()))?;

        expect_success(response).await
    }

    /// Delete this proxy from the control API
    pub async fn delete(self) -> Result<(), ProxyError> {
        let url = format!("{}/proxies/{}", self.base_url, self.name);

        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| ProxyError::Http(e.to_string()))?;

        expect_success(response).await
    }
}

async fn read_descriptor(response: reqwest::Response) -> Result<ProxyDescriptor, ProxyError> {
    let status = response.status();
    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| ProxyError::Parse(e.to_string()))
    } else {
        Err(api_error(status, response).await)
    }
}

async fn expect_success(response: reqwest::Response) -> Result<(), ProxyError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(api_error(status, response).await)
    }
}

async fn api_error(status: StatusCode, response: reqwest::Response) -> ProxyError {
    let message = response.text().await.unwrap_or_default();
    ProxyError::Api {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_deserialization() {
        let json = r#"{
            "name": "redis",
            "listen": "127.0.0.1:7379",
            "upstream": "127.0.0.1:6379",
            "enabled": true,
            "toxics": [
                {
                    "name": "latency_downstream",
                    "type": "latency",
                    "stream": "downstream",
                    "toxicity": 1.0,
                    "attributes": {"latency": 1000}
                }
            ]
        }"#;

        let descriptor: ProxyDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.name, "redis");
        assert_eq!(descriptor.listen, "127.0.0.1:7379");
        assert!(descriptor.enabled);
        assert_eq!(descriptor.toxics.len(), 1);
        assert_eq!(descriptor.toxics[0].kind, "latency");
    }

    #[test]
    fn test_descriptor_without_toxics_field() {
        let json = r#"{
            "name": "git",
            "listen": "127.0.0.1:26379",
            "upstream": "github.com:80",
            "enabled": false
        }"#;

        let descriptor: ProxyDescriptor = serde_json::from_str(json).unwrap();
        assert!(descriptor.toxics.is_empty());
        assert!(!descriptor.enabled);
    }

    #[test]
    fn test_toxic_serialization_uses_type_key() {
        let toxic = Toxic {
            name: "latency_downstream".to_string(),
            kind: "latency".to_string(),
            stream: "downstream".to_string(),
            toxicity: 1.0,
            attributes: [("latency".to_string(), 1000u64.into())]
                .into_iter()
                .collect(),
        };

        let json = serde_json::to_value(&toxic).unwrap();
        assert_eq!(json["type"], "latency");
        assert_eq!(json["attributes"]["latency"], 1000);
    }
}
