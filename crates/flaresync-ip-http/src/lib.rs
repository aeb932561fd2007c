// # HTTP IP Source
//
// This crate provides the HTTP-based public IP lookup for flaresync.
//
// ## Architecture
//
// One GET per cycle against a plain-text "what is my IP" service
// (e.g. ipv4.icanhazip.com, api.ipify.org). The trimmed body is returned as
// is; the engine treats it as an opaque value for change detection and as the
// content of address records.
//
// ## Behavior
//
// - ✅ Single-shot: no polling, no caching, no background task
// - ✅ Response body capped at 64 bytes
// - ✅ HTTP timeout configured (10 seconds)
// - ❌ NO IP syntax validation
// - ❌ NO failover between services

use async_trait::async_trait;
use flaresync_core::traits::IpSource;
use flaresync_core::{Config, Error, Result};
use std::time::Duration;

/// Maximum number of body bytes read from the IP service
pub const MAX_BODY_BYTES: usize = 64;

/// Default HTTP timeout for IP lookups (10 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-based public IP source
#[derive(Debug)]
pub struct HttpIpSource {
    /// URL to fetch the IP from
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a new HTTP IP source
    ///
    /// # Parameters
    ///
    /// - `url`: full URL of the service (e.g., "https://ipv4.icanhazip.com")
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::config("IP provider URL cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { url, client })
    }

    /// Create from the loaded configuration (`ip_provider` host or URL)
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.ip_provider_url())
    }

    /// URL this source queries
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl IpSource for HttpIpSource {
    async fn fetch_ip(&self) -> Result<String> {
        let mut response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::ip_source(format!("Request to {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(Error::ip_source(format!(
                "{} returned HTTP {}",
                self.url,
                response.status()
            )));
        }

        let mut body = Vec::with_capacity(MAX_BODY_BYTES);
        while body.len() < MAX_BODY_BYTES {
            let chunk = response
                .chunk()
                .await
                .map_err(|e| Error::ip_source(format!("Failed to read response: {}", e)))?;
            match chunk {
                Some(bytes) => {
                    let take = bytes.len().min(MAX_BODY_BYTES - body.len());
                    body.extend_from_slice(&bytes[..take]);
                }
                None => break,
            }
        }

        let ip = String::from_utf8_lossy(&body).trim().to_string();
        if ip.is_empty() {
            return Err(Error::ip_source(format!("{} returned an empty body", self.url)));
        }

        tracing::debug!("Fetched public IP {} from {}", ip, self.url);
        Ok(ip)
    }

    fn source_name(&self) -> &str {
        "http"
    }
}
