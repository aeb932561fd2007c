// # Cloudflare DNS Provider
//
// This crate implements `flaresync_core::DnsProvider` on top of the
// Cloudflare API v4.
//
// ## Behavior
//
// - ✅ One HTTP request per trait call
// - ✅ Errors propagated to the engine (the poll interval is the retry policy)
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Status codes mapped to typed errors (401/403, 404, 429, other)
// - ❌ NO retry, backoff or rate limiting (owned by the engine's schedule)
// - ❌ NO identifier caching (owned by `IdentifierCache`)
// - ❌ NO background tasks
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Construction fails fast if the token is empty
//
// ## API Reference
//
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=...&name=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use flaresync_core::traits::{DnsProvider, DnsRecord};
use flaresync_core::{Config, Error, RecordType, Result};
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER_NAME: &str = "cloudflare";

/// Envelope shared by every Cloudflare v4 response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

/// Cloudflare DNS provider
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot. Zone and record identifiers are cached by the
/// engine, never here.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL, overridable for tests
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a provider talking to the public Cloudflare API
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:Read and DNS:Edit permissions
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the token is empty or the HTTP client
    /// cannot be built.
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_token, CLOUDFLARE_API_BASE)
    }

    /// Create a provider against a custom API base URL
    pub fn with_base_url(api_token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Create a provider from the loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.cloudflare_api_token.clone())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.api_token)
    }

    /// Send a request and decode the `result` field of a success response
    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> Result<T> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", action, e)))?;

        if !response.status().is_success() {
            return Err(status_error(response, action).await);
        }

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("Failed to parse {} response: {}", action, e)))?;

        if body.success == Some(false) {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("{} rejected: {}", action, join_messages(&body.errors)),
            ));
        }

        body.result.ok_or_else(|| {
            Error::provider(PROVIDER_NAME, format!("Invalid {} response: missing result", action))
        })
    }
}

/// Map a non-2xx response to a typed error
async fn status_error(response: Response, action: &str) -> Error {
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    let detail = match serde_json::from_str::<ApiResponse<serde_json::Value>>(&text) {
        Ok(body) if !body.errors.is_empty() => join_messages(&body.errors),
        _ => text,
    };

    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid API token or insufficient permissions ({}): {}",
            status, detail
        )),
        404 => Error::not_found(format!("{} failed: {} - {}", action, status, detail)),
        429 => Error::rate_limited(format!("Rate limit exceeded ({}): {}", status, detail)),
        _ => Error::provider(PROVIDER_NAME, format!("{} failed: {} - {}", action, status, detail)),
    }
}

fn join_messages(messages: &[ApiMessage]) -> String {
    messages
        .iter()
        .map(|m| match m.code {
            Some(code) => format!("[{}] {}", code, m.message),
            None => m.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// ```http
    /// GET /zones?name=example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn resolve_zone_id(&self, zone_name: &str) -> Result<String> {
        tracing::debug!("Looking up zone ID for {}", zone_name);

        let url = format!("{}/zones", self.base_url);
        let zones: Vec<IdOnly> = self
            .send(self.client.get(&url).query(&[("name", zone_name)]), "zone lookup")
            .await?;

        let zone = zones
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("zone {:?} not found", zone_name)))?;

        tracing::debug!("Found zone ID for {}: {}", zone_name, zone.id);
        Ok(zone.id)
    }

    /// ```http
    /// GET /zones/:zone_id/dns_records?type=A&name=example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn find_record_id(
        &self,
        zone_id: &str,
        record_type: RecordType,
        fqdn: &str,
    ) -> Result<Option<String>> {
        tracing::debug!("Looking up record ID: {} (type: {})", fqdn, record_type);

        let url = format!("{}/zones/{}/dns_records", self.base_url, zone_id);
        let records: Vec<IdOnly> = self
            .send(
                self.client
                    .get(&url)
                    .query(&[("type", record_type.as_str()), ("name", fqdn)]),
                "record lookup",
            )
            .await?;

        Ok(records.into_iter().next().map(|r| r.id))
    }

    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// {"type": "A", "name": "example.com", "content": "1.2.3.4", "ttl": 1, "proxied": true}
    /// ```
    async fn create_record(&self, zone_id: &str, record: &DnsRecord) -> Result<String> {
        tracing::debug!(
            "Creating {} record {} -> {}",
            record.record_type,
            record.name,
            record.content
        );

        let url = format!("{}/zones/{}/dns_records", self.base_url, zone_id);
        let created: IdOnly = self
            .send(self.client.post(&url).json(record), "create record")
            .await?;

        Ok(created.id)
    }

    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// {"type": "A", "name": "example.com", "content": "1.2.3.4", "ttl": 300, "proxied": false}
    /// ```
    async fn update_record(&self, zone_id: &str, record_id: &str, record: &DnsRecord) -> Result<()> {
        tracing::debug!(
            "Updating {} record {} ({}) -> {}",
            record.record_type,
            record.name,
            record_id,
            record.content
        );

        let url = format!("{}/zones/{}/dns_records/{}", self.base_url, zone_id, record_id);
        let response = self
            .authorized(self.client.put(&url).json(record))
            .send()
            .await
            .map_err(|e| Error::http(format!("update request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error(response, "update").await);
        }

        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "test_token_abcdef";

    async fn provider(server: &MockServer) -> CloudflareProvider {
        CloudflareProvider::with_base_url(TOKEN, server.uri()).unwrap()
    }

    fn ok(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "messages": [],
            "result": result,
        }))
    }

    fn failure(status: u16, code: i64, message: &str) -> ResponseTemplate {
        ResponseTemplate::new(status).set_body_json(json!({
            "success": false,
            "errors": [{ "code": code, "message": message }],
            "messages": [],
            "result": null,
        }))
    }

    #[tokio::test]
    async fn resolve_zone_id_returns_first_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .and(query_param("name", "example.com"))
            .and(header("authorization", "Bearer test_token_abcdef"))
            .respond_with(ok(json!([{ "id": "zone-123", "name": "example.com" }])))
            .expect(1)
            .mount(&server)
            .await;

        let zone_id = provider(&server).await.resolve_zone_id("example.com").await.unwrap();
        assert_eq!(zone_id, "zone-123");
    }

    #[tokio::test]
    async fn resolve_zone_id_with_no_results_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .respond_with(ok(json!([])))
            .mount(&server)
            .await;

        let err = provider(&server).await.resolve_zone_id("missing.example").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn forbidden_maps_to_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .respond_with(failure(403, 9109, "Invalid access token"))
            .mount(&server)
            .await;

        let err = provider(&server).await.resolve_zone_id("example.com").await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)), "got {:?}", err);
        assert!(err.to_string().contains("Invalid access token"));
        assert!(!err.to_string().contains(TOKEN));
    }

    #[tokio::test]
    async fn undecodable_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = provider(&server).await.resolve_zone_id("example.com").await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn find_record_id_queries_type_and_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones/zone-123/dns_records"))
            .and(query_param("type", "AAAA"))
            .and(query_param("name", "home.example.com"))
            .respond_with(ok(json!([{ "id": "rec-1" }, { "id": "rec-2" }])))
            .expect(1)
            .mount(&server)
            .await;

        let id = provider(&server)
            .await
            .find_record_id("zone-123", RecordType::Aaaa, "home.example.com")
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("rec-1"));
    }

    #[tokio::test]
    async fn find_record_id_empty_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones/zone-123/dns_records"))
            .respond_with(ok(json!([])))
            .mount(&server)
            .await;

        let id = provider(&server)
            .await
            .find_record_id("zone-123", RecordType::A, "example.com")
            .await
            .unwrap();
        assert_eq!(id, None);
    }

    #[tokio::test]
    async fn create_record_posts_full_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/zones/zone-123/dns_records"))
            .and(header("authorization", "Bearer test_token_abcdef"))
            .and(body_json(json!({
                "type": "A",
                "name": "example.com",
                "content": "1.2.3.4",
                "ttl": 1,
                "proxied": true,
            })))
            .respond_with(ok(json!({ "id": "rec-new", "name": "example.com" })))
            .expect(1)
            .mount(&server)
            .await;

        let record = DnsRecord::new(RecordType::A, "example.com", "1.2.3.4", true);
        let id = provider(&server).await.create_record("zone-123", &record).await.unwrap();
        assert_eq!(id, "rec-new");
    }

    #[tokio::test]
    async fn create_record_rejection_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/zones/zone-123/dns_records"))
            .respond_with(failure(400, 81057, "Record already exists."))
            .mount(&server)
            .await;

        let record = DnsRecord::new(RecordType::Cname, "www.example.com", "example.com", false);
        let err = provider(&server).await.create_record("zone-123", &record).await.unwrap_err();
        assert!(err.to_string().contains("81057"), "got {}", err);
    }

    #[tokio::test]
    async fn update_record_puts_to_record_path() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/zones/zone-123/dns_records/rec-1"))
            .and(body_json(json!({
                "type": "A",
                "name": "vpn.example.com",
                "content": "5.6.7.8",
                "ttl": 300,
                "proxied": false,
            })))
            .respond_with(ok(json!({ "id": "rec-1" })))
            .expect(1)
            .mount(&server)
            .await;

        let record = DnsRecord::new(RecordType::A, "vpn.example.com", "5.6.7.8", false);
        provider(&server)
            .await
            .update_record("zone-123", "rec-1", &record)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_record_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/zones/zone-123/dns_records/gone"))
            .respond_with(failure(404, 81044, "Record does not exist."))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/zones/zone-123/dns_records/busy"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/zones/zone-123/dns_records/broken"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let provider = provider(&server).await;
        let record = DnsRecord::new(RecordType::A, "example.com", "1.2.3.4", false);

        let err = provider.update_record("zone-123", "gone", &record).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {:?}", err);

        let err = provider.update_record("zone-123", "busy", &record).await.unwrap_err();
        assert!(matches!(err, Error::RateLimited(_)), "got {:?}", err);

        let err = provider.update_record("zone-123", "broken", &record).await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }), "got {:?}", err);
        assert!(err.to_string().contains("bad gateway"));
    }

    #[test]
    fn empty_token_is_rejected() {
        let err = CloudflareProvider::new("").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn api_token_not_exposed_in_debug() {
        let provider = CloudflareProvider::new("secret_token_12345").unwrap();

        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("CloudflareProvider"));
        assert!(debug_str.contains(CLOUDFLARE_API_BASE));
    }

    #[test]
    fn provider_name() {
        let provider = CloudflareProvider::new("token").unwrap();
        assert_eq!(provider.provider_name(), "cloudflare");
    }
}
