//! Farm cloud API client.
//!
//! Provides authenticated HTTP communication with the farm cloud, which
//! fronts the remote document collections (harvest reports, parcels,
//! materials, calendar events, user accounts). The `RemoteStore` trait is
//! the seam the capture/drain/catalog flows are written against; `CloudStore`
//! is the HTTP implementation and tests substitute an in-memory mock.

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::storage;

/// Default timeout for API requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout used specifically for the lightweight connectivity probe.
const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the cloud base URL:
/// - strip trailing slashes
/// - strip a trailing `/api` segment
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_cloud_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    if url.ends_with("/api") {
        url.truncate(url.len() - 4);
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach farm cloud at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid cloud URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-friendly message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "API key is invalid or expired".to_string(),
        403 => "Device not authorized".to_string(),
        404 => "Cloud endpoint not found".to_string(),
        s if s >= 500 => format!("Farm cloud server error (HTTP {s})"),
        s => format!("Unexpected response from farm cloud (HTTP {s})"),
    }
}

// ---------------------------------------------------------------------------
// Connectivity probe
// ---------------------------------------------------------------------------

/// Result of a connectivity test.
#[derive(serde::Serialize)]
pub struct ConnectivityResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Test connectivity to the farm cloud with a lightweight health-check.
pub async fn test_connectivity(cloud_url: &str, api_key: &str) -> ConnectivityResult {
    let url = normalize_cloud_url(cloud_url);
    let health_url = format!("{url}/api/health");

    let client = match Client::builder().timeout(CONNECTIVITY_TIMEOUT).build() {
        Ok(c) => c,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(format!("Failed to create HTTP client: {e}")),
            };
        }
    };

    let start = Instant::now();

    let resp = match client
        .get(&health_url)
        .header("X-Farm-API-Key", api_key)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(friendly_error(&url, &e)),
            };
        }
    };

    let latency = start.elapsed().as_millis() as u64;
    let status = resp.status();

    if status.is_success() {
        info!(latency_ms = latency, "connectivity probe passed");
        ConnectivityResult {
            success: true,
            latency_ms: Some(latency),
            error: None,
        }
    } else {
        ConnectivityResult {
            success: false,
            latency_ms: Some(latency),
            error: Some(status_error(status)),
        }
    }
}

/// Point-in-time connectivity oracle consulted before catalog loads, report
/// submission, and the queue drain. Any failure (missing credentials,
/// timeout, non-2xx) reads as offline. A `true` here does not guarantee the
/// operations that follow will succeed.
pub async fn check_connectivity() -> bool {
    let cloud_url = match storage::get_credential("cloud_api_url") {
        Some(url) => url,
        None => return false,
    };
    let api_key = match storage::get_credential("cloud_api_key") {
        Some(k) => k,
        None => return false,
    };

    let base = normalize_cloud_url(&cloud_url);
    let health_url = format!("{base}/api/health");

    let client = match Client::builder().timeout(CONNECTIVITY_TIMEOUT).build() {
        Ok(c) => c,
        Err(_) => return false,
    };

    match client
        .head(&health_url)
        .header("X-Farm-API-Key", &api_key)
        .send()
        .await
    {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Generic authenticated fetch
// ---------------------------------------------------------------------------

/// Perform an authenticated HTTP request against the farm cloud.
///
/// `path` should include the leading slash, e.g. `/api/farm/materials`.
/// `method` is an HTTP verb string: "GET", "POST", "PATCH", "DELETE".
pub async fn fetch_from_cloud(
    cloud_url: &str,
    api_key: &str,
    path: &str,
    method: &str,
    body: Option<Value>,
) -> Result<Value, String> {
    let base = normalize_cloud_url(cloud_url);
    let full_url = format!("{base}{path}");

    let http_method: Method = method
        .to_uppercase()
        .parse()
        .map_err(|_| format!("Invalid HTTP method: {method}"))?;

    let client = Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

    let mut req = client
        .request(http_method, &full_url)
        .header("X-Farm-API-Key", api_key)
        .header("Content-Type", "application/json");

    if let Some(b) = body {
        req = req.json(&b);
    }

    let resp = req.send().await.map_err(|e| friendly_error(&base, &e))?;
    let status = resp.status();

    if !status.is_success() {
        let body_text = resp.text().await.unwrap_or_default();
        let detail = if let Ok(json) = serde_json::from_str::<Value>(&body_text) {
            let message = json
                .get("error")
                .or_else(|| json.get("message"))
                .and_then(Value::as_str)
                .map(|s| s.to_string())
                .unwrap_or_else(|| status_error(status));
            format!("{message} (HTTP {})", status.as_u16())
        } else if !body_text.trim().is_empty() {
            format!(
                "{} (HTTP {}): {}",
                status_error(status),
                status.as_u16(),
                body_text.trim()
            )
        } else {
            format!("{} (HTTP {})", status_error(status), status.as_u16())
        };
        warn!(path, status = status.as_u16(), "cloud request failed");
        return Err(detail);
    }

    let body_text = resp.text().await.unwrap_or_default();
    if body_text.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body_text).map_err(|e| format!("Invalid JSON from farm cloud: {e}"))
}

// ---------------------------------------------------------------------------
// Remote document store
// ---------------------------------------------------------------------------

/// The remote document-store contract the flows are written against:
/// collection-scoped create, ordered list, point read/update/delete, and an
/// atomic numeric field increment. Documents are JSON records with a
/// store-assigned identifier.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Create a document; returns the store-assigned id.
    async fn create_document(&self, collection: &str, doc: &Value) -> Result<String, String>;

    /// List a collection ordered by `order_by` (ascending unless
    /// `descending`), optionally limited.
    async fn list_documents(
        &self,
        collection: &str,
        order_by: &str,
        descending: bool,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, String>;

    /// Point read of a single document.
    async fn get_document(&self, collection: &str, id: &str) -> Result<Value, String>;

    /// Partial update of a single document.
    async fn update_document(&self, collection: &str, id: &str, patch: &Value)
        -> Result<(), String>;

    /// Delete a single document.
    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), String>;

    /// Atomically add `delta` (may be negative) to a numeric field. The
    /// store applies no lower bound; counters may go negative.
    async fn increment_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), String>;
}

/// HTTP-backed `RemoteStore` against the farm cloud collections API.
pub struct CloudStore {
    cloud_url: String,
    api_key: String,
}

impl CloudStore {
    /// Build a store from the device credentials in the OS keyring.
    pub fn from_credentials() -> Result<Self, String> {
        let cloud_url = storage::get_credential("cloud_api_url")
            .ok_or("Device not configured: missing cloud URL")?;
        let api_key = storage::get_credential("cloud_api_key")
            .ok_or("Device not configured: missing API key")?;
        Ok(Self { cloud_url, api_key })
    }
}

impl RemoteStore for CloudStore {
    async fn create_document(&self, collection: &str, doc: &Value) -> Result<String, String> {
        let path = format!("/api/farm/{collection}");
        let resp = fetch_from_cloud(&self.cloud_url, &self.api_key, &path, "POST", Some(doc.clone()))
            .await?;
        resp.get("id")
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .ok_or_else(|| format!("Cloud response for {collection} create is missing an id"))
    }

    async fn list_documents(
        &self,
        collection: &str,
        order_by: &str,
        descending: bool,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, String> {
        let order = if descending { "desc" } else { "asc" };
        let mut path = format!("/api/farm/{collection}?orderBy={order_by}&order={order}");
        if let Some(n) = limit {
            path.push_str(&format!("&limit={n}"));
        }
        let resp = fetch_from_cloud(&self.cloud_url, &self.api_key, &path, "GET", None).await?;
        resp.get("documents")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| format!("Cloud response for {collection} list is missing documents"))
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Value, String> {
        let path = format!("/api/farm/{collection}/{id}");
        fetch_from_cloud(&self.cloud_url, &self.api_key, &path, "GET", None).await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        patch: &Value,
    ) -> Result<(), String> {
        let path = format!("/api/farm/{collection}/{id}");
        fetch_from_cloud(
            &self.cloud_url,
            &self.api_key,
            &path,
            "PATCH",
            Some(patch.clone()),
        )
        .await?;
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), String> {
        let path = format!("/api/farm/{collection}/{id}");
        fetch_from_cloud(&self.cloud_url, &self.api_key, &path, "DELETE", None).await?;
        Ok(())
    }

    async fn increment_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), String> {
        let path = format!("/api/farm/{collection}/{id}/increment");
        fetch_from_cloud(
            &self.cloud_url,
            &self.api_key,
            &path,
            "POST",
            Some(serde_json::json!({ "field": field, "delta": delta })),
        )
        .await?;
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_cloud_url() {
        assert_eq!(
            normalize_cloud_url("farm.example.com"),
            "https://farm.example.com"
        );
        assert_eq!(
            normalize_cloud_url("https://farm.example.com/"),
            "https://farm.example.com"
        );
        assert_eq!(
            normalize_cloud_url("https://farm.example.com/api/"),
            "https://farm.example.com"
        );
        assert_eq!(normalize_cloud_url("localhost:3000"), "http://localhost:3000");
        assert_eq!(
            normalize_cloud_url("  https://farm.example.com///  "),
            "https://farm.example.com"
        );
    }

    #[test]
    fn test_status_error_messages() {
        assert_eq!(
            status_error(StatusCode::UNAUTHORIZED),
            "API key is invalid or expired"
        );
        assert_eq!(status_error(StatusCode::FORBIDDEN), "Device not authorized");
        assert!(status_error(StatusCode::BAD_GATEWAY).contains("502"));
    }
}
