//! Photo upload to the hosted media service.
//!
//! Harvest evidence photos are posted as multipart form data (file plus an
//! upload-profile identifier); the service answers with a JSON body carrying
//! the publicly resolvable URL. `MediaUploader` is the seam the capture and
//! drain flows use so tests can substitute a mock host.

use reqwest::multipart;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use crate::storage;

/// Uploads take longer than API calls on rural connections.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Media host contract: take a device-local photo path, return a public URL.
#[allow(async_fn_in_trait)]
pub trait MediaUploader {
    async fn upload_photo(&self, local_path: &str) -> Result<String, String>;
}

/// HTTP implementation against the configured media upload endpoint.
pub struct MediaHost {
    upload_url: String,
    upload_preset: String,
}

impl MediaHost {
    /// Build an uploader from the device credentials in the OS keyring.
    pub fn from_credentials() -> Result<Self, String> {
        let upload_url = storage::get_credential("media_upload_url")
            .ok_or("Device not configured: missing media upload URL")?;
        let upload_preset = storage::get_credential("media_upload_preset")
            .ok_or("Device not configured: missing media upload preset")?;
        Ok(Self {
            upload_url,
            upload_preset,
        })
    }
}

/// Stand-in used when the media host is not configured. Every upload fails,
/// which the capture and drain flows already tolerate by saving the report
/// with an empty media reference.
pub struct NullMediaUploader;

impl MediaUploader for NullMediaUploader {
    async fn upload_photo(&self, _local_path: &str) -> Result<String, String> {
        Err("Media host is not configured".to_string())
    }
}

impl MediaUploader for MediaHost {
    async fn upload_photo(&self, local_path: &str) -> Result<String, String> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|e| format!("Cannot read photo {local_path}: {e}"))?;

        let file_name = std::path::Path::new(local_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.jpg")
            .to_string();

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")
            .map_err(|e| format!("multipart part: {e}"))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());

        let client = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

        let resp = client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("Photo upload failed: {e}"))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| format!("Invalid JSON from media host: {e}"))?;

        if !status.is_success() {
            let detail = body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("upload rejected");
            warn!(status = status.as_u16(), detail, "media host rejected upload");
            return Err(format!("Photo upload failed (HTTP {}): {detail}", status.as_u16()));
        }

        body.get("secure_url")
            .or_else(|| body.get("url"))
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .ok_or_else(|| "Media host response is missing a URL".to_string())
    }
}
