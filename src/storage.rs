//! Device credential storage using the OS credential store.
//!
//! The cloud API key and media-upload settings never touch the SQLite file;
//! they live in the platform keychain (DPAPI on Windows, Keychain on
//! macOS/iOS, Secret Service on Linux) via the `keyring` crate.

use keyring::Entry;
use serde_json::Value;
use tracing::{info, warn};

const SERVICE_NAME: &str = "berrytrack";

// Credential keys
const KEY_CLOUD_URL: &str = "cloud_api_url";
const KEY_CLOUD_API_KEY: &str = "cloud_api_key";
const KEY_MEDIA_UPLOAD_URL: &str = "media_upload_url";
const KEY_MEDIA_UPLOAD_PRESET: &str = "media_upload_preset";

/// All credential keys managed by this module.
const ALL_KEYS: &[&str] = &[
    KEY_CLOUD_URL,
    KEY_CLOUD_API_KEY,
    KEY_MEDIA_UPLOAD_URL,
    KEY_MEDIA_UPLOAD_PRESET,
];

// ---------------------------------------------------------------------------
// Low-level helpers
// ---------------------------------------------------------------------------

/// Retrieve a single credential from the OS keyring. Returns `None` when the
/// entry does not exist (or the platform returns a "not found" error).
pub fn get_credential(key: &str) -> Option<String> {
    let entry = match Entry::new(SERVICE_NAME, key) {
        Ok(e) => e,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to create entry");
            return None;
        }
    };
    match entry.get_password() {
        Ok(pw) => Some(pw),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to read credential");
            None
        }
    }
}

/// Store a credential in the OS keyring.
pub fn set_credential(key: &str, value: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    entry.set_password(value).map_err(|e| e.to_string())?;
    Ok(())
}

/// Delete a credential from the OS keyring. Silently succeeds if the entry
/// does not exist.
pub fn delete_credential(key: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

pub fn has_credential(key: &str) -> bool {
    get_credential(key).is_some()
}

// ---------------------------------------------------------------------------
// High-level API
// ---------------------------------------------------------------------------

/// The device is considered configured when the cloud URL and API key are
/// both present in the credential store.
pub fn is_configured() -> bool {
    has_credential(KEY_CLOUD_URL) && has_credential(KEY_CLOUD_API_KEY)
}

/// Return all stored device config as a JSON value that matches the shape
/// the frontend expects. The API key is masked.
pub fn get_full_config() -> Value {
    serde_json::json!({
        "cloud_url":           get_credential(KEY_CLOUD_URL),
        "cloud_api_key_set":   has_credential(KEY_CLOUD_API_KEY),
        "media_upload_url":    get_credential(KEY_MEDIA_UPLOAD_URL),
        "media_upload_preset": get_credential(KEY_MEDIA_UPLOAD_PRESET),
    })
}

/// Store device credentials received during onboarding.
///
/// Expected JSON shape (camelCase, as the frontend sends it):
/// ```json
/// {
///   "cloudUrl": "...",
///   "apiKey": "...",
///   "mediaUploadUrl": "...",   // optional
///   "mediaUploadPreset": "..." // optional
/// }
/// ```
pub fn update_device_credentials(payload: &Value) -> Result<Value, String> {
    let cloud_url = payload
        .get("cloudUrl")
        .or_else(|| payload.get("cloud_url"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or("Missing required field: cloudUrl")?;
    let api_key = payload
        .get("apiKey")
        .or_else(|| payload.get("cloud_api_key"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or("Missing required field: apiKey")?;

    let normalized = crate::api::normalize_cloud_url(cloud_url);
    if normalized.trim().is_empty() {
        return Err("Invalid cloud URL".to_string());
    }
    set_credential(KEY_CLOUD_URL, normalized.trim())?;
    set_credential(KEY_CLOUD_API_KEY, api_key)?;

    if let Some(url) = payload
        .get("mediaUploadUrl")
        .or_else(|| payload.get("media_upload_url"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        set_credential(KEY_MEDIA_UPLOAD_URL, url)?;
    }
    if let Some(preset) = payload
        .get("mediaUploadPreset")
        .or_else(|| payload.get("media_upload_preset"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        set_credential(KEY_MEDIA_UPLOAD_PRESET, preset)?;
    }

    info!("device credentials updated");
    Ok(serde_json::json!({ "success": true }))
}

/// Delete every stored credential (factory reset).
pub fn factory_reset() -> Result<Value, String> {
    info!("performing factory reset - deleting all credentials");
    for key in ALL_KEYS {
        delete_credential(key)?;
    }
    Ok(serde_json::json!({ "success": true }))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    // These tests hit the real OS keyring, so they are serialized and clean
    // up after themselves.

    #[test]
    #[serial]
    fn test_credential_roundtrip() {
        let key = "test_roundtrip_credential";
        if set_credential(key, "probe").is_err() {
            // No credential service in this environment (headless CI)
            return;
        }
        delete_credential(key).expect("pre-clean");

        assert_eq!(get_credential(key), None);
        set_credential(key, "value-1").expect("set");
        assert_eq!(get_credential(key).as_deref(), Some("value-1"));
        set_credential(key, "value-2").expect("overwrite");
        assert_eq!(get_credential(key).as_deref(), Some("value-2"));

        delete_credential(key).expect("delete");
        assert_eq!(get_credential(key), None);
        // Deleting a missing entry is not an error
        delete_credential(key).expect("delete again");
    }

    #[test]
    #[serial]
    fn test_update_device_credentials_requires_fields() {
        let missing_key = serde_json::json!({ "cloudUrl": "https://farm.example.com" });
        assert!(update_device_credentials(&missing_key).is_err());

        let missing_url = serde_json::json!({ "apiKey": "k-123" });
        assert!(update_device_credentials(&missing_url).is_err());
    }
}
