use serde_json::Value;

use crate::{api, storage};

#[tauri::command]
pub async fn settings_is_configured() -> Result<bool, String> {
    Ok(storage::is_configured())
}

#[tauri::command]
pub async fn settings_get_full_config() -> Result<Value, String> {
    Ok(storage::get_full_config())
}

#[tauri::command]
pub async fn settings_update_credentials(arg0: Option<Value>) -> Result<Value, String> {
    let payload = arg0.ok_or("Missing credentials payload")?;
    storage::update_device_credentials(&payload)
}

#[tauri::command]
pub async fn settings_factory_reset() -> Result<Value, String> {
    storage::factory_reset()
}

/// Round-trip test against the cloud health endpoint with latency.
#[tauri::command]
pub async fn settings_test_connectivity() -> Result<Value, String> {
    let cloud_url = storage::get_credential("cloud_api_url")
        .ok_or("Device not configured: missing cloud URL")?;
    let api_key = storage::get_credential("cloud_api_key")
        .ok_or("Device not configured: missing API key")?;
    let result = api::test_connectivity(&cloud_url, &api_key).await;
    serde_json::to_value(result).map_err(|e| e.to_string())
}
