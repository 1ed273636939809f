use serde_json::Value;

#[tauri::command]
pub async fn app_get_version() -> Result<Value, String> {
    Ok(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
