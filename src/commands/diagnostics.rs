use serde_json::Value;
use tauri::Manager;

use crate::{db, diagnostics};

#[tauri::command]
pub async fn diagnostics_get_about() -> Result<Value, String> {
    Ok(diagnostics::get_about_info())
}

#[tauri::command]
pub async fn diagnostics_get_system_health(
    db: tauri::State<'_, db::DbState>,
) -> Result<Value, String> {
    diagnostics::get_system_health(&db)
}

/// Package logs and drain history into a zip under the app data dir.
#[tauri::command]
pub async fn diagnostics_export(
    db: tauri::State<'_, db::DbState>,
    app: tauri::AppHandle,
) -> Result<Value, String> {
    let out_dir = app
        .path()
        .app_data_dir()
        .map_err(|e| format!("app data dir: {e}"))?
        .join("diagnostics");
    let path = diagnostics::export_diagnostics(&db, &out_dir)?;
    Ok(serde_json::json!({ "success": true, "path": path }))
}
