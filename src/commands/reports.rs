use serde_json::Value;
use tauri::Manager;

use crate::reports::CaptureForm;
use crate::{api, commands, db, reports, yield_report};

/// Submit a capture-form report: straight to the cloud when connected,
/// staged in the offline queue otherwise.
#[tauri::command]
pub async fn report_submit(
    arg0: Option<Value>,
    db: tauri::State<'_, db::DbState>,
) -> Result<Value, String> {
    let form: CaptureForm = serde_json::from_value(arg0.ok_or("Missing report payload")?)
        .map_err(|e| format!("Invalid report payload: {e}"))?;

    let online = api::check_connectivity().await;
    let store = commands::cloud_store()?;
    let media = commands::media_uploader();
    reports::submit_report(&db, &store, &media, online, &form).await
}

/// Most recent harvest reports for the dashboard.
#[tauri::command]
pub async fn reports_recent(arg0: Option<Value>) -> Result<Value, String> {
    let limit = arg0
        .as_ref()
        .and_then(|v| {
            v.as_u64()
                .or_else(|| v.get("limit").and_then(Value::as_u64))
        })
        .unwrap_or(2) as usize;
    let store = commands::cloud_store()?;
    let recent = reports::fetch_recent(&store, limit).await?;
    serde_json::to_value(recent).map_err(|e| e.to_string())
}

/// Aggregated yield data for the performance screen's charts.
#[tauri::command]
pub async fn yield_get_summary() -> Result<Value, String> {
    let store = commands::cloud_store()?;
    let reports = reports::fetch_all(&store).await?;
    let summary = yield_report::summarize(&reports);
    serde_json::to_value(summary).map_err(|e| e.to_string())
}

/// Build the printable report document and return its path for the print
/// service.
#[tauri::command]
pub async fn yield_export_html(app: tauri::AppHandle) -> Result<Value, String> {
    let out_dir = app
        .path()
        .app_data_dir()
        .map_err(|e| format!("app data dir: {e}"))?
        .join("exports");
    let store = commands::cloud_store()?;
    let path = yield_report::export_html(&store, &out_dir).await?;
    Ok(serde_json::json!({
        "success": true,
        "path": path.to_string_lossy(),
    }))
}
