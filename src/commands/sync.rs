use serde_json::Value;
use std::sync::Arc;
use tauri::Emitter;

use crate::{api, commands, db, offline, sync};

/// Queue depth, last drain time, and whether a drain is in flight. The
/// dashboard polls this when it gains focus to decide whether to show the
/// sync card.
#[tauri::command]
pub async fn sync_get_status(
    db: tauri::State<'_, db::DbState>,
    sync_state: tauri::State<'_, Arc<sync::SyncState>>,
) -> Result<Value, String> {
    let last_sync = sync_state
        .last_sync
        .lock()
        .map(|v| v.clone())
        .unwrap_or(None);
    let mut status = offline::status(&db);
    if let Some(obj) = status.as_object_mut() {
        obj.insert(
            "isSyncing".to_string(),
            serde_json::json!(sync_state
                .is_running
                .load(std::sync::atomic::Ordering::SeqCst)),
        );
        obj.insert("lastSync".to_string(), serde_json::json!(last_sync));
    }
    Ok(status)
}

/// Point-in-time connectivity probe; also feeds the offline banner.
#[tauri::command]
pub async fn sync_get_network_status(app: tauri::AppHandle) -> Result<Value, String> {
    let online = api::check_connectivity().await;
    let status = serde_json::json!({ "isOnline": online });
    let _ = app.emit("network_status", status.clone());
    Ok(status)
}

/// Drain the offline queue: upload every staged report and clear the slot.
/// Manual trigger only — the dashboard shows the button when the device is
/// back online with reports pending.
#[tauri::command]
pub async fn sync_drain(
    db: tauri::State<'_, db::DbState>,
    sync_state: tauri::State<'_, Arc<sync::SyncState>>,
    app: tauri::AppHandle,
) -> Result<Value, String> {
    let store = commands::cloud_store()?;
    let media = commands::media_uploader();

    match sync::drain_pending_reports(&db, &store, &media, &sync_state).await {
        Ok(summary) => {
            let payload = serde_json::to_value(&summary).map_err(|e| e.to_string())?;
            let _ = app.emit("sync_complete", payload.clone());
            Ok(payload)
        }
        Err(e) => {
            let _ = app.emit("sync_error", serde_json::json!({ "error": e }));
            Err(e)
        }
    }
}
