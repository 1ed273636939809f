use serde::Deserialize;
use serde_json::Value;

use crate::events::EventStatus;
use crate::{api, commands, db, events};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventCreatePayload {
    title: String,
    #[serde(default)]
    description: String,
    date: String,
    #[serde(default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventIdPayload {
    #[serde(alias = "eventId")]
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventCyclePayload {
    #[serde(alias = "eventId")]
    id: String,
    status: EventStatus,
}

#[tauri::command]
pub async fn events_fetch(db: tauri::State<'_, db::DbState>) -> Result<Value, String> {
    let online = api::check_connectivity().await;
    let store = commands::cloud_store()?;
    let bundle = events::fetch_events(&db, &store, online).await?;
    serde_json::to_value(bundle).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn event_create(arg0: Option<Value>) -> Result<Value, String> {
    let payload: EventCreatePayload = serde_json::from_value(arg0.ok_or("Missing event payload")?)
        .map_err(|e| format!("Invalid event payload: {e}"))?;
    let store = commands::cloud_store()?;
    let id = events::create_event(
        &store,
        &payload.title,
        &payload.description,
        &payload.date,
        payload.kind.as_deref().unwrap_or("other"),
    )
    .await?;
    Ok(serde_json::json!({ "success": true, "id": id }))
}

#[tauri::command]
pub async fn event_delete(arg0: Option<Value>) -> Result<Value, String> {
    let payload: EventIdPayload = serde_json::from_value(arg0.ok_or("Missing event id")?)
        .map_err(|e| format!("Invalid event payload: {e}"))?;
    let store = commands::cloud_store()?;
    events::delete_event(&store, &payload.id).await?;
    Ok(serde_json::json!({ "success": true }))
}

#[tauri::command]
pub async fn event_cycle_status(arg0: Option<Value>) -> Result<Value, String> {
    let payload: EventCyclePayload = serde_json::from_value(arg0.ok_or("Missing event payload")?)
        .map_err(|e| format!("Invalid event payload: {e}"))?;
    let store = commands::cloud_store()?;
    let next = events::cycle_event_status(&store, &payload.id, payload.status).await?;
    Ok(serde_json::json!({ "success": true, "status": next }))
}
