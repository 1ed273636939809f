use serde::Deserialize;
use serde_json::Value;

use crate::{api, auth, catalog, commands, db};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParcelCreatePayload {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParcelDeletePayload {
    #[serde(alias = "parcelId")]
    id: String,
}

/// Load the parcel/material selectors, from the cloud when reachable and
/// from the offline snapshot otherwise.
#[tauri::command]
pub async fn catalog_fetch(db: tauri::State<'_, db::DbState>) -> Result<Value, String> {
    let online = api::check_connectivity().await;
    let store = commands::cloud_store()?;
    let bundle = catalog::fetch_catalogs(&db, &store, online).await?;
    serde_json::to_value(bundle).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn parcel_create(
    arg0: Option<Value>,
    session: tauri::State<'_, auth::SessionState>,
) -> Result<Value, String> {
    if !auth::has_permission(&session, "manage_parcels") {
        return Err("Not authorized to manage parcels".to_string());
    }
    let payload: ParcelCreatePayload = serde_json::from_value(arg0.ok_or("Missing parcel payload")?)
        .map_err(|e| format!("Invalid parcel payload: {e}"))?;
    let store = commands::cloud_store()?;
    let id = catalog::create_parcel(&store, &payload.name).await?;
    Ok(serde_json::json!({ "success": true, "id": id }))
}

#[tauri::command]
pub async fn parcel_delete(
    arg0: Option<Value>,
    session: tauri::State<'_, auth::SessionState>,
) -> Result<Value, String> {
    if !auth::has_permission(&session, "manage_parcels") {
        return Err("Not authorized to manage parcels".to_string());
    }
    let payload: ParcelDeletePayload = serde_json::from_value(arg0.ok_or("Missing parcel id")?)
        .map_err(|e| format!("Invalid parcel payload: {e}"))?;
    let store = commands::cloud_store()?;
    catalog::delete_parcel(&store, &payload.id).await?;
    Ok(serde_json::json!({ "success": true }))
}
