use serde::Deserialize;
use serde_json::Value;

use crate::{auth, commands, inventory};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MaterialCreatePayload {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddStockPayload {
    #[serde(alias = "id")]
    material_id: String,
    quantity: i64,
}

#[tauri::command]
pub async fn inventory_list() -> Result<Value, String> {
    let store = commands::cloud_store()?;
    let materials = inventory::list_materials(&store).await?;
    serde_json::to_value(materials).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn inventory_create_material(
    arg0: Option<Value>,
    session: tauri::State<'_, auth::SessionState>,
) -> Result<Value, String> {
    if !auth::has_permission(&session, "manage_inventory") {
        return Err("Not authorized to manage inventory".to_string());
    }
    let payload: MaterialCreatePayload =
        serde_json::from_value(arg0.ok_or("Missing material payload")?)
            .map_err(|e| format!("Invalid material payload: {e}"))?;
    let store = commands::cloud_store()?;
    let id = inventory::create_material(&store, &payload.name).await?;
    Ok(serde_json::json!({ "success": true, "id": id }))
}

#[tauri::command]
pub async fn inventory_add_stock(
    arg0: Option<Value>,
    session: tauri::State<'_, auth::SessionState>,
) -> Result<Value, String> {
    if !auth::has_permission(&session, "manage_inventory") {
        return Err("Not authorized to manage inventory".to_string());
    }
    let payload: AddStockPayload = serde_json::from_value(arg0.ok_or("Missing stock payload")?)
        .map_err(|e| format!("Invalid stock payload: {e}"))?;
    let store = commands::cloud_store()?;
    inventory::add_stock(&store, &payload.material_id, payload.quantity).await?;
    let stock = inventory::stock_of(&store, &payload.material_id).await?;
    Ok(serde_json::json!({ "success": true, "stock": stock }))
}
