use serde::Deserialize;
use serde_json::Value;

use crate::users::UserRole;
use crate::{auth, commands, users};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserCreatePayload {
    name: String,
    username: String,
    password: String,
    role: UserRole,
    #[serde(default)]
    email: String,
    #[serde(default)]
    phone: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserUpdatePayload {
    #[serde(alias = "userId")]
    id: String,
    #[serde(flatten)]
    fields: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserPasswordPayload {
    #[serde(alias = "userId")]
    id: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserIdPayload {
    #[serde(alias = "userId")]
    id: String,
}

fn require_manage_users(session: &auth::SessionState) -> Result<(), String> {
    if !auth::has_permission(session, "manage_users") {
        return Err("Not authorized to manage personnel".to_string());
    }
    Ok(())
}

#[tauri::command]
pub async fn user_list(session: tauri::State<'_, auth::SessionState>) -> Result<Value, String> {
    require_manage_users(&session)?;
    let store = commands::cloud_store()?;
    let accounts = users::list_users(&store).await?;
    serde_json::to_value(accounts).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn user_create(
    arg0: Option<Value>,
    session: tauri::State<'_, auth::SessionState>,
) -> Result<Value, String> {
    require_manage_users(&session)?;
    let payload: UserCreatePayload = serde_json::from_value(arg0.ok_or("Missing user payload")?)
        .map_err(|e| format!("Invalid user payload: {e}"))?;
    let store = commands::cloud_store()?;
    let id = users::create_user(
        &store,
        &payload.name,
        &payload.username,
        &payload.password,
        payload.role,
        &payload.email,
        &payload.phone,
    )
    .await?;
    Ok(serde_json::json!({ "success": true, "id": id }))
}

#[tauri::command]
pub async fn user_update(
    arg0: Option<Value>,
    session: tauri::State<'_, auth::SessionState>,
) -> Result<Value, String> {
    require_manage_users(&session)?;
    let payload: UserUpdatePayload = serde_json::from_value(arg0.ok_or("Missing user payload")?)
        .map_err(|e| format!("Invalid user payload: {e}"))?;
    let store = commands::cloud_store()?;
    users::update_user(&store, &payload.id, &payload.fields).await?;
    Ok(serde_json::json!({ "success": true }))
}

#[tauri::command]
pub async fn user_set_password(
    arg0: Option<Value>,
    session: tauri::State<'_, auth::SessionState>,
) -> Result<Value, String> {
    require_manage_users(&session)?;
    let payload: UserPasswordPayload = serde_json::from_value(arg0.ok_or("Missing user payload")?)
        .map_err(|e| format!("Invalid user payload: {e}"))?;
    let store = commands::cloud_store()?;
    users::set_password(&store, &payload.id, &payload.password).await?;
    Ok(serde_json::json!({ "success": true }))
}

#[tauri::command]
pub async fn user_delete(
    arg0: Option<Value>,
    session: tauri::State<'_, auth::SessionState>,
) -> Result<Value, String> {
    require_manage_users(&session)?;
    let payload: UserIdPayload = serde_json::from_value(arg0.ok_or("Missing user id")?)
        .map_err(|e| format!("Invalid user payload: {e}"))?;
    let store = commands::cloud_store()?;
    users::delete_user(&store, &payload.id).await?;
    Ok(serde_json::json!({ "success": true }))
}
