use serde::Deserialize;
use serde_json::Value;

use crate::{auth, commands};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginPayload {
    username: String,
    password: String,
}

#[tauri::command]
pub async fn auth_login(
    arg0: Option<Value>,
    session: tauri::State<'_, auth::SessionState>,
) -> Result<Value, String> {
    let payload: LoginPayload = serde_json::from_value(arg0.ok_or("Missing login payload")?)
        .map_err(|e| format!("Invalid login payload: {e}"))?;
    let store = commands::cloud_store()?;
    auth::login(&session, &store, &payload.username, &payload.password).await
}

#[tauri::command]
pub async fn auth_logout(session: tauri::State<'_, auth::SessionState>) -> Result<Value, String> {
    Ok(auth::logout(&session))
}

#[tauri::command]
pub async fn auth_get_current_session(
    session: tauri::State<'_, auth::SessionState>,
) -> Result<Value, String> {
    Ok(auth::current_session(&session))
}

#[tauri::command]
pub async fn auth_has_permission(
    arg0: Option<Value>,
    session: tauri::State<'_, auth::SessionState>,
) -> Result<bool, String> {
    let permission = arg0
        .as_ref()
        .and_then(|v| {
            v.as_str()
                .map(str::to_string)
                .or_else(|| v.get("permission").and_then(Value::as_str).map(str::to_string))
        })
        .ok_or("Missing permission name")?;
    Ok(auth::has_permission(&session, &permission))
}

#[tauri::command]
pub async fn auth_track_activity(
    session: tauri::State<'_, auth::SessionState>,
) -> Result<(), String> {
    auth::track_activity(&session);
    Ok(())
}
