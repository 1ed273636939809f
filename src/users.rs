//! Personnel accounts.
//!
//! User accounts live in the remote `users` collection. Passwords are
//! bcrypt-hashed at creation and the hash never leaves the backend; the
//! frontend only ever sees the profile fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::api::RemoteStore;

pub const USERS_COLLECTION: &str = "users";

/// Access level of an account. Mirrors who sees which dashboard cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Associate,
    Recorder,
    Guest,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Associate => "associate",
            UserRole::Recorder => "recorder",
            UserRole::Guest => "guest",
        }
    }
}

/// A personnel account as stored in the cloud. The password hash
/// deserializes from remote documents but is never serialized back out to
/// the frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: String,
    pub name: String,
    pub username: String,
    pub role: UserRole,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, skip_serializing)]
    pub password_hash: String,
    #[serde(default)]
    pub registered_at: String,
}

fn decode_users(docs: Vec<Value>) -> Vec<UserAccount> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value::<UserAccount>(doc) {
            Ok(u) if !u.id.is_empty() && !u.username.trim().is_empty() => Some(u),
            Ok(u) => {
                warn!(id = %u.id, "dropping user document with empty fields");
                None
            }
            Err(e) => {
                warn!("dropping malformed user document: {e}");
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// All accounts, ordered by name.
pub async fn list_users<R: RemoteStore>(store: &R) -> Result<Vec<UserAccount>, String> {
    let docs = store
        .list_documents(USERS_COLLECTION, "name", false, None)
        .await?;
    Ok(decode_users(docs))
}

/// Look an account up by username (login helper).
pub async fn find_by_username<R: RemoteStore>(
    store: &R,
    username: &str,
) -> Result<Option<UserAccount>, String> {
    let username = username.trim();
    Ok(list_users(store)
        .await?
        .into_iter()
        .find(|u| u.username == username))
}

/// Create an account, hashing the password. Returns the store-assigned id.
pub async fn create_user<R: RemoteStore>(
    store: &R,
    name: &str,
    username: &str,
    password: &str,
    role: UserRole,
    email: &str,
    phone: &str,
) -> Result<String, String> {
    let name = name.trim();
    let username = username.trim();
    if name.is_empty() || username.is_empty() {
        return Err("Name and username are required".to_string());
    }
    if password.len() < 6 {
        return Err("Password must be at least 6 characters".to_string());
    }
    if find_by_username(store, username).await?.is_some() {
        return Err(format!("Username '{username}' is already taken"));
    }

    let password_hash =
        bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| format!("password hash: {e}"))?;

    let id = store
        .create_document(
            USERS_COLLECTION,
            &serde_json::json!({
                "name": name,
                "username": username,
                "role": role,
                "email": email.trim(),
                "phone": phone.trim(),
                "passwordHash": password_hash,
                "registeredAt": chrono::Utc::now().to_rfc3339(),
            }),
        )
        .await?;
    info!(user_id = %id, username, role = role.as_str(), "user account created");
    Ok(id)
}

/// Update profile fields (name, email, phone, role). Username and password
/// are not changed here; a password change goes through `set_password`.
pub async fn update_user<R: RemoteStore>(
    store: &R,
    id: &str,
    patch: &Value,
) -> Result<(), String> {
    let mut fields = serde_json::Map::new();
    for key in ["name", "email", "phone", "role"] {
        if let Some(v) = patch.get(key) {
            fields.insert(key.to_string(), v.clone());
        }
    }
    if fields.is_empty() {
        return Err("Nothing to update".to_string());
    }
    store
        .update_document(USERS_COLLECTION, id, &Value::Object(fields))
        .await?;
    info!(user_id = %id, "user account updated");
    Ok(())
}

/// Replace an account's password hash.
pub async fn set_password<R: RemoteStore>(
    store: &R,
    id: &str,
    new_password: &str,
) -> Result<(), String> {
    if new_password.len() < 6 {
        return Err("Password must be at least 6 characters".to_string());
    }
    let password_hash = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)
        .map_err(|e| format!("password hash: {e}"))?;
    store
        .update_document(
            USERS_COLLECTION,
            id,
            &serde_json::json!({ "passwordHash": password_hash }),
        )
        .await?;
    info!(user_id = %id, "password changed");
    Ok(())
}

pub async fn delete_user<R: RemoteStore>(store: &R, id: &str) -> Result<(), String> {
    store.delete_document(USERS_COLLECTION, id).await?;
    info!(user_id = %id, "user account deleted");
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote_mock::MockRemoteStore;

    #[tokio::test]
    async fn test_create_user_hashes_password_and_rejects_duplicates() {
        let store = MockRemoteStore::new();
        let id = create_user(
            &store,
            "Juan Perez",
            "juanp",
            "secret123",
            UserRole::Recorder,
            "juan@example.com",
            "555-0101",
        )
        .await
        .expect("create");

        let docs = store.documents(USERS_COLLECTION);
        let hash = docs[0]
            .get("passwordHash")
            .and_then(|v| v.as_str())
            .expect("hash stored");
        assert_ne!(hash, "secret123");
        assert!(bcrypt::verify("secret123", hash).unwrap_or(false));
        assert!(!id.is_empty());

        let err = create_user(
            &store,
            "Other",
            "juanp",
            "secret456",
            UserRole::Guest,
            "",
            "",
        )
        .await
        .expect_err("duplicate username");
        assert!(err.contains("already taken"));
    }

    #[tokio::test]
    async fn test_create_user_validates_inputs() {
        let store = MockRemoteStore::new();
        assert!(
            create_user(&store, " ", "u", "secret123", UserRole::Guest, "", "")
                .await
                .is_err()
        );
        assert!(
            create_user(&store, "Name", "user", "short", UserRole::Guest, "", "")
                .await
                .is_err()
        );
    }

    #[test]
    fn test_password_hash_is_never_serialized() {
        let user = UserAccount {
            id: "U1".into(),
            name: "Juan Perez".into(),
            username: "juanp".into(),
            role: UserRole::Admin,
            email: String::new(),
            phone: String::new(),
            password_hash: "$2b$12$abcdefghijklmnopqrstuv".into(),
            registered_at: "2026-08-01T00:00:00Z".into(),
        };
        let json = serde_json::to_value(&user).expect("serialize");
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json.get("role").and_then(|v| v.as_str()), Some("admin"));
    }

    #[tokio::test]
    async fn test_update_user_only_touches_profile_fields() {
        let store = MockRemoteStore::new();
        let id = create_user(
            &store,
            "Juan Perez",
            "juanp",
            "secret123",
            UserRole::Recorder,
            "",
            "",
        )
        .await
        .expect("create");

        update_user(
            &store,
            &id,
            &serde_json::json!({
                "name": "Juan P.",
                "passwordHash": "evil-overwrite",
                "username": "hijacked",
            }),
        )
        .await
        .expect("update");

        let docs = store.documents(USERS_COLLECTION);
        assert_eq!(docs[0].get("name").and_then(|v| v.as_str()), Some("Juan P."));
        assert_eq!(
            docs[0].get("username").and_then(|v| v.as_str()),
            Some("juanp")
        );
        assert_ne!(
            docs[0].get("passwordHash").and_then(|v| v.as_str()),
            Some("evil-overwrite")
        );
    }
}
