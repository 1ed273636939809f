//! Login and session management.
//!
//! Credentials are checked against the remote `users` collection with
//! bcrypt; the plaintext is zeroized as soon as the verify completes. The
//! session is an explicit object with a defined lifecycle — created at
//! login, destroyed at logout, expired on inactivity — and every permission
//! check goes through it instead of re-deriving the user per screen.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;
use zeroize::Zeroize;

use crate::api::RemoteStore;
use crate::users::{self, UserRole};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const MAX_FAILED_ATTEMPTS: u32 = 5;
const LOCKOUT_MINUTES: i64 = 15;
const SESSION_INACTIVITY_MINUTES: i64 = 30;
/// Field days are long; the hard cap only exists so a stolen device does
/// not stay signed in forever.
const SESSION_MAX_DURATION_HOURS: i64 = 12;

/// Permissions per role, mirroring which dashboard cards each role sees.
const ADMIN_PERMISSIONS: &[&str] = &[
    "view_reports",
    "manage_inventory",
    "manage_parcels",
    "manage_calendar",
    "manage_users",
    "view_recent",
    "trigger_sync",
];
const ASSOCIATE_PERMISSIONS: &[&str] =
    &["capture_harvest", "manage_calendar", "view_recent", "trigger_sync"];
const RECORDER_PERMISSIONS: &[&str] = &["capture_harvest", "view_reports", "trigger_sync"];

fn permissions_for(role: UserRole) -> Vec<String> {
    let perms: &[&str] = match role {
        UserRole::Admin => ADMIN_PERMISSIONS,
        UserRole::Associate => ASSOCIATE_PERMISSIONS,
        UserRole::Recorder => RECORDER_PERMISSIONS,
        UserRole::Guest => &[],
    };
    perms.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The signed-in user.
#[derive(Clone)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub name: String,
    pub username: String,
    pub role: UserRole,
    pub permissions: Vec<String>,
    pub login_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Check whether this session has expired (inactivity or max duration).
    fn is_expired(&self) -> bool {
        let now = Utc::now();
        if now >= self.expires_at {
            return true;
        }
        if now - self.last_activity > Duration::minutes(SESSION_INACTIVITY_MINUTES) {
            return true;
        }
        false
    }

    /// Convert to the JSON shape the frontend expects.
    fn to_user_json(&self) -> Value {
        serde_json::json!({
            "userId": self.user_id,
            "name": self.name,
            "username": self.username,
            "role": {
                "name": self.role.as_str(),
                "permissions": self.permissions,
            },
            "sessionId": self.session_id,
            "loginTime": self.login_time.to_rfc3339(),
        })
    }
}

/// Lockout tracking entry.
struct LockoutEntry {
    attempts: u32,
    last_attempt: DateTime<Utc>,
}

/// Tauri managed state for authentication. One session per device.
pub struct SessionState {
    current: Mutex<Option<Session>>,
    lockout: Mutex<LockoutEntry>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            lockout: Mutex::new(LockoutEntry {
                attempts: 0,
                last_attempt: Utc::now(),
            }),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Lockout helpers
// ---------------------------------------------------------------------------

fn check_lockout(lockout: &LockoutEntry) -> Result<(), String> {
    if lockout.attempts >= MAX_FAILED_ATTEMPTS {
        let elapsed = Utc::now() - lockout.last_attempt;
        if elapsed < Duration::minutes(LOCKOUT_MINUTES) {
            let remaining = LOCKOUT_MINUTES - elapsed.num_minutes();
            return Err(format!(
                "Too many failed attempts. Try again in {remaining} minute(s)."
            ));
        }
    }
    Ok(())
}

fn record_failure(state: &SessionState) {
    if let Ok(mut lockout) = state.lockout.lock() {
        let elapsed = Utc::now() - lockout.last_attempt;
        if elapsed >= Duration::minutes(LOCKOUT_MINUTES) {
            lockout.attempts = 0;
        }
        lockout.attempts += 1;
        lockout.last_attempt = Utc::now();
    }
}

fn reset_lockout(state: &SessionState) {
    if let Ok(mut lockout) = state.lockout.lock() {
        lockout.attempts = 0;
    }
}

// ---------------------------------------------------------------------------
// Login / logout / queries
// ---------------------------------------------------------------------------

/// Verify credentials against the remote user collection and open a
/// session. Login needs connectivity; offline devices keep whatever session
/// they already hold.
pub async fn login<R: RemoteStore>(
    state: &SessionState,
    store: &R,
    username: &str,
    password: &str,
) -> Result<Value, String> {
    {
        let lockout = state
            .lockout
            .lock()
            .map_err(|_| "Auth state unavailable".to_string())?;
        check_lockout(&lockout)?;
    }

    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err("Username and password are required".to_string());
    }

    let account = match users::find_by_username(store, username).await? {
        Some(a) => a,
        None => {
            record_failure(state);
            warn!(username, "login failed: unknown username");
            return Err("Invalid username or password".to_string());
        }
    };

    let mut plaintext = password.to_string();
    let verified = bcrypt::verify(&plaintext, &account.password_hash).unwrap_or(false);
    plaintext.zeroize();

    if !verified {
        record_failure(state);
        warn!(username, "login failed: bad password");
        return Err("Invalid username or password".to_string());
    }

    reset_lockout(state);

    let now = Utc::now();
    let session = Session {
        session_id: Uuid::new_v4().to_string(),
        user_id: account.id.clone(),
        name: account.name.clone(),
        username: account.username.clone(),
        role: account.role,
        permissions: permissions_for(account.role),
        login_time: now,
        last_activity: now,
        expires_at: now + Duration::hours(SESSION_MAX_DURATION_HOURS),
    };
    let user_json = session.to_user_json();

    let mut current = state
        .current
        .lock()
        .map_err(|_| "Auth state unavailable".to_string())?;
    *current = Some(session);

    info!(username, role = account.role.as_str(), "user logged in");
    Ok(serde_json::json!({ "success": true, "user": user_json }))
}

/// Destroy the session.
pub fn logout(state: &SessionState) -> Value {
    if let Ok(mut current) = state.current.lock() {
        if let Some(session) = current.take() {
            info!(username = %session.username, "user logged out");
        }
    }
    serde_json::json!({ "success": true })
}

/// The current session as frontend JSON, or null when signed out/expired.
/// An expired session is destroyed on first observation.
pub fn current_session(state: &SessionState) -> Value {
    let mut current = match state.current.lock() {
        Ok(c) => c,
        Err(_) => return Value::Null,
    };
    match current.as_ref() {
        Some(session) if session.is_expired() => {
            info!(username = %session.username, "session expired");
            *current = None;
            Value::Null
        }
        Some(session) => session.to_user_json(),
        None => Value::Null,
    }
}

/// Whether the signed-in user holds a permission. Expired or missing
/// sessions hold none.
pub fn has_permission(state: &SessionState, permission: &str) -> bool {
    let current = match state.current.lock() {
        Ok(c) => c,
        Err(_) => return false,
    };
    match current.as_ref() {
        Some(session) if !session.is_expired() => {
            session.permissions.iter().any(|p| p == permission)
        }
        _ => false,
    }
}

/// Refresh the inactivity window on user interaction.
pub fn track_activity(state: &SessionState) {
    if let Ok(mut current) = state.current.lock() {
        if let Some(session) = current.as_mut() {
            session.last_activity = Utc::now();
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote_mock::MockRemoteStore;
    use crate::users::USERS_COLLECTION;

    fn seed_user(store: &MockRemoteStore, username: &str, password: &str, role: &str) {
        // Min cost keeps the test fast; production hashing uses DEFAULT_COST
        let hash = bcrypt::hash(password, 4).expect("hash");
        store.seed(
            USERS_COLLECTION,
            serde_json::json!({
                "name": "Juan Perez",
                "username": username,
                "role": role,
                "passwordHash": hash,
            }),
        );
    }

    #[tokio::test]
    async fn test_login_opens_session_with_role_permissions() {
        let state = SessionState::new();
        let store = MockRemoteStore::new();
        seed_user(&store, "juanp", "secret123", "recorder");

        let result = login(&state, &store, "juanp", "secret123")
            .await
            .expect("login");
        let user = result.get("user").expect("user json");
        assert_eq!(
            user.pointer("/role/name").and_then(|v| v.as_str()),
            Some("recorder")
        );

        assert!(has_permission(&state, "capture_harvest"));
        assert!(!has_permission(&state, "manage_users"));
        assert!(current_session(&state).is_object());
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let state = SessionState::new();
        let store = MockRemoteStore::new();
        seed_user(&store, "juanp", "secret123", "admin");

        assert!(login(&state, &store, "nobody", "secret123").await.is_err());
        assert!(login(&state, &store, "juanp", "wrong").await.is_err());
        assert!(current_session(&state).is_null());
    }

    #[tokio::test]
    async fn test_lockout_after_repeated_failures() {
        let state = SessionState::new();
        let store = MockRemoteStore::new();
        seed_user(&store, "juanp", "secret123", "admin");

        for _ in 0..MAX_FAILED_ATTEMPTS {
            let _ = login(&state, &store, "juanp", "wrong").await;
        }

        let err = login(&state, &store, "juanp", "secret123")
            .await
            .expect_err("locked out");
        assert!(err.contains("Too many failed attempts"));
    }

    #[tokio::test]
    async fn test_logout_destroys_session() {
        let state = SessionState::new();
        let store = MockRemoteStore::new();
        seed_user(&store, "juanp", "secret123", "admin");

        login(&state, &store, "juanp", "secret123")
            .await
            .expect("login");
        assert!(has_permission(&state, "manage_users"));

        logout(&state);
        assert!(current_session(&state).is_null());
        assert!(!has_permission(&state, "manage_users"));
    }

    #[tokio::test]
    async fn test_expired_session_is_destroyed_on_observation() {
        let state = SessionState::new();
        let store = MockRemoteStore::new();
        seed_user(&store, "juanp", "secret123", "admin");

        login(&state, &store, "juanp", "secret123")
            .await
            .expect("login");

        // Age the session past the inactivity window
        {
            let mut current = state.current.lock().unwrap();
            let session = current.as_mut().unwrap();
            session.last_activity =
                Utc::now() - Duration::minutes(SESSION_INACTIVITY_MINUTES + 1);
        }

        assert!(current_session(&state).is_null());
        assert!(!has_permission(&state, "view_reports"));
    }

    #[test]
    fn test_guest_role_has_no_permissions() {
        assert!(permissions_for(UserRole::Guest).is_empty());
        assert!(permissions_for(UserRole::Admin).contains(&"manage_users".to_string()));
    }
}
