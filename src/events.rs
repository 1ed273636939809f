//! Field-work calendar.
//!
//! Events live in the remote `events` collection; like the catalogs, the
//! list keeps a last-known-good offline copy. Event status cycles
//! pending -> in_progress -> done and back to pending.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::api::RemoteStore;
use crate::db::DbState;
use crate::offline;

pub const EVENTS_COLLECTION: &str = "events";

/// Progress state of a scheduled activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    InProgress,
    Done,
}

impl EventStatus {
    /// The state a tap on the event card moves it to.
    pub fn next(self) -> Self {
        match self {
            EventStatus::Pending => EventStatus::InProgress,
            EventStatus::InProgress => EventStatus::Done,
            EventStatus::Done => EventStatus::Pending,
        }
    }
}

/// A scheduled activity shown on the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Day the activity is planned for, as "YYYY-MM-DD".
    pub date: String,
    /// irrigation | harvest | delivery | other
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_status")]
    pub status: EventStatus,
}

fn default_kind() -> String {
    "other".to_string()
}

fn default_status() -> EventStatus {
    EventStatus::Pending
}

/// Calendar fetch result handed to the frontend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsBundle {
    pub events: Vec<CalendarEvent>,
    pub is_offline: bool,
}

fn decode_events(docs: Vec<Value>) -> Vec<CalendarEvent> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value::<CalendarEvent>(doc) {
            Ok(e) if !e.id.is_empty() && !e.title.trim().is_empty() => Some(e),
            Ok(e) => {
                warn!(id = %e.id, "dropping event document with empty fields");
                None
            }
            Err(e) => {
                warn!("dropping malformed event document: {e}");
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Fetch / CRUD
// ---------------------------------------------------------------------------

/// Load the calendar, ordered by date.
///
/// Online fetches refresh the offline snapshot. When offline, or when the
/// online fetch fails but a snapshot exists, the snapshot is served instead
/// (the emergency-backup behavior the field crews rely on).
pub async fn fetch_events<R: RemoteStore>(
    db: &DbState,
    store: &R,
    online: bool,
) -> Result<EventsBundle, String> {
    if !online {
        return Ok(EventsBundle {
            events: offline::load_events_snapshot(db),
            is_offline: true,
        });
    }

    match store
        .list_documents(EVENTS_COLLECTION, "date", false, None)
        .await
    {
        Ok(docs) => {
            let events = decode_events(docs);
            if let Err(e) = offline::save_events_snapshot(db, &events) {
                warn!("calendar snapshot refresh failed: {e}");
            }
            Ok(EventsBundle {
                events,
                is_offline: false,
            })
        }
        Err(e) => {
            let backup = offline::load_events_snapshot(db);
            if backup.is_empty() {
                Err(e)
            } else {
                warn!("calendar fetch failed, serving snapshot: {e}");
                Ok(EventsBundle {
                    events: backup,
                    is_offline: true,
                })
            }
        }
    }
}

/// Schedule a new activity. Returns the store-assigned id.
pub async fn create_event<R: RemoteStore>(
    store: &R,
    title: &str,
    description: &str,
    date: &str,
    kind: &str,
) -> Result<String, String> {
    let title = title.trim();
    if title.is_empty() {
        return Err("Event title is required".to_string());
    }
    if date.trim().is_empty() {
        return Err("Event date is required".to_string());
    }

    let kind = match kind {
        "irrigation" | "harvest" | "delivery" | "other" => kind,
        _ => "other",
    };

    let id = store
        .create_document(
            EVENTS_COLLECTION,
            &serde_json::json!({
                "title": title,
                "description": description,
                "date": date,
                "kind": kind,
                "status": "pending",
            }),
        )
        .await?;
    info!(event_id = %id, date, "calendar event created");
    Ok(id)
}

pub async fn delete_event<R: RemoteStore>(store: &R, id: &str) -> Result<(), String> {
    store.delete_document(EVENTS_COLLECTION, id).await?;
    info!(event_id = %id, "calendar event deleted");
    Ok(())
}

/// Advance an event to its next status; returns the new status.
pub async fn cycle_event_status<R: RemoteStore>(
    store: &R,
    id: &str,
    current: EventStatus,
) -> Result<EventStatus, String> {
    let next = current.next();
    store
        .update_document(
            EVENTS_COLLECTION,
            id,
            &serde_json::json!({ "status": next }),
        )
        .await?;
    Ok(next)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote_mock::MockRemoteStore;

    fn test_db() -> DbState {
        let conn = rusqlite::Connection::open_in_memory().expect("open in-memory db");
        crate::db::run_migrations_for_test(&conn);
        DbState {
            conn: std::sync::Mutex::new(conn),
            db_path: std::path::PathBuf::from(":memory:"),
        }
    }

    #[test]
    fn test_status_cycle() {
        assert_eq!(EventStatus::Pending.next(), EventStatus::InProgress);
        assert_eq!(EventStatus::InProgress.next(), EventStatus::Done);
        assert_eq!(EventStatus::Done.next(), EventStatus::Pending);
    }

    #[tokio::test]
    async fn test_fetch_orders_by_date_and_refreshes_snapshot() {
        let db = test_db();
        let store = MockRemoteStore::new();
        store.seed(
            EVENTS_COLLECTION,
            serde_json::json!({ "title": "Delivery run", "date": "2026-08-10" }),
        );
        store.seed(
            EVENTS_COLLECTION,
            serde_json::json!({ "title": "Irrigation check", "date": "2026-08-03" }),
        );

        let bundle = fetch_events(&db, &store, true).await.expect("fetch");
        assert!(!bundle.is_offline);
        assert_eq!(bundle.events[0].title, "Irrigation check");
        assert_eq!(bundle.events[1].title, "Delivery run");

        let offline_bundle = fetch_events(&db, &store, false).await.expect("offline");
        assert!(offline_bundle.is_offline);
        assert_eq!(offline_bundle.events, bundle.events);
    }

    #[tokio::test]
    async fn test_create_event_validates_and_defaults() {
        let store = MockRemoteStore::new();
        assert!(create_event(&store, " ", "", "2026-08-03", "other")
            .await
            .is_err());
        assert!(create_event(&store, "Pruning", "", "", "other").await.is_err());

        create_event(&store, "Pruning", "row 2", "2026-08-04", "weird-kind")
            .await
            .expect("create");
        let docs = store.documents(EVENTS_COLLECTION);
        assert_eq!(docs[0].get("kind").and_then(|v| v.as_str()), Some("other"));
        assert_eq!(
            docs[0].get("status").and_then(|v| v.as_str()),
            Some("pending")
        );
    }

    #[tokio::test]
    async fn test_cycle_event_status_updates_remote() {
        let store = MockRemoteStore::new();
        let id = store.seed(
            EVENTS_COLLECTION,
            serde_json::json!({ "title": "Harvest east rows", "date": "2026-08-05", "status": "pending" }),
        );

        let next = cycle_event_status(&store, &id, EventStatus::Pending)
            .await
            .expect("cycle");
        assert_eq!(next, EventStatus::InProgress);

        let docs = store.documents(EVENTS_COLLECTION);
        assert_eq!(
            docs[0].get("status").and_then(|v| v.as_str()),
            Some("in_progress")
        );
    }
}
