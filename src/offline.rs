//! Offline staging for devices working out of network range.
//!
//! Three durable artifacts live in fixed `local_settings` slots:
//!
//! - the pending-report queue: harvest reports captured while offline,
//!   waiting for the next drain. Append-only from the capture flow; cleared
//!   only as a whole by the drain. No per-item addressing, no size bound,
//!   no deduplication.
//! - the catalog snapshot: last-known-good parcel and material lists,
//!   refreshed on every successful remote fetch. No staleness bound is
//!   tracked; an offline session may be working from an arbitrarily old
//!   copy.
//! - the calendar snapshot, same pattern as the catalog.
//!
//! Reads swallow storage failures (an unreadable queue is indistinguishable
//! from an empty one); writes surface `QueueError` so callers can log it.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::catalog::{Material, Parcel};
use crate::db::{self, DbState};
use crate::events::CalendarEvent;
use crate::reports::PendingReport;

const CATEGORY: &str = "offline";

const QUEUE_KEY: &str = "pending_reports";
const PARCELS_KEY: &str = "catalog_parcels";
const MATERIALS_KEY: &str = "catalog_materials";
const EVENTS_KEY: &str = "calendar_events";
const SYNCED_COUNTER_KEY: &str = "records_synced_total";

/// Failure writing to (or serializing for) the durable local store.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("local storage unavailable: {0}")]
    Storage(String),
    #[error("queue serialization failed: {0}")]
    Codec(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Raw slot access
// ---------------------------------------------------------------------------

fn read_slot(db: &DbState, key: &str) -> Option<String> {
    let conn = match db.conn.lock() {
        Ok(c) => c,
        Err(e) => {
            error!(key, "offline store lock failed: {e}");
            return None;
        }
    };
    db::get_setting(&conn, CATEGORY, key)
}

fn write_slot(db: &DbState, key: &str, value: &str) -> Result<(), QueueError> {
    let conn = db
        .conn
        .lock()
        .map_err(|e| QueueError::Storage(e.to_string()))?;
    db::set_setting(&conn, CATEGORY, key, value).map_err(QueueError::Storage)
}

fn remove_slot(db: &DbState, key: &str) -> Result<(), QueueError> {
    let conn = db
        .conn
        .lock()
        .map_err(|e| QueueError::Storage(e.to_string()))?;
    db::remove_setting(&conn, CATEGORY, key).map_err(QueueError::Storage)
}

/// Read a slot as a typed list. Missing slot, read failure, and undecodable
/// content all collapse to an empty list (logged, not surfaced).
fn read_list<T: serde::de::DeserializeOwned>(db: &DbState, key: &str) -> Vec<T> {
    let raw = match read_slot(db, key) {
        Some(raw) => raw,
        None => return Vec::new(),
    };
    match serde_json::from_str::<Vec<T>>(&raw) {
        Ok(list) => list,
        Err(e) => {
            error!(key, "offline slot is undecodable, treating as empty: {e}");
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Pending-report queue
// ---------------------------------------------------------------------------

/// Append a report to the pending queue. Read-modify-write of the whole
/// slot; two calls with equal data produce two entries. Returns the new
/// queue length.
pub fn enqueue(db: &DbState, report: &PendingReport) -> Result<usize, QueueError> {
    let mut queue = peek_all(db);
    queue.push(report.clone());
    let serialized = serde_json::to_string(&queue)?;
    write_slot(db, QUEUE_KEY, &serialized)?;
    debug!(queue_len = queue.len(), "report queued for later sync");
    Ok(queue.len())
}

/// The full ordered queue. Empty on miss or read failure.
pub fn peek_all(db: &DbState) -> Vec<PendingReport> {
    read_list(db, QUEUE_KEY)
}

/// Number of reports waiting for the next drain.
pub fn queue_len(db: &DbState) -> usize {
    peek_all(db).len()
}

/// Remove the entire queue unconditionally. Not transactional with respect
/// to `peek_all`: the drain clears everything it attempted, whether or not
/// every record made it to the cloud (see sync::drain_pending_reports).
pub fn clear_all(db: &DbState) -> Result<(), QueueError> {
    remove_slot(db, QUEUE_KEY)
}

// ---------------------------------------------------------------------------
// Catalog snapshot
// ---------------------------------------------------------------------------

/// Replace the last-known-good catalog copies.
pub fn save_catalog_snapshot(
    db: &DbState,
    parcels: &[Parcel],
    materials: &[Material],
) -> Result<(), QueueError> {
    write_slot(db, PARCELS_KEY, &serde_json::to_string(parcels)?)?;
    write_slot(db, MATERIALS_KEY, &serde_json::to_string(materials)?)?;
    debug!(
        parcels = parcels.len(),
        materials = materials.len(),
        "catalog snapshot refreshed"
    );
    Ok(())
}

/// The last-known-good catalog copies, empty lists when never saved.
pub fn load_catalog_snapshot(db: &DbState) -> (Vec<Parcel>, Vec<Material>) {
    (read_list(db, PARCELS_KEY), read_list(db, MATERIALS_KEY))
}

// ---------------------------------------------------------------------------
// Calendar snapshot
// ---------------------------------------------------------------------------

pub fn save_events_snapshot(db: &DbState, events: &[CalendarEvent]) -> Result<(), QueueError> {
    write_slot(db, EVENTS_KEY, &serde_json::to_string(events)?)
}

pub fn load_events_snapshot(db: &DbState) -> Vec<CalendarEvent> {
    read_list(db, EVENTS_KEY)
}

// ---------------------------------------------------------------------------
// Synced-records counter
// ---------------------------------------------------------------------------

/// Add to the lifetime records-synced counter. Best effort; a failed bump
/// is logged and dropped.
pub fn add_synced_count(db: &DbState, n: usize) {
    let total = total_synced(db) + n as u64;
    if let Err(e) = write_slot(db, SYNCED_COUNTER_KEY, &total.to_string()) {
        warn!("failed to persist synced counter: {e}");
    }
}

pub fn total_synced(db: &DbState) -> u64 {
    read_slot(db, SYNCED_COUNTER_KEY)
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(0)
}

/// Offline state summary for the dashboard.
pub fn status(db: &DbState) -> Value {
    serde_json::json!({
        "pendingReports": queue_len(db),
        "totalSynced": total_synced(db),
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventStatus;

    fn test_db() -> DbState {
        let conn = rusqlite::Connection::open_in_memory().expect("open in-memory db");
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
        .expect("pragma setup");
        db::run_migrations_for_test(&conn);
        DbState {
            conn: std::sync::Mutex::new(conn),
            db_path: std::path::PathBuf::from(":memory:"),
        }
    }

    fn sample_report(parcel: &str, boxes_6oz: u32) -> PendingReport {
        PendingReport {
            parcel_id: parcel.to_string(),
            material_id: "M1".to_string(),
            export_6oz: boxes_6oz,
            export_12oz: 0,
            process_tray_count: 3,
            notes: "row 4, light rain".to_string(),
            created_at: "2026-08-01T06:30:00Z".to_string(),
            local_photo_path: Some("/data/photos/row4.jpg".to_string()),
        }
    }

    #[test]
    fn test_enqueue_grows_queue_by_one_and_preserves_fields() {
        let db = test_db();
        assert_eq!(queue_len(&db), 0);

        let report = sample_report("P1", 50);
        let len = enqueue(&db, &report).expect("enqueue");
        assert_eq!(len, 1);

        let queued = peek_all(&db);
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0], report);
    }

    #[test]
    fn test_peek_all_ordering_last_element_is_latest() {
        let db = test_db();
        enqueue(&db, &sample_report("P1", 10)).expect("first");
        enqueue(&db, &sample_report("P2", 20)).expect("second");
        let latest = sample_report("P3", 30);
        enqueue(&db, &latest).expect("third");

        let queued = peek_all(&db);
        assert_eq!(queued.len(), 3);
        assert_eq!(queued.last(), Some(&latest));
        assert_eq!(queued[0].parcel_id, "P1");
    }

    #[test]
    fn test_duplicate_enqueue_produces_two_entries() {
        let db = test_db();
        let report = sample_report("P1", 50);
        enqueue(&db, &report).expect("first");
        enqueue(&db, &report).expect("second");
        assert_eq!(queue_len(&db), 2);
    }

    #[test]
    fn test_clear_all_empties_queue() {
        let db = test_db();
        enqueue(&db, &sample_report("P1", 1)).expect("enqueue");
        enqueue(&db, &sample_report("P2", 2)).expect("enqueue");

        clear_all(&db).expect("clear");
        assert!(peek_all(&db).is_empty());

        // Clearing an already-empty queue is fine
        clear_all(&db).expect("clear again");
    }

    #[test]
    fn test_undecodable_queue_reads_as_empty() {
        let db = test_db();
        write_slot(&db, QUEUE_KEY, "not json at all").expect("seed garbage");
        assert!(peek_all(&db).is_empty());
        assert_eq!(queue_len(&db), 0);
    }

    #[test]
    fn test_catalog_snapshot_roundtrip() {
        let db = test_db();
        let (p, m) = load_catalog_snapshot(&db);
        assert!(p.is_empty() && m.is_empty());

        let parcels = vec![
            Parcel {
                id: "P1".into(),
                name: "North field".into(),
            },
            Parcel {
                id: "P2".into(),
                name: "Creek rows".into(),
            },
        ];
        let materials = vec![Material {
            id: "M1".into(),
            name: "HEB clamshell".into(),
            stock: 420,
        }];

        save_catalog_snapshot(&db, &parcels, &materials).expect("save");
        let (p, m) = load_catalog_snapshot(&db);
        assert_eq!(p, parcels);
        assert_eq!(m, materials);
    }

    #[test]
    fn test_events_snapshot_roundtrip() {
        let db = test_db();
        let events = vec![CalendarEvent {
            id: "E1".into(),
            title: "Irrigation check".into(),
            description: "west valves".into(),
            date: "2026-08-03".into(),
            kind: "irrigation".into(),
            status: EventStatus::Pending,
        }];
        save_events_snapshot(&db, &events).expect("save");
        assert_eq!(load_events_snapshot(&db), events);
    }

    #[test]
    fn test_synced_counter_accumulates() {
        let db = test_db();
        assert_eq!(total_synced(&db), 0);
        add_synced_count(&db, 3);
        add_synced_count(&db, 2);
        assert_eq!(total_synced(&db), 5);
    }
}
