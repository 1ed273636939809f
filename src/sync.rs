//! Offline-queue drain for BerryTrack.
//!
//! When the dashboard regains connectivity and the offline queue is
//! non-empty, the user triggers a drain: every staged report is uploaded in
//! order and the queue is cleared. The drain is manual, strictly sequential,
//! and guarded by a single-flight flag so two taps cannot race on the same
//! queue slot.
//!
//! Queue-clear policy: **best-effort drain, clear-on-completion-regardless**.
//! After every record has been attempted once, the whole queue is cleared
//! even when some records failed; failures are logged and reported in the
//! drain summary, never retried. Changing this to retain failed records is
//! a deliberate behavior change with its own regression test to flip.

use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::RemoteStore;
use crate::catalog::MATERIALS_COLLECTION;
use crate::db::{self, DbState};
use crate::media::MediaUploader;
use crate::offline;
use crate::reports::{self, PendingReport, REPORTS_COLLECTION};

// ---------------------------------------------------------------------------
// Sync engine state (managed by Tauri)
// ---------------------------------------------------------------------------

/// Managed state for the queue drain.
pub struct SyncState {
    /// Single-flight guard: a drain holds this for its whole pass.
    pub is_running: Arc<AtomicBool>,
    /// RFC3339 finish time of the last completed drain.
    pub last_sync: Arc<std::sync::Mutex<Option<String>>>,
}

impl SyncState {
    pub fn new() -> Self {
        Self {
            is_running: Arc::new(AtomicBool::new(false)),
            last_sync: Arc::new(std::sync::Mutex::new(None)),
        }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainSummary {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    pub started_at: String,
    pub finished_at: String,
}

// ---------------------------------------------------------------------------
// Drain
// ---------------------------------------------------------------------------

/// Upload every queued report and clear the queue.
///
/// Per record: upload the photo if one was attached (an upload failure is
/// tolerated — the record proceeds with an empty media reference), strip the
/// local-only fields, stamp the payload with the upload time, create the
/// cloud document, and decrement the material stock by the export units. A
/// record that fails is logged and counted and the pass moves on to the next
/// one.
///
/// Returns an error without touching the queue when a drain is already in
/// flight.
pub async fn drain_pending_reports<R: RemoteStore, M: MediaUploader>(
    db: &DbState,
    store: &R,
    media: &M,
    state: &SyncState,
) -> Result<DrainSummary, String> {
    if state
        .is_running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err("A sync is already running".to_string());
    }

    let result = drain_inner(db, store, media).await;
    state.is_running.store(false, Ordering::SeqCst);

    if let Ok(summary) = &result {
        if let Ok(mut last) = state.last_sync.lock() {
            *last = Some(summary.finished_at.clone());
        }
    }
    result
}

async fn drain_inner<R: RemoteStore, M: MediaUploader>(
    db: &DbState,
    store: &R,
    media: &M,
) -> Result<DrainSummary, String> {
    let started_at = Utc::now().to_rfc3339();
    let queue = offline::peek_all(db);

    if queue.is_empty() {
        return Ok(DrainSummary {
            attempted: 0,
            synced: 0,
            failed: 0,
            started_at: started_at.clone(),
            finished_at: started_at,
        });
    }

    info!(queued = queue.len(), "starting offline queue drain");

    let mut synced = 0usize;
    let mut failed = 0usize;

    for (index, report) in queue.iter().enumerate() {
        match upload_one(db, store, media, report).await {
            Ok(()) => synced += 1,
            Err(e) => {
                failed += 1;
                error!(
                    index,
                    parcel_id = %report.parcel_id,
                    "queued report failed to sync: {e}"
                );
            }
        }
    }

    // Clear-on-completion-regardless: every record got its one attempt, so
    // the slot is emptied even when some of them failed.
    if let Err(e) = offline::clear_all(db) {
        warn!("failed to clear offline queue after drain: {e}");
    }
    offline::add_synced_count(db, synced);

    let finished_at = Utc::now().to_rfc3339();
    if let Ok(conn) = db.conn.lock() {
        let _ = db::record_sync_history(
            &conn,
            &started_at,
            &finished_at,
            queue.len(),
            synced,
            failed,
        );
    }

    if failed > 0 {
        warn!(synced, failed, "queue drain finished with failures (queue cleared)");
    } else {
        info!(synced, "queue drain finished");
    }

    Ok(DrainSummary {
        attempted: queue.len(),
        synced,
        failed,
        started_at,
        finished_at,
    })
}

/// One queued record, in the order the capture flow wrote it.
async fn upload_one<R: RemoteStore, M: MediaUploader>(
    db: &DbState,
    store: &R,
    media: &M,
    report: &PendingReport,
) -> Result<(), String> {
    let photo_url = match &report.local_photo_path {
        Some(path) => match media.upload_photo(path).await {
            Ok(url) => url,
            Err(e) => {
                warn!("queued photo upload failed, syncing without photo: {e}");
                String::new()
            }
        },
        None => String::new(),
    };

    // The upload timestamp replaces the enqueue timestamp.
    let uploaded_at = Utc::now().to_rfc3339();
    let payload = reports::remote_payload(db, report, &photo_url, &uploaded_at);
    store.create_document(REPORTS_COLLECTION, &payload).await?;

    let total = report.total_units();
    if total > 0 && !report.material_id.is_empty() {
        store
            .increment_field(
                MATERIALS_COLLECTION,
                &report.material_id,
                "stock",
                -(total as i64),
            )
            .await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Connectivity monitor (frontend banner only)
// ---------------------------------------------------------------------------

/// Poll connectivity and emit `network_status` events on change. This feeds
/// the offline banner; the capture and drain flows always re-probe at their
/// own trigger points instead of trusting the last event.
pub fn start_connectivity_monitor(app: tauri::AppHandle, interval_secs: u64) {
    use tauri::Emitter;

    tauri::async_runtime::spawn(async move {
        let mut last_online: Option<bool> = None;
        loop {
            let online = crate::api::check_connectivity().await;
            if last_online != Some(online) {
                info!(online, "network status changed");
                let _ = app.emit(
                    "network_status",
                    serde_json::json!({ "isOnline": online }),
                );
                last_online = Some(online);
            }
            tokio::time::sleep(std::time::Duration::from_secs(interval_secs)).await;
        }
    });
}

// ===========================================================================
// Tests
// ===========================================================================
