//! Harvest report capture.
//!
//! Builds a pending report from the capture form, validates it the way the
//! form does (required selectors, one basket type at a time), and either
//! writes it straight to the cloud (online) or stages it in the offline
//! queue (see `offline`). The drain in `sync` reuses the same remote payload
//! builder so a queued report uploads exactly like a live one.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::api::RemoteStore;
use crate::catalog::MATERIALS_COLLECTION;
use crate::db::DbState;
use crate::media::MediaUploader;
use crate::offline;

pub const REPORTS_COLLECTION: &str = "harvest_reports";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which export container the crew is packing today. The capture form only
/// ever counts one of the two sizes per report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasketType {
    #[serde(rename = "6oz")]
    Oz6,
    #[serde(rename = "12oz")]
    Oz12,
}

/// Raw capture-form payload from the frontend.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureForm {
    #[serde(default)]
    pub parcel_id: String,
    #[serde(default)]
    pub material_id: String,
    pub basket_type: Option<BasketType>,
    #[serde(default)]
    pub export_6oz: u32,
    #[serde(default)]
    pub export_12oz: u32,
    #[serde(default)]
    pub process_tray_count: u32,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub local_photo_path: Option<String>,
}

/// An unsent harvest record, exactly as it sits in the offline queue.
/// `local_photo_path` is device-local and is stripped before upload; it is
/// never valid in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReport {
    pub parcel_id: String,
    pub material_id: String,
    pub export_6oz: u32,
    pub export_12oz: u32,
    pub process_tray_count: u32,
    pub notes: String,
    /// Captured at enqueue time, not upload time.
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_photo_path: Option<String>,
}

impl PendingReport {
    /// Export units consumed from the material's stock.
    pub fn total_units(&self) -> u32 {
        self.export_6oz + self.export_12oz
    }
}

/// A harvest report as stored in the cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestReport {
    pub id: String,
    pub parcel_id: String,
    #[serde(default)]
    pub parcel_name: String,
    pub material_id: String,
    #[serde(default)]
    pub material_name: String,
    #[serde(default)]
    pub export_6oz: u32,
    #[serde(default)]
    pub export_12oz: u32,
    #[serde(default)]
    pub process_tray_count: u32,
    #[serde(default)]
    pub notes: String,
    /// Empty string when the report carried no photo (or its upload failed).
    #[serde(default)]
    pub photo_url: String,
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// Validation / construction
// ---------------------------------------------------------------------------

/// Validate the capture form and build the pending record.
///
/// The mutual-exclusion rule lives here, not in the data model: whichever
/// basket type is selected keeps its count and the other is zeroed, exactly
/// like the form's toggle.
pub fn build_pending_report(form: &CaptureForm, created_at: &str) -> Result<PendingReport, String> {
    if form.parcel_id.trim().is_empty() || form.material_id.trim().is_empty() {
        return Err("Complete the required fields".to_string());
    }
    let basket = form
        .basket_type
        .ok_or("Complete the required fields".to_string())?;

    let (export_6oz, export_12oz) = match basket {
        BasketType::Oz6 => (form.export_6oz, 0),
        BasketType::Oz12 => (0, form.export_12oz),
    };

    Ok(PendingReport {
        parcel_id: form.parcel_id.trim().to_string(),
        material_id: form.material_id.trim().to_string(),
        export_6oz,
        export_12oz,
        process_tray_count: form.process_tray_count,
        notes: form.notes.clone(),
        created_at: created_at.to_string(),
        local_photo_path: form.local_photo_path.clone(),
    })
}

/// Build the cloud payload for a report: every field except the local photo
/// path, the resolved media URL, the display names from the catalog
/// snapshot, and `created_at` replaced with the upload timestamp.
pub fn remote_payload(
    db: &DbState,
    report: &PendingReport,
    photo_url: &str,
    uploaded_at: &str,
) -> Value {
    let (parcels, materials) = offline::load_catalog_snapshot(db);
    let parcel_name = parcels
        .iter()
        .find(|p| p.id == report.parcel_id)
        .map(|p| p.name.clone())
        .unwrap_or_default();
    let material_name = materials
        .iter()
        .find(|m| m.id == report.material_id)
        .map(|m| m.name.clone())
        .unwrap_or_default();

    serde_json::json!({
        "parcelId": report.parcel_id,
        "parcelName": parcel_name,
        "materialId": report.material_id,
        "materialName": material_name,
        "export6oz": report.export_6oz,
        "export12oz": report.export_12oz,
        "processTrayCount": report.process_tray_count,
        "notes": report.notes,
        "photoUrl": photo_url,
        "createdAt": uploaded_at,
    })
}

// ---------------------------------------------------------------------------
// Submit flow
// ---------------------------------------------------------------------------

/// Submit a capture-form report.
///
/// Online: upload the photo (tolerating upload failure with an empty URL),
/// create the cloud document, and decrement the material stock by the export
/// units. Offline: stage the record in the local queue; a queue write
/// failure is logged, not surfaced (best-effort staging).
pub async fn submit_report<R: RemoteStore, M: MediaUploader>(
    db: &DbState,
    store: &R,
    media: &M,
    online: bool,
    form: &CaptureForm,
) -> Result<Value, String> {
    let now = chrono::Utc::now().to_rfc3339();
    let report = build_pending_report(form, &now)?;

    if !online {
        match offline::enqueue(db, &report) {
            Ok(len) => {
                info!(queue_len = len, "report staged offline");
                return Ok(serde_json::json!({
                    "success": true,
                    "mode": "offline",
                    "queueLength": len,
                }));
            }
            Err(e) => {
                // Best-effort staging: the reviewed flow logs and moves on.
                tracing::error!("offline staging failed, report dropped: {e}");
                return Ok(serde_json::json!({
                    "success": false,
                    "mode": "offline",
                }));
            }
        }
    }

    let photo_url = match &report.local_photo_path {
        Some(path) => match media.upload_photo(path).await {
            Ok(url) => url,
            Err(e) => {
                warn!("photo upload failed, saving report without photo: {e}");
                String::new()
            }
        },
        None => String::new(),
    };

    let payload = remote_payload(db, &report, &photo_url, &now);
    let report_id = store.create_document(REPORTS_COLLECTION, &payload).await?;

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

    info!(report_id = %report_id, total_units = total, "harvest report saved to cloud");
    Ok(serde_json::json!({
        "success": true,
        "mode": "online",
        "reportId": report_id,
    }))
}

// ---------------------------------------------------------------------------
// Recent records
// ---------------------------------------------------------------------------

/// Most recent harvest reports for the dashboard, newest first.
pub async fn fetch_recent<R: RemoteStore>(
    store: &R,
    limit: usize,
) -> Result<Vec<HarvestReport>, String> {
    let docs = store
        .list_documents(REPORTS_COLLECTION, "createdAt", true, Some(limit))
        .await?;
    Ok(decode_reports(docs))
}

/// Every harvest report, newest first (yield summary input).
pub async fn fetch_all<R: RemoteStore>(store: &R) -> Result<Vec<HarvestReport>, String> {
    let docs = store
        .list_documents(REPORTS_COLLECTION, "createdAt", true, None)
        .await?;
    Ok(decode_reports(docs))
}

fn decode_reports(docs: Vec<Value>) -> Vec<HarvestReport> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value::<HarvestReport>(doc) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!("dropping malformed harvest report document: {e}");
                None
            }
        })
        .collect()
}

// ===========================================================================
// Tests
// ===========================================================================
