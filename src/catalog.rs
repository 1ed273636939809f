//! Parcel and material reference lists.
//!
//! The capture form's selectors are populated from the remote `parcels` and
//! `materials` collections when the device is online; every successful fetch
//! refreshes the offline snapshot, and offline sessions read the snapshot
//! instead. Remote documents are validated into typed records at the
//! boundary; malformed documents are dropped with a logged error rather than
//! trusted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::api::RemoteStore;
use crate::db::DbState;
use crate::offline;

pub const PARCELS_COLLECTION: &str = "parcels";
pub const MATERIALS_COLLECTION: &str = "materials";

/// A crop parcel (form selector entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parcel {
    pub id: String,
    pub name: String,
}

/// A packing material with its remaining stock. Stock may legitimately go
/// negative: the remote decrement applies no lower bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub stock: i64,
}

/// Catalog fetch result handed to the frontend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogBundle {
    pub parcels: Vec<Parcel>,
    pub materials: Vec<Material>,
    pub is_offline: bool,
}

// ---------------------------------------------------------------------------
// Boundary validation
// ---------------------------------------------------------------------------

fn decode_parcels(docs: Vec<Value>) -> Vec<Parcel> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value::<Parcel>(doc) {
            Ok(p) if !p.id.is_empty() && !p.name.trim().is_empty() => Some(p),
            Ok(p) => {
                warn!(id = %p.id, "dropping parcel document with empty fields");
                None
            }
            Err(e) => {
                warn!("dropping malformed parcel document: {e}");
                None
            }
        })
        .collect()
}

fn decode_materials(docs: Vec<Value>) -> Vec<Material> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value::<Material>(doc) {
            Ok(m) if !m.id.is_empty() && !m.name.trim().is_empty() => Some(m),
            Ok(m) => {
                warn!(id = %m.id, "dropping material document with empty fields");
                None
            }
            Err(e) => {
                warn!("dropping malformed material document: {e}");
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Fetch (online / offline)
// ---------------------------------------------------------------------------

/// Load both reference lists.
///
/// Online: fetch both collections ordered by name, refresh the offline
/// snapshot, and return the fresh copies. A remote failure propagates — the
/// caller surfaces it as the usual single alert.
///
/// Offline: return the last-known-good snapshot (possibly empty, possibly
/// arbitrarily stale — no version is tracked).
pub async fn fetch_catalogs<R: RemoteStore>(
    db: &DbState,
    store: &R,
    online: bool,
) -> Result<CatalogBundle, String> {
    if !online {
        let (parcels, materials) = offline::load_catalog_snapshot(db);
        info!(
            parcels = parcels.len(),
            materials = materials.len(),
            "serving catalogs from offline snapshot"
        );
        return Ok(CatalogBundle {
            parcels,
            materials,
            is_offline: true,
        });
    }

    let parcel_docs = store
        .list_documents(PARCELS_COLLECTION, "name", false, None)
        .await?;
    let material_docs = store
        .list_documents(MATERIALS_COLLECTION, "name", false, None)
        .await?;

    let parcels = decode_parcels(parcel_docs);
    let materials = decode_materials(material_docs);

    if let Err(e) = offline::save_catalog_snapshot(db, &parcels, &materials) {
        warn!("catalog snapshot refresh failed: {e}");
    }

    Ok(CatalogBundle {
        parcels,
        materials,
        is_offline: false,
    })
}

// ---------------------------------------------------------------------------
// Parcel management
// ---------------------------------------------------------------------------

/// Create a parcel. Returns the store-assigned id.
pub async fn create_parcel<R: RemoteStore>(store: &R, name: &str) -> Result<String, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Parcel name is required".to_string());
    }
    let id = store
        .create_document(PARCELS_COLLECTION, &serde_json::json!({ "name": name }))
        .await?;
    info!(parcel_id = %id, "parcel created");
    Ok(id)
}

pub async fn delete_parcel<R: RemoteStore>(store: &R, id: &str) -> Result<(), String> {
    store.delete_document(PARCELS_COLLECTION, id).await?;
    info!(parcel_id = %id, "parcel deleted");
    Ok(())
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

    #[tokio::test]
    async fn test_online_fetch_refreshes_snapshot() {
        let db = test_db();
        let store = MockRemoteStore::new();
        store.seed(
            PARCELS_COLLECTION,
            serde_json::json!({ "name": "North field" }),
        );
        store.seed(
            MATERIALS_COLLECTION,
            serde_json::json!({ "name": "HEB clamshell", "stock": 100 }),
        );

        let bundle = fetch_catalogs(&db, &store, true).await.expect("fetch");
        assert!(!bundle.is_offline);
        assert_eq!(bundle.parcels.len(), 1);
        assert_eq!(bundle.materials[0].stock, 100);

        // Snapshot was refreshed and now serves offline reads
        let offline_bundle = fetch_catalogs(&db, &store, false).await.expect("offline");
        assert!(offline_bundle.is_offline);
        assert_eq!(offline_bundle.parcels, bundle.parcels);
        assert_eq!(offline_bundle.materials, bundle.materials);
    }

    #[tokio::test]
    async fn test_offline_fetch_with_no_snapshot_is_empty() {
        let db = test_db();
        let store = MockRemoteStore::new();

        let bundle = fetch_catalogs(&db, &store, false).await.expect("fetch");
        assert!(bundle.is_offline);
        assert!(bundle.parcels.is_empty());
        assert!(bundle.materials.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_documents_are_dropped() {
        let db = test_db();
        let store = MockRemoteStore::new();
        store.seed(PARCELS_COLLECTION, serde_json::json!({ "name": "Good" }));
        store.seed(PARCELS_COLLECTION, serde_json::json!({ "name": "   " }));
        store.seed(PARCELS_COLLECTION, serde_json::json!({ "nombre": 7 }));

        let bundle = fetch_catalogs(&db, &store, true).await.expect("fetch");
        assert_eq!(bundle.parcels.len(), 1);
        assert_eq!(bundle.parcels[0].name, "Good");
    }

    #[tokio::test]
    async fn test_create_parcel_requires_name() {
        let store = MockRemoteStore::new();
        assert!(create_parcel(&store, "  ").await.is_err());

        let id = create_parcel(&store, "Creek rows").await.expect("create");
        assert!(!id.is_empty());
        assert_eq!(store.documents(PARCELS_COLLECTION).len(), 1);
    }
}
