//! Packing-material inventory.
//!
//! Materials carry a remote stock counter. Receiving stock and the harvest
//! decrement both go through the store's atomic increment so concurrent
//! devices never lose an adjustment; there is deliberately no lower bound,
//! so over-reported harvests surface as negative stock instead of vanishing.

use serde_json::Value;
use tracing::info;

use crate::api::RemoteStore;
use crate::catalog::{Material, MATERIALS_COLLECTION};

/// List materials with stock, ordered by name.
pub async fn list_materials<R: RemoteStore>(store: &R) -> Result<Vec<Material>, String> {
    let docs = store
        .list_documents(MATERIALS_COLLECTION, "name", false, None)
        .await?;
    Ok(docs
        .into_iter()
        .filter_map(|doc| serde_json::from_value::<Material>(doc).ok())
        .collect())
}

/// Create a material. Stock starts at zero; it only moves through
/// `add_stock` and the harvest decrement.
pub async fn create_material<R: RemoteStore>(store: &R, name: &str) -> Result<String, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Material name is required".to_string());
    }
    let id = store
        .create_document(
            MATERIALS_COLLECTION,
            &serde_json::json!({ "name": name, "stock": 0 }),
        )
        .await?;
    info!(material_id = %id, "material created");
    Ok(id)
}

/// Receive stock for a material.
pub async fn add_stock<R: RemoteStore>(
    store: &R,
    material_id: &str,
    quantity: i64,
) -> Result<(), String> {
    if quantity <= 0 {
        return Err("Stock quantity must be a positive number".to_string());
    }
    store
        .increment_field(MATERIALS_COLLECTION, material_id, "stock", quantity)
        .await?;
    info!(material_id, quantity, "stock received");
    Ok(())
}

/// Stock currently on hand for one material.
pub async fn stock_of<R: RemoteStore>(store: &R, material_id: &str) -> Result<i64, String> {
    let doc = store.get_document(MATERIALS_COLLECTION, material_id).await?;
    Ok(doc.get("stock").and_then(Value::as_i64).unwrap_or(0))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote_mock::MockRemoteStore;

    #[tokio::test]
    async fn test_create_material_starts_at_zero_stock() {
        let store = MockRemoteStore::new();
        let id = create_material(&store, "FreshKampo tray").await.expect("create");
        assert_eq!(stock_of(&store, &id).await.expect("stock"), 0);
    }

    #[tokio::test]
    async fn test_add_stock_rejects_non_positive_quantities() {
        let store = MockRemoteStore::new();
        let id = create_material(&store, "HEB clamshell").await.expect("create");

        assert!(add_stock(&store, &id, 0).await.is_err());
        assert!(add_stock(&store, &id, -5).await.is_err());

        add_stock(&store, &id, 40).await.expect("add");
        add_stock(&store, &id, 2).await.expect("add more");
        assert_eq!(stock_of(&store, &id).await.expect("stock"), 42);
    }

    #[tokio::test]
    async fn test_list_materials_is_name_ordered() {
        let store = MockRemoteStore::new();
        create_material(&store, "Zeta tray").await.expect("create");
        create_material(&store, "Alpha clamshell").await.expect("create");

        let materials = list_materials(&store).await.expect("list");
        assert_eq!(materials[0].name, "Alpha clamshell");
        assert_eq!(materials[1].name, "Zeta tray");
    }
}
