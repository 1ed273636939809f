//! In-memory `RemoteStore`/`MediaUploader` doubles for tests.
//!
//! The mock store keeps collections as JSON documents behind a mutex,
//! assigns sequential ids, and can be told to fail the Nth create so drain
//! tests can exercise the mid-pass failure paths.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::api::RemoteStore;
use crate::media::MediaUploader;

#[derive(Default)]
pub struct MockRemoteStore {
    collections: Mutex<HashMap<String, Vec<Value>>>,
    next_id: AtomicU64,
    creates_attempted: AtomicU64,
    /// Fail the create attempt with this zero-based ordinal.
    pub fail_create_at: Mutex<Option<u64>>,
}

impl MockRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document directly (no failure accounting). Returns its id.
    pub fn seed(&self, collection: &str, mut doc: Value) -> String {
        let id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        if let Some(obj) = doc.as_object_mut() {
            obj.insert("id".to_string(), Value::String(id.clone()));
        }
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        id
    }

    /// Current contents of a collection.
    pub fn documents(&self, collection: &str) -> Vec<Value> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Numeric field of a document, for stock assertions.
    pub fn field_i64(&self, collection: &str, id: &str, field: &str) -> Option<i64> {
        self.documents(collection)
            .iter()
            .find(|d| d.get("id").and_then(Value::as_str) == Some(id))
            .and_then(|d| d.get(field))
            .and_then(Value::as_i64)
    }

    fn sort_key(doc: &Value, field: &str) -> String {
        doc.get(field)
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default()
    }
}

impl RemoteStore for MockRemoteStore {
    async fn create_document(&self, collection: &str, doc: &Value) -> Result<String, String> {
        let attempt = self.creates_attempted.fetch_add(1, Ordering::SeqCst);
        if *self.fail_create_at.lock().unwrap() == Some(attempt) {
            return Err("Farm cloud server error (HTTP 503)".to_string());
        }
        Ok(self.seed(collection, doc.clone()))
    }

    async fn list_documents(
        &self,
        collection: &str,
        order_by: &str,
        descending: bool,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, String> {
        let mut docs = self.documents(collection);
        docs.sort_by_key(|d| Self::sort_key(d, order_by));
        if descending {
            docs.reverse();
        }
        if let Some(n) = limit {
            docs.truncate(n);
        }
        Ok(docs)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Value, String> {
        self.documents(collection)
            .into_iter()
            .find(|d| d.get("id").and_then(Value::as_str) == Some(id))
            .ok_or_else(|| format!("Cloud endpoint not found (HTTP 404): {collection}/{id}"))
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        patch: &Value,
    ) -> Result<(), String> {
        let mut collections = self.collections.lock().unwrap();
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| format!("Cloud endpoint not found (HTTP 404): {collection}"))?;
        let doc = docs
            .iter_mut()
            .find(|d| d.get("id").and_then(Value::as_str) == Some(id))
            .ok_or_else(|| format!("Cloud endpoint not found (HTTP 404): {collection}/{id}"))?;
        if let (Some(target), Some(fields)) = (doc.as_object_mut(), patch.as_object()) {
            for (k, v) in fields {
                target.insert(k.clone(), v.clone());
            }
        }
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), String> {
        let mut collections = self.collections.lock().unwrap();
        if let Some(docs) = collections.get_mut(collection) {
            docs.retain(|d| d.get("id").and_then(Value::as_str) != Some(id));
        }
        Ok(())
    }

    async fn increment_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), String> {
        let mut collections = self.collections.lock().unwrap();
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| format!("Cloud endpoint not found (HTTP 404): {collection}"))?;
        let doc = docs
            .iter_mut()
            .find(|d| d.get("id").and_then(Value::as_str) == Some(id))
            .ok_or_else(|| format!("Cloud endpoint not found (HTTP 404): {collection}/{id}"))?;
        let current = doc.get(field).and_then(Value::as_i64).unwrap_or(0);
        // No lower bound: the counter may go negative, as the real store allows
        if let Some(obj) = doc.as_object_mut() {
            obj.insert(field.to_string(), Value::from(current + delta));
        }
        Ok(())
    }
}

/// Media host double: records uploads, optionally fails them all.
#[derive(Default)]
pub struct MockMediaUploader {
    pub fail: bool,
    pub uploads: Mutex<Vec<String>>,
}

impl MockMediaUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl MediaUploader for MockMediaUploader {
    async fn upload_photo(&self, local_path: &str) -> Result<String, String> {
        if self.fail {
            return Err("Photo upload failed (HTTP 500): upload rejected".to_string());
        }
        self.uploads.lock().unwrap().push(local_path.to_string());
        let name = std::path::Path::new(local_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.jpg");
        Ok(format!("https://media.example.com/{name}"))
    }
}
