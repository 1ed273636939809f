//! Diagnostics for BerryTrack.
//!
//! About info for the profile screen, a system-health snapshot (offline
//! queue depth, last drain, database size), a zip support bundle for the
//! help desk, and the log-rotation helpers `lib.rs` uses at startup.

use crate::db::DbState;
use crate::offline;
use serde_json::{json, Value};
use std::fs;
use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Maximum number of log files to retain.
pub const MAX_LOG_FILES: usize = 10;

/// Maximum size per log file included in the support bundle (5 MB).
pub const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;

// ---------------------------------------------------------------------------
// About info
// ---------------------------------------------------------------------------

/// Returns version, build timestamp, git SHA, and platform info.
pub fn get_about_info() -> Value {
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "buildTimestamp": env!("BUILD_TIMESTAMP"),
        "gitSha": env!("BUILD_GIT_SHA"),
        "platform": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
    })
}

// ---------------------------------------------------------------------------
// System health
// ---------------------------------------------------------------------------

/// Snapshot for the profile screen's support section.
pub fn get_system_health(db: &DbState) -> Result<Value, String> {
    let (schema_version, last_drain, drain_count) = {
        let conn = db.conn.lock().map_err(|e| e.to_string())?;

        let schema_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        let last_drain: Option<String> = conn
            .query_row(
                "SELECT finished_at FROM sync_history ORDER BY started_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .ok();

        let drain_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sync_history", [], |row| row.get(0))
            .unwrap_or(0);

        (schema_version, last_drain, drain_count)
    }; // lock released before offline:: helpers take their own

    let db_size = fs::metadata(&db.db_path).map(|m| m.len()).unwrap_or(0);

    Ok(json!({
        "schemaVersion": schema_version,
        "pendingReports": offline::queue_len(db),
        "totalSynced": offline::total_synced(db),
        "lastDrain": last_drain,
        "drainCount": drain_count,
        "dbSizeBytes": db_size,
    }))
}

// ---------------------------------------------------------------------------
// Support bundle
// ---------------------------------------------------------------------------

/// Collects diagnostics data and writes a zip file to the given directory.
/// Returns the path to the zip file.
pub fn export_diagnostics(db: &DbState, output_dir: &Path) -> Result<String, String> {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string();
    let zip_name = format!("berrytrack-diagnostics-{timestamp}.zip");
    let zip_path = output_dir.join(&zip_name);

    fs::create_dir_all(output_dir).map_err(|e| format!("create export dir: {e}"))?;
    let file = fs::File::create(&zip_path)
        .map_err(|e| format!("Failed to create diagnostics zip: {e}"))?;
    let mut zip = zip::ZipWriter::new(file);

    let zip_options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("about.json", zip_options)
        .map_err(|e| e.to_string())?;
    zip.write_all(
        serde_json::to_string_pretty(&get_about_info())
            .unwrap_or_default()
            .as_bytes(),
    )
    .map_err(|e| e.to_string())?;

    let health = get_system_health(db)?;
    zip.start_file("system_health.json", zip_options)
        .map_err(|e| e.to_string())?;
    zip.write_all(
        serde_json::to_string_pretty(&health)
            .unwrap_or_default()
            .as_bytes(),
    )
    .map_err(|e| e.to_string())?;

    // Recent drain history
    let history = {
        let conn = db.conn.lock().map_err(|e| e.to_string())?;
        let mut rows: Vec<Value> = Vec::new();
        if let Ok(mut stmt) = conn.prepare(
            "SELECT started_at, finished_at, attempted, synced, failed
             FROM sync_history ORDER BY started_at DESC LIMIT 20",
        ) {
            if let Ok(mapped) = stmt.query_map([], |row| {
                Ok(json!({
                    "startedAt": row.get::<_, String>(0)?,
                    "finishedAt": row.get::<_, String>(1)?,
                    "attempted": row.get::<_, i64>(2)?,
                    "synced": row.get::<_, i64>(3)?,
                    "failed": row.get::<_, i64>(4)?,
                }))
            }) {
                rows.extend(mapped.flatten());
            }
        }
        json!(rows)
    };
    zip.start_file("sync_history.json", zip_options)
        .map_err(|e| e.to_string())?;
    zip.write_all(
        serde_json::to_string_pretty(&history)
            .unwrap_or_default()
            .as_bytes(),
    )
    .map_err(|e| e.to_string())?;

    // Log files, capped per file to keep the bundle manageable
    let log_dir = get_log_dir();
    if log_dir.exists() {
        if let Ok(entries) = fs::read_dir(&log_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                let is_log = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("berrytrack."));
                if is_log {
                    let fname = path
                        .file_name()
                        .unwrap_or_default()
                        .to_string_lossy()
                        .to_string();
                    if zip.start_file(format!("logs/{fname}"), zip_options).is_ok() {
                        if let Ok(f) = fs::File::open(&path) {
                            let mut buf = Vec::new();
                            let _ = f.take(MAX_LOG_SIZE).read_to_end(&mut buf);
                            let _ = zip.write_all(&buf);
                        }
                    }
                }
            }
        }
    }

    zip.finish().map_err(|e| e.to_string())?;

    Ok(zip_path.to_string_lossy().to_string())
}

// ---------------------------------------------------------------------------
// Log rotation helpers
// ---------------------------------------------------------------------------

/// Returns the log directory path (same location used by lib.rs).
pub fn get_log_dir() -> PathBuf {
    let base = std::env::var("LOCALAPPDATA")
        .or_else(|_| std::env::var("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            #[cfg(target_os = "windows")]
            {
                PathBuf::from(std::env::var("USERPROFILE").unwrap_or_else(|_| ".".into()))
                    .join("AppData")
                    .join("Local")
            }
            #[cfg(not(target_os = "windows"))]
            {
                PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
                    .join(".local")
                    .join("share")
            }
        });
    base.join("app.berrytrack.mobile").join("logs")
}

/// Prune old log files, keeping only the most recent `MAX_LOG_FILES`.
pub fn prune_old_logs() {
    let log_dir = get_log_dir();
    if !log_dir.exists() {
        return;
    }

    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    if let Ok(entries) = fs::read_dir(&log_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if name.starts_with("berrytrack.") {
                        let modified = entry
                            .metadata()
                            .ok()
                            .and_then(|m| m.modified().ok())
                            .unwrap_or(std::time::UNIX_EPOCH);
                        log_files.push((path, modified));
                    }
                }
            }
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to prune log file {}: {e}", path.display());
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_about_info_has_required_fields() {
        let info = get_about_info();
        assert!(info.get("version").is_some());
        assert!(info.get("buildTimestamp").is_some());
        assert!(info.get("gitSha").is_some());
        assert!(info.get("platform").is_some());
    }

    #[test]
    fn test_log_dir_is_stable() {
        let d1 = get_log_dir();
        let d2 = get_log_dir();
        assert_eq!(d1, d2);
        assert!(d1.to_string_lossy().contains("app.berrytrack.mobile"));
    }

    #[test]
    fn test_system_health_with_empty_db() {
        let dir = std::env::temp_dir().join(format!("diag_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let db_state = crate::db::init(&dir).unwrap();

        let health = get_system_health(&db_state).unwrap();
        assert!(health.get("schemaVersion").is_some());
        assert_eq!(
            health.get("pendingReports").and_then(|v| v.as_u64()),
            Some(0)
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_export_diagnostics_writes_zip() {
        let dir = std::env::temp_dir().join(format!("diag_export_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let db_state = crate::db::init(&dir).unwrap();

        let zip_path = export_diagnostics(&db_state, &dir).unwrap();
        assert!(std::path::Path::new(&zip_path).exists());
        assert!(zip_path.contains("berrytrack-diagnostics-"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
