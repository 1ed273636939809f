//! BerryTrack - Tauri v2 backend.
//!
//! Registers the IPC command handlers the mobile frontend calls via
//! `invoke()`. The domain modules hold the actual flows: offline report
//! staging, the queue drain, catalog/calendar snapshots, inventory, and
//! personnel. Screens and navigation live entirely in the frontend.

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod auth;
mod catalog;
mod commands;
mod db;
mod diagnostics;
mod events;
mod inventory;
mod media;
mod offline;
#[cfg(test)]
mod remote_mock;
mod reports;
mod storage;
mod sync;
mod users;
mod yield_report;

/// Seconds between connectivity probes for the offline banner.
const CONNECTIVITY_MONITOR_INTERVAL_SECS: u64 = 20;

// ============================================================================
// App entry point
// ============================================================================

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize structured logging (console + rolling file)
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,berrytrack_lib=debug"));

    // Prune old log files before setting up the appender
    diagnostics::prune_old_logs();

    let log_dir = diagnostics::get_log_dir();
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, "berrytrack");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // Keep the guard alive for the lifetime of the app; dropping it flushes
    // logs, and the app runs until process exit anyway.
    std::mem::forget(_guard);

    info!("Starting BerryTrack v{}", env!("CARGO_PKG_VERSION"));

    tauri::Builder::default()
        .setup(|app| {
            use std::sync::Arc;
            use tauri::Manager;

            let app_data_dir = app
                .path()
                .app_data_dir()
                .expect("Failed to get app data dir");

            let db_state = db::init(&app_data_dir).expect("Failed to initialize database");
            app.manage(db_state);

            // Session state: created at login, destroyed at logout
            app.manage(auth::SessionState::new());

            // Drain guard, shared between the sync command and status reads
            app.manage(Arc::new(sync::SyncState::new()));

            // Connectivity change events for the offline banner. The capture
            // and drain flows probe on their own; this only feeds the UI.
            sync::start_connectivity_monitor(
                app.handle().clone(),
                CONNECTIVITY_MONITOR_INTERVAL_SECS,
            );

            info!("Database, session, and sync state registered");
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // App lifecycle
            commands::runtime::app_get_version,
            // Auth
            commands::auth::auth_login,
            commands::auth::auth_logout,
            commands::auth::auth_get_current_session,
            commands::auth::auth_has_permission,
            commands::auth::auth_track_activity,
            // Settings
            commands::settings::settings_is_configured,
            commands::settings::settings_get_full_config,
            commands::settings::settings_update_credentials,
            commands::settings::settings_factory_reset,
            commands::settings::settings_test_connectivity,
            // Catalog
            commands::catalog::catalog_fetch,
            commands::catalog::parcel_create,
            commands::catalog::parcel_delete,
            // Inventory
            commands::inventory::inventory_list,
            commands::inventory::inventory_create_material,
            commands::inventory::inventory_add_stock,
            // Harvest reports
            commands::reports::report_submit,
            commands::reports::reports_recent,
            commands::reports::yield_get_summary,
            commands::reports::yield_export_html,
            // Sync
            commands::sync::sync_get_status,
            commands::sync::sync_get_network_status,
            commands::sync::sync_drain,
            // Calendar
            commands::events::events_fetch,
            commands::events::event_create,
            commands::events::event_delete,
            commands::events::event_cycle_status,
            // Personnel
            commands::users::user_list,
            commands::users::user_create,
            commands::users::user_update,
            commands::users::user_set_password,
            commands::users::user_delete,
            // Diagnostics
            commands::diagnostics::diagnostics_get_about,
            commands::diagnostics::diagnostics_get_system_health,
            commands::diagnostics::diagnostics_export,
        ])
        .run(tauri::generate_context!())
        .expect("error while running BerryTrack");
}
