//! IPC command handlers, grouped by domain. Thin wrappers over the domain
//! modules; payload parsing and state extraction happen here.

pub mod auth;
pub mod catalog;
pub mod diagnostics;
pub mod events;
pub mod inventory;
pub mod reports;
pub mod runtime;
pub mod settings;
pub mod sync;
pub mod users;

use crate::api::CloudStore;
use crate::media::{MediaHost, MediaUploader, NullMediaUploader};

/// Either the configured media host or the always-failing stand-in. The
/// flows treat a failed upload as "no photo", so a missing media config
/// degrades instead of blocking the report.
pub(crate) enum AnyMediaUploader {
    Host(MediaHost),
    Null(NullMediaUploader),
}

impl MediaUploader for AnyMediaUploader {
    async fn upload_photo(&self, local_path: &str) -> Result<String, String> {
        match self {
            AnyMediaUploader::Host(host) => host.upload_photo(local_path).await,
            AnyMediaUploader::Null(null) => null.upload_photo(local_path).await,
        }
    }
}

pub(crate) fn cloud_store() -> Result<CloudStore, String> {
    CloudStore::from_credentials()
}

pub(crate) fn media_uploader() -> AnyMediaUploader {
    match MediaHost::from_credentials() {
        Ok(host) => AnyMediaUploader::Host(host),
        Err(_) => AnyMediaUploader::Null(NullMediaUploader),
    }
}
