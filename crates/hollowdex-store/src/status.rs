// ABOUTME: Introspection of the store files on both sides for status reporting.
// ABOUTME: Reports existence, size, modification time, and declared metadata per collection.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;

use chrono::{DateTime, Utc};
use hollowdex_core::{Collection, Side};
use serde::Serialize;

use crate::document::DocumentStore;

/// What is known about one store file.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatus {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_started: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Status of every collection on both sides.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingStatus {
    /// True only when every collection has a published store file.
    pub initialized: bool,
    /// True only when every collection has a draft file.
    pub session_active: bool,
    pub last_check: DateTime<Utc>,
    pub web: BTreeMap<Collection, FileStatus>,
    pub admin: BTreeMap<Collection, FileStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_count: Option<usize>,
}

/// Inspect every store file. Problems with individual files are recorded
/// in their `error` field rather than failing the whole report.
pub fn collect_status(store: &DocumentStore) -> StagingStatus {
    let mut web = BTreeMap::new();
    let mut admin = BTreeMap::new();

    for collection in Collection::ALL {
        web.insert(collection, file_status(store, Side::Web, collection));
        admin.insert(collection, file_status(store, Side::Admin, collection));
    }

    let initialized = web.values().all(|s| s.exists);
    let session_active = admin.values().all(|s| s.exists);

    let backup_count = match store.backups().list() {
        Ok(entries) => Some(entries.len()),
        Err(e) => {
            tracing::warn!("could not list backups for status: {}", e);
            None
        }
    };

    StagingStatus {
        initialized,
        session_active,
        last_check: Utc::now(),
        web,
        admin,
        backup_count,
    }
}

fn file_status(store: &DocumentStore, side: Side, collection: Collection) -> FileStatus {
    let path = store.layout().document_path(side, collection);
    let metadata = match fs::metadata(&path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return FileStatus::default(),
        Err(e) => {
            return FileStatus {
                exists: true,
                error: Some(e.to_string()),
                ..FileStatus::default()
            };
        }
    };

    let mut status = FileStatus {
        exists: true,
        size: Some(metadata.len()),
        last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        ..FileStatus::default()
    };

    match store.load(side, collection) {
        Ok(Some(doc)) => {
            status.version = Some(doc.version);
            status.count = Some(doc.count);
            status.last_updated = Some(doc.last_updated);
            status.session_started = doc.session_started;
        }
        // Deleted between the metadata call and the read.
        Ok(None) => return FileStatus::default(),
        Err(e) => status.error = Some(e.to_string()),
    }

    status
}
