// ABOUTME: Defines StoreDocument, the on-disk JSON envelope for one collection on one side.
// ABOUTME: Construction always derives count from the item list so the two never disagree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::{Collection, Side};
use crate::item::Item;

/// Format version written into every store document.
pub const STORE_VERSION: &str = "1.0.0";

/// One collection's items plus metadata, persisted as a single JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDocument {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    pub data_type: Collection,
    pub count: usize,
    pub source: Side,
    #[serde(default)]
    pub data: Vec<Item>,
    /// Set on draft documents when the admin session that created them began.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_started: Option<DateTime<Utc>>,
    /// Set on published documents written by a draft sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_from_admin: Option<DateTime<Utc>>,
}

impl StoreDocument {
    /// Build a document stamped with the current time.
    pub fn new(side: Side, collection: Collection, items: Vec<Item>) -> Self {
        Self {
            version: STORE_VERSION.to_string(),
            last_updated: Utc::now(),
            data_type: collection,
            count: items.len(),
            source: side,
            data: items,
            session_started: None,
            last_sync_from_admin: None,
        }
    }

    /// True when the declared count matches the number of items.
    pub fn count_matches(&self) -> bool {
        self.count == self.data.len()
    }
}
