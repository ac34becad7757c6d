// ABOUTME: The bundled initial dataset used to seed published stores and the catalog.
// ABOUTME: Parsed from a JSON file compiled into the binary.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use crate::collection::Collection;
use crate::item::Item;

const BUNDLED_SEED: &str = include_str!("../seed/initial.json");

/// Errors that can occur while loading seed data.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("seed data is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Initial items per collection plus the lookup names (factions, roles,
/// rarities, ...) the catalog resolves foreign keys against.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub collections: BTreeMap<Collection, Vec<Item>>,
    #[serde(default)]
    pub lookups: BTreeMap<String, Vec<String>>,
}

impl SeedData {
    /// Load the dataset shipped with the crate.
    pub fn bundled() -> Result<Self, SeedError> {
        Self::from_json(BUNDLED_SEED)
    }

    pub fn from_json(json: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Items for one collection; empty when the dataset has none.
    pub fn items(&self, collection: Collection) -> Vec<Item> {
        self.collections.get(&collection).cloned().unwrap_or_default()
    }
}
