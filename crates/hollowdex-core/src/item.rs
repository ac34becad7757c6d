// ABOUTME: Defines the Item record mirrored into store documents.
// ABOUTME: Items carry an id, a name, and free-form type-specific attributes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entity record. Identity is `id`, unique within a collection. All
/// type-specific fields (faction, rarity, image, ...) live in `attributes`
/// and serialize flat alongside `id` and `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Item {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            attributes: Map::new(),
        }
    }

    /// Builder-style attribute setter, mostly for seeding and tests.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// A string attribute, or None when absent or not a string.
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}
