// ABOUTME: SQLite-backed catalog that is the system of record for entity rows and lookup names.
// ABOUTME: Provides create, update, delete, and list with resolved foreign-key display names.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use hollowdex_core::{Collection, Item, SeedData, StoreDocument};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::staging::{StagingError, StagingManager};

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("unknown lookup kind: {0}")]
    UnknownLookupKind(String),

    #[error("{kind} {name:?} does not exist")]
    UnknownLookup { kind: LookupKind, name: String },

    #[error("{kind} {name:?} already exists")]
    DuplicateLookup { kind: LookupKind, name: String },

    #[error("missing required field {0}")]
    MissingField(String),

    #[error("failed to mirror catalog into the published store: {0}")]
    Mirror(#[from] StagingError),
}

/// Reference tables that entity rows point at by id and display by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LookupKind {
    Faction,
    Role,
    Rarity,
    HsrElement,
    HsrPath,
    HsrRarity,
    HsrRelicType,
}

impl LookupKind {
    pub const ALL: [LookupKind; 7] = [
        LookupKind::Faction,
        LookupKind::Role,
        LookupKind::Rarity,
        LookupKind::HsrElement,
        LookupKind::HsrPath,
        LookupKind::HsrRarity,
        LookupKind::HsrRelicType,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LookupKind::Faction => "faction",
            LookupKind::Role => "role",
            LookupKind::Rarity => "rarity",
            LookupKind::HsrElement => "hsrElement",
            LookupKind::HsrPath => "hsrPath",
            LookupKind::HsrRarity => "hsrRarity",
            LookupKind::HsrRelicType => "hsrRelicType",
        }
    }
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LookupKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CatalogError::UnknownLookupKind(s.to_string()))
    }
}

/// One row of a lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lookup {
    pub id: i64,
    pub name: String,
}

/// A plain text column exposed under `key` in item JSON.
struct TextField {
    key: &'static str,
    column: &'static str,
}

/// A foreign key column, exposed in item JSON as the referenced name.
struct LookupField {
    key: &'static str,
    column: &'static str,
    kind: LookupKind,
}

/// Table layout for one collection. Every table also has `id`, `name`,
/// `image`, `created_at`, and `updated_at`.
struct EntitySchema {
    table: &'static str,
    default_image: &'static str,
    text_fields: &'static [TextField],
    lookup_fields: &'static [LookupField],
}

const ZZZ_IMAGE: &str = "/assets/zzz.jpg";
const HSR_IMAGE: &str = "/assets/hsr.jpg";

fn schema(collection: Collection) -> &'static EntitySchema {
    const AGENTS: EntitySchema = EntitySchema {
        table: "agents",
        default_image: ZZZ_IMAGE,
        text_fields: &[TextField { key: "element", column: "element" }],
        lookup_fields: &[
            LookupField { key: "faction", column: "faction_id", kind: LookupKind::Faction },
            LookupField { key: "role", column: "role_id", kind: LookupKind::Role },
            LookupField { key: "rarity", column: "rarity_id", kind: LookupKind::Rarity },
        ],
    };
    const SOUND_ENGINES: EntitySchema = EntitySchema {
        table: "sound_engines",
        default_image: ZZZ_IMAGE,
        text_fields: &[],
        lookup_fields: &[
            LookupField { key: "rarity", column: "rarity_id", kind: LookupKind::Rarity },
            LookupField { key: "role", column: "role_id", kind: LookupKind::Role },
        ],
    };
    const BUMBOS: EntitySchema = EntitySchema {
        table: "bumbos",
        default_image: ZZZ_IMAGE,
        text_fields: &[],
        lookup_fields: &[LookupField { key: "rarity", column: "rarity_id", kind: LookupKind::Rarity }],
    };
    const DRIVE_DISKS: EntitySchema = EntitySchema {
        table: "drive_disks",
        default_image: ZZZ_IMAGE,
        text_fields: &[TextField { key: "description", column: "description" }],
        lookup_fields: &[],
    };
    const HSR_CHARACTERS: EntitySchema = EntitySchema {
        table: "hsr_characters",
        default_image: HSR_IMAGE,
        text_fields: &[],
        lookup_fields: &[
            LookupField { key: "element", column: "element_id", kind: LookupKind::HsrElement },
            LookupField { key: "path", column: "path_id", kind: LookupKind::HsrPath },
            LookupField { key: "rarity", column: "rarity_id", kind: LookupKind::HsrRarity },
        ],
    };
    const HSR_CONES: EntitySchema = EntitySchema {
        table: "hsr_cones",
        default_image: HSR_IMAGE,
        text_fields: &[],
        lookup_fields: &[
            LookupField { key: "path", column: "path_id", kind: LookupKind::HsrPath },
            LookupField { key: "rarity", column: "rarity_id", kind: LookupKind::HsrRarity },
        ],
    };
    const HSR_RELICS: EntitySchema = EntitySchema {
        table: "hsr_relics",
        default_image: HSR_IMAGE,
        text_fields: &[
            TextField { key: "setName", column: "set_name" },
            TextField { key: "part", column: "part" },
        ],
        lookup_fields: &[LookupField { key: "type", column: "type_id", kind: LookupKind::HsrRelicType }],
    };

    match collection {
        Collection::Agents => &AGENTS,
        Collection::SoundEngines => &SOUND_ENGINES,
        Collection::Bumbos => &BUMBOS,
        Collection::DriveDisks => &DRIVE_DISKS,
        Collection::HsrCharacters => &HSR_CHARACTERS,
        Collection::HsrCones => &HSR_CONES,
        Collection::HsrRelics => &HSR_RELICS,
    }
}

fn create_table_sql(schema: &EntitySchema) -> String {
    let mut columns = vec![
        "id INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
        "name TEXT NOT NULL".to_string(),
        "image TEXT".to_string(),
    ];
    columns.extend(schema.text_fields.iter().map(|f| format!("{} TEXT", f.column)));
    columns.extend(
        schema
            .lookup_fields
            .iter()
            .map(|f| format!("{} INTEGER NOT NULL REFERENCES lookups(id)", f.column)),
    );
    columns.push("created_at TEXT NOT NULL".to_string());
    columns.push("updated_at TEXT NOT NULL".to_string());

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
        schema.table,
        columns.join(",\n    ")
    )
}

fn select_sql(schema: &EntitySchema) -> String {
    let mut columns = vec!["t.id".to_string(), "t.name".to_string(), "t.image".to_string()];
    columns.extend(schema.text_fields.iter().map(|f| format!("t.{}", f.column)));
    columns.extend((0..schema.lookup_fields.len()).map(|i| format!("l{i}.name")));

    let joins: Vec<String> = schema
        .lookup_fields
        .iter()
        .enumerate()
        .map(|(i, f)| format!("LEFT JOIN lookups l{i} ON l{i}.id = t.{}", f.column))
        .collect();

    format!(
        "SELECT {} FROM {} t {}",
        columns.join(", "),
        schema.table,
        joins.join(" ")
    )
}

fn non_empty_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// The relational system of record. Entity rows reference lookup rows by
/// id; listing resolves them back to display names.
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open or create a catalog database at the given path.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    /// An in-memory catalog, for tests and throwaway runs.
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CatalogError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS lookups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                name TEXT NOT NULL,
                UNIQUE(kind, name)
            );",
        )?;
        for collection in Collection::ALL {
            conn.execute_batch(&create_table_sql(schema(collection)))?;
        }
        Ok(Self { conn })
    }

    /// Simple connectivity probe for health checks.
    pub fn ping(&self) -> bool {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }

    /// Load the seed dataset if the catalog has never been populated.
    /// Returns true when seeding happened.
    pub fn seed_if_empty(&self, seed: &SeedData) -> Result<bool, CatalogError> {
        let lookups: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM lookups", [], |row| row.get(0))?;
        if lookups > 0 {
            return Ok(false);
        }

        self.conn.execute_batch("BEGIN;")?;
        match self.load_seed(seed) {
            Ok(()) => {
                self.conn.execute_batch("COMMIT;")?;
                tracing::info!("seeded catalog from bundled dataset");
                Ok(true)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK;");
                Err(e)
            }
        }
    }

    fn load_seed(&self, seed: &SeedData) -> Result<(), CatalogError> {
        for (kind_name, names) in &seed.lookups {
            let kind = match kind_name.parse::<LookupKind>() {
                Ok(kind) => kind,
                Err(_) => {
                    tracing::warn!("seed names unknown lookup kind {}, skipping", kind_name);
                    continue;
                }
            };
            for name in names {
                self.ensure_lookup(kind, name)?;
            }
        }

        for collection in Collection::ALL {
            let schema = schema(collection);
            for item in seed.items(collection) {
                for field in schema.lookup_fields {
                    if let Some(name) = item.attr_str(field.key) {
                        self.ensure_lookup(field.kind, name)?;
                    }
                }
                let mut fields = item.attributes.clone();
                fields.insert("name".to_string(), Value::String(item.name.clone()));
                self.create(collection, &fields)?;
            }
        }

        Ok(())
    }

    /// All rows of a lookup table, ordered by id.
    pub fn list_lookups(&self, kind: LookupKind) -> Result<Vec<Lookup>, CatalogError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM lookups WHERE kind = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![kind.as_str()], |row| {
            Ok(Lookup {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        let mut lookups = Vec::new();
        for row in rows {
            lookups.push(row?);
        }
        Ok(lookups)
    }

    /// Add a lookup name. Names are unique per kind.
    pub fn add_lookup(&self, kind: LookupKind, name: &str) -> Result<Lookup, CatalogError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::MissingField("name".to_string()));
        }
        if self.find_lookup(kind, name)?.is_some() {
            return Err(CatalogError::DuplicateLookup {
                kind,
                name: name.to_string(),
            });
        }

        self.conn.execute(
            "INSERT INTO lookups (kind, name) VALUES (?1, ?2)",
            params![kind.as_str(), name],
        )?;
        Ok(Lookup {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    fn ensure_lookup(&self, kind: LookupKind, name: &str) -> Result<i64, CatalogError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO lookups (kind, name) VALUES (?1, ?2)",
            params![kind.as_str(), name],
        )?;
        self.find_lookup(kind, name)?
            .ok_or_else(|| CatalogError::UnknownLookup {
                kind,
                name: name.to_string(),
            })
    }

    fn find_lookup(&self, kind: LookupKind, name: &str) -> Result<Option<i64>, CatalogError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM lookups WHERE kind = ?1 AND name = ?2",
                params![kind.as_str(), name],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn lookup_id_exists(&self, kind: LookupKind, id: i64) -> Result<bool, CatalogError> {
        Ok(self
            .conn
            .query_row(
                "SELECT 1 FROM lookups WHERE kind = ?1 AND id = ?2",
                params![kind.as_str(), id],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }

    /// Resolve a lookup field from `<key>Id` or, failing that, `<key>` by name.
    /// Returns Ok(None) when neither is given.
    fn resolve(
        &self,
        fields: &Map<String, Value>,
        field: &LookupField,
    ) -> Result<Option<i64>, CatalogError> {
        if let Some(id) = fields.get(&format!("{}Id", field.key)).and_then(Value::as_i64) {
            if self.lookup_id_exists(field.kind, id)? {
                return Ok(Some(id));
            }
            return Err(CatalogError::UnknownLookup {
                kind: field.kind,
                name: format!("#{id}"),
            });
        }

        match non_empty_str(fields, field.key) {
            Some(name) => match self.find_lookup(field.kind, name)? {
                Some(id) => Ok(Some(id)),
                None => Err(CatalogError::UnknownLookup {
                    kind: field.kind,
                    name: name.to_string(),
                }),
            },
            None => Ok(None),
        }
    }

    /// Insert a row. Every lookup field is required and must resolve.
    pub fn create(
        &self,
        collection: Collection,
        fields: &Map<String, Value>,
    ) -> Result<Item, CatalogError> {
        let schema = schema(collection);
        let name = non_empty_str(fields, "name")
            .ok_or_else(|| CatalogError::MissingField("name".to_string()))?;
        let image = non_empty_str(fields, "image").unwrap_or(schema.default_image);
        let now = Utc::now().to_rfc3339();

        let mut columns = vec!["name", "image"];
        let mut values = vec![SqlValue::from(name.to_string()), SqlValue::from(image.to_string())];

        for field in schema.text_fields {
            columns.push(field.column);
            values.push(
                non_empty_str(fields, field.key)
                    .map(|s| SqlValue::from(s.to_string()))
                    .unwrap_or(SqlValue::Null),
            );
        }
        for field in schema.lookup_fields {
            let id = self
                .resolve(fields, field)?
                .ok_or_else(|| CatalogError::MissingField(field.key.to_string()))?;
            columns.push(field.column);
            values.push(SqlValue::from(id));
        }
        columns.extend(["created_at", "updated_at"]);
        values.push(SqlValue::from(now.clone()));
        values.push(SqlValue::from(now));

        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            schema.table,
            columns.join(", "),
            placeholders.join(", ")
        );
        self.conn.execute(&sql, params_from_iter(values))?;

        let id = self.conn.last_insert_rowid();
        tracing::info!("created {} #{}", collection, id);
        self.get(collection, id)?
            .ok_or_else(|| CatalogError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Update the given fields of a row. Returns None if the row does not
    /// exist. Empty strings keep the stored value; lookup names that do not
    /// resolve are ignored.
    pub fn update(
        &self,
        collection: Collection,
        id: i64,
        fields: &Map<String, Value>,
    ) -> Result<Option<Item>, CatalogError> {
        if self.get(collection, id)?.is_none() {
            return Ok(None);
        }

        let schema = schema(collection);
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        for key in ["name", "image"] {
            if let Some(value) = non_empty_str(fields, key) {
                sets.push(key);
                values.push(SqlValue::from(value.to_string()));
            }
        }
        for field in schema.text_fields {
            if let Some(value) = non_empty_str(fields, field.key) {
                sets.push(field.column);
                values.push(SqlValue::from(value.to_string()));
            }
        }
        for field in schema.lookup_fields {
            match self.resolve(fields, field) {
                Ok(Some(lookup_id)) => {
                    sets.push(field.column);
                    values.push(SqlValue::from(lookup_id));
                }
                Ok(None) => {}
                Err(CatalogError::UnknownLookup { kind, name }) => {
                    tracing::warn!("ignoring unknown {} {:?} on {} #{}", kind, name, collection, id);
                }
                Err(e) => return Err(e),
            }
        }
        sets.push("updated_at");
        values.push(SqlValue::from(Utc::now().to_rfc3339()));

        let assignments: Vec<String> = sets
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ?{}", i + 1))
            .collect();
        values.push(SqlValue::from(id));
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            schema.table,
            assignments.join(", "),
            values.len()
        );
        self.conn.execute(&sql, params_from_iter(values))?;

        tracing::info!("updated {} #{}", collection, id);
        self.get(collection, id)
    }

    /// Delete a row. Returns false if it did not exist.
    pub fn delete(&self, collection: Collection, id: i64) -> Result<bool, CatalogError> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", schema(collection).table);
        let removed = self.conn.execute(&sql, params![id])?;
        if removed > 0 {
            tracing::info!("deleted {} #{}", collection, id);
        }
        Ok(removed > 0)
    }

    /// One row as an item, or None.
    pub fn get(&self, collection: Collection, id: i64) -> Result<Option<Item>, CatalogError> {
        let schema = schema(collection);
        let sql = format!("{} WHERE t.id = ?1", select_sql(schema));
        Ok(self
            .conn
            .query_row(&sql, params![id], |row| row_to_item(schema, row))
            .optional()?)
    }

    /// Every row of a collection as items with lookup names resolved,
    /// ordered by id.
    pub fn list_all(&self, collection: Collection) -> Result<Vec<Item>, CatalogError> {
        let schema = schema(collection);
        let sql = format!("{} ORDER BY t.id", select_sql(schema));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row_to_item(schema, row))?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// Re-derive a collection's published store from the catalog.
    pub fn mirror_to(
        &self,
        staging: &StagingManager,
        collection: Collection,
    ) -> Result<StoreDocument, CatalogError> {
        let items = self.list_all(collection)?;
        Ok(staging.replace_published(collection, items)?)
    }
}

fn row_to_item(schema: &EntitySchema, row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
    let mut item = Item::new(row.get(0)?, row.get::<_, String>(1)?);

    if let Some(image) = row.get::<_, Option<String>>(2)? {
        item.attributes.insert("image".to_string(), Value::String(image));
    }

    let mut index = 3;
    for field in schema.text_fields {
        if let Some(value) = row.get::<_, Option<String>>(index)? {
            item.attributes.insert(field.key.to_string(), Value::String(value));
        }
        index += 1;
    }
    for field in schema.lookup_fields {
        let name = row.get::<_, Option<String>>(index)?.unwrap_or_default();
        item.attributes.insert(field.key.to_string(), Value::String(name));
        index += 1;
    }

    Ok(item)
}
