// ABOUTME: Read/write primitive for one collection's store document on one side.
// ABOUTME: Writes snapshot the previous file into the backup archive, then replace it atomically.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use hollowdex_core::{Collection, Item, Side, StoreDocument};
use thiserror::Error;
use ulid::Ulid;

use crate::backup::{BackupArchive, BackupError, BackupTag};

/// Errors that can occur while reading or writing a store document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("store file {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("backup failed: {0}")]
    Backup(#[from] BackupError),
}

impl DocumentError {
    fn write(path: &Path, source: std::io::Error) -> Self {
        DocumentError::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Directory layout under the storage root: `web/`, `admin/`, `backup/`.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn side_dir(&self, side: Side) -> PathBuf {
        self.root.join(side.as_str())
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join("backup")
    }

    /// Path of the store file for (side, collection).
    pub fn document_path(&self, side: Side, collection: Collection) -> PathBuf {
        self.side_dir(side).join(format!("{collection}.json"))
    }
}

/// Store documents for both sides, plus the archive their overwrites are
/// backed up into.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    layout: StoreLayout,
    backups: BackupArchive,
}

impl DocumentStore {
    /// Open the store rooted at `root`, creating the side and backup
    /// directories if they do not exist.
    pub fn open(root: PathBuf, backup_retain: Option<usize>) -> Result<Self, DocumentError> {
        let layout = StoreLayout::new(root);
        for side in [Side::Web, Side::Admin] {
            let dir = layout.side_dir(side);
            fs::create_dir_all(&dir).map_err(|e| DocumentError::write(&dir, e))?;
        }
        let backups = BackupArchive::open(layout.backup_dir(), backup_retain)?;
        Ok(Self { layout, backups })
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn backups(&self) -> &BackupArchive {
        &self.backups
    }

    pub fn exists(&self, side: Side, collection: Collection) -> bool {
        self.layout.document_path(side, collection).is_file()
    }

    /// Load the full document, or None if the file does not exist.
    pub fn load(
        &self,
        side: Side,
        collection: Collection,
    ) -> Result<Option<StoreDocument>, DocumentError> {
        let path = self.layout.document_path(side, collection);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(DocumentError::Read { path, source }),
        };

        let doc: StoreDocument = serde_json::from_slice(&bytes)
            .map_err(|source| DocumentError::Corrupt { path: path.clone(), source })?;

        if !doc.count_matches() {
            tracing::warn!(
                "{} declares count {} but holds {} items; trusting data",
                path.display(),
                doc.count,
                doc.data.len()
            );
        }

        Ok(Some(doc))
    }

    /// The items of a collection. A missing file reads as an empty list,
    /// never as seed data; a corrupt file is an error.
    pub fn read(&self, side: Side, collection: Collection) -> Result<Vec<Item>, DocumentError> {
        Ok(self
            .load(side, collection)?
            .map(|doc| doc.data)
            .unwrap_or_default())
    }

    /// Build a fresh document for `items` and persist it.
    pub fn write(
        &self,
        side: Side,
        collection: Collection,
        items: Vec<Item>,
    ) -> Result<StoreDocument, DocumentError> {
        let doc = StoreDocument::new(side, collection, items);
        self.save(&doc)?;
        Ok(doc)
    }

    /// Persist a prepared document at the location its `source` and
    /// `data_type` name. An existing file is snapshotted first.
    pub fn save(&self, doc: &StoreDocument) -> Result<(), DocumentError> {
        let side = doc.source;
        let collection = doc.data_type;
        let path = self.layout.document_path(side, collection);

        if path.exists() {
            self.backups.snapshot(backup_tag(side), collection, &path)?;
        }

        let json = serde_json::to_string_pretty(doc)?;
        atomic_write(&path, json.as_bytes())?;

        tracing::info!(
            "saved {} {} ({} items)",
            side,
            collection,
            doc.data.len()
        );
        Ok(())
    }

    /// Snapshot then delete a store file. Returns false if there was
    /// nothing to remove.
    pub fn remove(
        &self,
        side: Side,
        collection: Collection,
        tag: BackupTag,
    ) -> Result<bool, DocumentError> {
        let path = self.layout.document_path(side, collection);
        if !path.exists() {
            return Ok(false);
        }

        self.backups.snapshot(tag, collection, &path)?;
        fs::remove_file(&path).map_err(|e| DocumentError::write(&path, e))?;
        Ok(true)
    }
}

fn backup_tag(side: Side) -> BackupTag {
    match side {
        Side::Web => BackupTag::Web,
        Side::Admin => BackupTag::Admin,
    }
}

/// Write to a uniquely named temp file beside `path`, fsync, then rename
/// over the target.
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), DocumentError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("store");
    let tmp_path = path.with_file_name(format!("{}.{}.tmp", file_name, Ulid::new()));

    let mut file = File::create(&tmp_path).map_err(|e| DocumentError::write(&tmp_path, e))?;
    file.write_all(data)
        .map_err(|e| DocumentError::write(&tmp_path, e))?;
    file.sync_all()
        .map_err(|e| DocumentError::write(&tmp_path, e))?;
    drop(file);

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(DocumentError::write(path, e));
    }

    // Best-effort: the rename already succeeded.
    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> DocumentStore {
        DocumentStore::open(dir.path().join("storage"), None).unwrap()
    }

    fn backup_files(store: &DocumentStore) -> Vec<PathBuf> {
        fs::read_dir(store.backups().dir())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.is_file())
            .collect()
    }

    #[test]
    fn open_creates_layout() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let root = store.layout().root();
        assert!(root.join("web").is_dir());
        assert!(root.join("admin").is_dir());
        assert!(root.join("backup").is_dir());
    }

    #[test]
    fn read_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let items = store.read(Side::Web, Collection::Agents).unwrap();
        assert!(items.is_empty());
        assert!(store.load(Side::Web, Collection::Agents).unwrap().is_none());
    }

    #[test]
    fn read_corrupt_file_fails() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let path = store.layout().document_path(Side::Admin, Collection::Bumbos);
        fs::write(&path, "{ not json").unwrap();

        let err = store.read(Side::Admin, Collection::Bumbos).unwrap_err();
        assert!(matches!(err, DocumentError::Corrupt { .. }));
    }

    #[test]
    fn write_stamps_count_and_source() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let items = vec![Item::new(1, "A"), Item::new(2, "B"), Item::new(3, "C")];
        store.write(Side::Admin, Collection::Agents, items).unwrap();

        let raw = fs::read_to_string(store.layout().document_path(Side::Admin, Collection::Agents))
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["count"], 3);
        assert_eq!(json["data"].as_array().unwrap().len(), 3);
        assert_eq!(json["source"], "admin");
        assert_eq!(json["dataType"], "agents");
    }

    #[test]
    fn first_write_takes_no_backup() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store
            .write(Side::Web, Collection::Agents, vec![Item::new(1, "A")])
            .unwrap();
        assert!(backup_files(&store).is_empty());
    }

    #[test]
    fn overwrite_backs_up_previous_bytes() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let path = store.layout().document_path(Side::Web, Collection::Agents);

        store
            .write(Side::Web, Collection::Agents, vec![Item::new(1, "A")])
            .unwrap();
        let before = fs::read(&path).unwrap();

        store
            .write(
                Side::Web,
                Collection::Agents,
                vec![Item::new(1, "A"), Item::new(2, "B")],
            )
            .unwrap();

        let backups = backup_files(&store);
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read(&backups[0]).unwrap(), before);
        assert_eq!(store.read(Side::Web, Collection::Agents).unwrap().len(), 2);
    }

    #[test]
    fn write_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store
            .write(Side::Web, Collection::Bumbos, vec![Item::new(1, "Butler")])
            .unwrap();

        let leftovers: Vec<_> = fs::read_dir(store.layout().side_dir(Side::Web))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "found {leftovers:?}");
    }

    #[test]
    fn remove_snapshots_then_deletes() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store
            .write(Side::Admin, Collection::DriveDisks, vec![Item::new(1, "Disk")])
            .unwrap();

        let removed = store
            .remove(Side::Admin, Collection::DriveDisks, BackupTag::AdminCleanup)
            .unwrap();
        assert!(removed);
        assert!(!store.exists(Side::Admin, Collection::DriveDisks));

        let entries = store.backups().list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tag, BackupTag::AdminCleanup);

        let again = store
            .remove(Side::Admin, Collection::DriveDisks, BackupTag::AdminCleanup)
            .unwrap();
        assert!(!again);
    }
}
