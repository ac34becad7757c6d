// ABOUTME: Staging manager coordinating the published store, the admin draft store, and publishing.
// ABOUTME: Multi-collection operations report per-collection outcomes instead of failing as a whole.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use hollowdex_core::validate::check_items;
use hollowdex_core::{Collection, Item, SeedData, Side, StoreDocument, ValidationError};
use serde::Serialize;
use thiserror::Error;

use crate::backup::{BackupEntry, BackupError, BackupTag};
use crate::document::{DocumentError, DocumentStore};
use crate::status::{StagingStatus, collect_status};

/// Errors from single-collection staging operations.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Backup(#[from] BackupError),
}

/// What an operation did to one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Seeded,
    Created,
    Preserved,
    Synced,
    Replaced,
    Removed,
    Skipped,
    Failed,
}

/// Per-collection result of a multi-collection operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionOutcome {
    pub success: bool,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CollectionOutcome {
    fn done(action: Action) -> Self {
        Self {
            success: true,
            action,
            count: None,
            last_updated: None,
            error: None,
        }
    }

    fn written(action: Action, doc: &StoreDocument) -> Self {
        Self {
            count: Some(doc.count),
            last_updated: Some(doc.last_updated),
            ..Self::done(action)
        }
    }

    fn failed(action: Action, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::done(action)
        }
    }
}

/// Outcomes keyed by collection. A returned report only means the call
/// finished; check `is_complete` to know whether every collection succeeded.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct CollectionReport(BTreeMap<Collection, CollectionOutcome>);

impl CollectionReport {
    pub fn get(&self, collection: Collection) -> Option<&CollectionOutcome> {
        self.0.get(&collection)
    }

    pub fn is_complete(&self) -> bool {
        self.0.values().all(|o| o.success)
    }

    /// Collections whose outcome was a failure.
    pub fn failures(&self) -> Vec<Collection> {
        self.0
            .iter()
            .filter(|(_, o)| !o.success)
            .map(|(c, _)| *c)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Collection, &CollectionOutcome)> {
        self.0.iter()
    }

    fn insert(&mut self, collection: Collection, outcome: CollectionOutcome) {
        self.0.insert(collection, outcome);
    }
}

/// Result of resetting the published side back to seed data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetSummary {
    pub backup_dir: PathBuf,
    pub collections: CollectionReport,
}

/// Options for opening a staging manager.
#[derive(Debug, Clone, Default)]
pub struct StagingOptions {
    /// Snapshots kept per (tag, collection) stream; None keeps everything.
    pub backup_retain: Option<usize>,
    /// Dataset used to seed missing published stores and for resets.
    pub seed: SeedData,
}

/// Owns the store files under one storage root and runs the draft/publish
/// workflow over them. Each collection has its own lock; every
/// read-modify-write of a collection holds it.
pub struct StagingManager {
    store: DocumentStore,
    seed: SeedData,
    locks: Vec<Mutex<()>>,
}

impl StagingManager {
    /// Open a manager rooted at `root`, creating the directory layout.
    pub fn open(root: PathBuf, options: StagingOptions) -> Result<Self, StagingError> {
        let store = DocumentStore::open(root, options.backup_retain)?;
        Ok(Self {
            store,
            seed: options.seed,
            locks: Collection::ALL.iter().map(|_| Mutex::new(())).collect(),
        })
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Blocking: the guard is held across file I/O. Async callers run
    /// staging calls on the blocking pool.
    fn lock(&self, collection: Collection) -> MutexGuard<'_, ()> {
        self.locks[collection as usize]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed the published store of every collection that has none yet.
    /// Existing published files are never touched.
    pub fn initialize(&self) -> CollectionReport {
        tracing::info!("initializing published stores");
        let mut report = CollectionReport::default();

        for collection in Collection::ALL {
            let _guard = self.lock(collection);
            let outcome = if self.store.exists(Side::Web, collection) {
                CollectionOutcome::done(Action::Preserved)
            } else {
                match self
                    .store
                    .write(Side::Web, collection, self.seed.items(collection))
                {
                    Ok(doc) => CollectionOutcome::written(Action::Seeded, &doc),
                    Err(e) => {
                        tracing::error!("failed to seed published {}: {}", collection, e);
                        CollectionOutcome::failed(Action::Failed, e.to_string())
                    }
                }
            };
            report.insert(collection, outcome);
        }

        report
    }

    /// Start (or re-enter) an admin session: copy each published store into
    /// a draft unless a draft already exists, in which case it is left
    /// byte-for-byte untouched.
    pub fn initialize_admin_session(&self) -> CollectionReport {
        tracing::info!("initializing admin session");
        let started = Utc::now();
        let mut report = CollectionReport::default();

        for collection in Collection::ALL {
            let _guard = self.lock(collection);
            let outcome = match self.open_draft(collection, started) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("failed to open draft for {}: {}", collection, e);
                    CollectionOutcome::failed(Action::Failed, e.to_string())
                }
            };
            report.insert(collection, outcome);
        }

        report
    }

    fn open_draft(
        &self,
        collection: Collection,
        started: DateTime<Utc>,
    ) -> Result<CollectionOutcome, StagingError> {
        if self.store.exists(Side::Admin, collection) {
            tracing::debug!("draft for {} already exists, keeping it", collection);
            return Ok(CollectionOutcome::done(Action::Preserved));
        }

        let items = match self.store.load(Side::Web, collection)? {
            Some(published) => published.data,
            None => {
                tracing::warn!("no published {}; starting an empty draft", collection);
                Vec::new()
            }
        };

        let mut doc = StoreDocument::new(Side::Admin, collection, items);
        doc.last_updated = started;
        doc.session_started = Some(started);
        self.store.save(&doc)?;

        Ok(CollectionOutcome::written(Action::Created, &doc))
    }

    /// Replace a collection's draft with `items`. Whole-collection
    /// replacement is the only write granularity.
    pub fn save_draft(
        &self,
        collection: Collection,
        items: Vec<Item>,
    ) -> Result<StoreDocument, StagingError> {
        check_items(&items)?;
        let _guard = self.lock(collection);

        let session_started = match self.store.load(Side::Admin, collection) {
            Ok(existing) => existing.and_then(|d| d.session_started),
            Err(e) => {
                tracing::warn!("existing draft for {} is unreadable, replacing it: {}", collection, e);
                None
            }
        };

        let mut doc = StoreDocument::new(Side::Admin, collection, items);
        doc.session_started = session_started.or(Some(doc.last_updated));
        self.store.save(&doc)?;

        Ok(doc)
    }

    /// Publish every collection that has a draft. Collections without a
    /// draft (or with an unreadable one) are reported as failures; the
    /// rest still sync.
    pub fn sync_draft_to_published(&self) -> CollectionReport {
        tracing::info!("syncing drafts to published");
        let mut report = CollectionReport::default();

        for collection in Collection::ALL {
            let _guard = self.lock(collection);
            let outcome = match self.publish_draft(collection) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("failed to sync {}: {}", collection, e);
                    CollectionOutcome::failed(Action::Failed, e.to_string())
                }
            };
            report.insert(collection, outcome);
        }

        let failed = report.failures();
        if !failed.is_empty() {
            tracing::warn!("sync finished with {} collection(s) not published", failed.len());
        }
        report
    }

    fn publish_draft(&self, collection: Collection) -> Result<CollectionOutcome, StagingError> {
        let Some(draft) = self.store.load(Side::Admin, collection)? else {
            tracing::warn!("no draft for {}, skipping sync", collection);
            return Ok(CollectionOutcome::failed(Action::Skipped, "no draft to sync"));
        };

        let now = Utc::now();
        let mut doc = StoreDocument::new(Side::Web, collection, draft.data);
        doc.last_updated = now;
        doc.last_sync_from_admin = Some(now);
        self.store.save(&doc)?;

        Ok(CollectionOutcome::written(Action::Synced, &doc))
    }

    /// End the admin session: back up and delete every draft.
    pub fn cleanup_admin_session(&self) -> CollectionReport {
        tracing::info!("cleaning up admin session");
        let mut report = CollectionReport::default();

        for collection in Collection::ALL {
            let _guard = self.lock(collection);
            let outcome = match self
                .store
                .remove(Side::Admin, collection, BackupTag::AdminCleanup)
            {
                Ok(true) => CollectionOutcome::done(Action::Removed),
                Ok(false) => CollectionOutcome::done(Action::Skipped),
                Err(e) => {
                    tracing::error!("failed to remove draft for {}: {}", collection, e);
                    CollectionOutcome::failed(Action::Failed, e.to_string())
                }
            };
            report.insert(collection, outcome);
        }

        report
    }

    /// Overwrite a collection's published store directly, bypassing the
    /// draft. Used to mirror the catalog and by the single-store endpoints.
    pub fn replace_published(
        &self,
        collection: Collection,
        items: Vec<Item>,
    ) -> Result<StoreDocument, StagingError> {
        check_items(&items)?;
        let _guard = self.lock(collection);
        Ok(self.store.write(Side::Web, collection, items)?)
    }

    /// Replace several published stores at once. Every batch entry is
    /// validated before anything is written; a validation failure writes
    /// nothing. Write failures after that are reported per collection.
    pub fn replace_published_batch(
        &self,
        batch: BTreeMap<Collection, Vec<Item>>,
    ) -> Result<CollectionReport, StagingError> {
        for items in batch.values() {
            check_items(items)?;
        }

        let mut report = CollectionReport::default();
        for (collection, items) in batch {
            let _guard = self.lock(collection);
            let outcome = match self.store.write(Side::Web, collection, items) {
                Ok(doc) => CollectionOutcome::written(Action::Replaced, &doc),
                Err(e) => {
                    tracing::error!("failed to replace published {}: {}", collection, e);
                    CollectionOutcome::failed(Action::Failed, e.to_string())
                }
            };
            report.insert(collection, outcome);
        }

        Ok(report)
    }

    /// Copy every published file into a full backup directory, then rewrite
    /// all published stores from the seed dataset.
    pub fn reset_published(&self) -> Result<ResetSummary, StagingError> {
        tracing::info!("resetting published stores to seed data");
        let _guards: Vec<_> = Collection::ALL.iter().map(|c| self.lock(*c)).collect();

        let files: Vec<_> = Collection::ALL
            .iter()
            .map(|c| (*c, self.store.layout().document_path(Side::Web, *c)))
            .collect();
        let backup_dir = self.store.backups().full_backup(&files)?;

        let mut report = CollectionReport::default();
        for collection in Collection::ALL {
            let outcome = match self
                .store
                .write(Side::Web, collection, self.seed.items(collection))
            {
                Ok(doc) => CollectionOutcome::written(Action::Seeded, &doc),
                Err(e) => {
                    tracing::error!("failed to reset published {}: {}", collection, e);
                    CollectionOutcome::failed(Action::Failed, e.to_string())
                }
            };
            report.insert(collection, outcome);
        }

        tracing::info!("published stores reset, backup at {}", backup_dir.display());
        Ok(ResetSummary {
            backup_dir,
            collections: report,
        })
    }

    /// Items of one collection on one side. Missing reads as empty.
    pub fn read(&self, side: Side, collection: Collection) -> Result<Vec<Item>, DocumentError> {
        self.store.read(side, collection)
    }

    /// The full document of one collection on one side.
    pub fn document(
        &self,
        side: Side,
        collection: Collection,
    ) -> Result<Option<StoreDocument>, DocumentError> {
        self.store.load(side, collection)
    }

    /// Items of every collection on one side. An unreadable collection is
    /// logged and returned as empty.
    pub fn all_items(&self, side: Side) -> BTreeMap<Collection, Vec<Item>> {
        Collection::ALL
            .iter()
            .map(|c| {
                let items = self.store.read(side, *c).unwrap_or_else(|e| {
                    tracing::error!("failed to read {} {}: {}", side, c, e);
                    Vec::new()
                });
                (*c, items)
            })
            .collect()
    }

    pub fn status(&self) -> StagingStatus {
        collect_status(&self.store)
    }

    pub fn backups(&self) -> Result<Vec<BackupEntry>, BackupError> {
        self.store.backups().list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn seed_with_agents(items: Vec<Item>) -> SeedData {
        let mut seed = SeedData::default();
        seed.collections.insert(Collection::Agents, items);
        seed
    }

    fn open_manager(dir: &TempDir, seed: SeedData) -> StagingManager {
        StagingManager::open(
            dir.path().join("storage"),
            StagingOptions {
                backup_retain: None,
                seed,
            },
        )
        .unwrap()
    }

    fn draft_path(mgr: &StagingManager, collection: Collection) -> PathBuf {
        mgr.store().layout().document_path(Side::Admin, collection)
    }

    fn backup_count(mgr: &StagingManager) -> usize {
        mgr.backups().unwrap().len()
    }

    #[test]
    fn initialize_seeds_only_missing_published() {
        let dir = TempDir::new().unwrap();
        let mgr = open_manager(&dir, seed_with_agents(vec![Item::new(1, "A")]));

        mgr.replace_published(Collection::Bumbos, vec![Item::new(9, "Kept")])
            .unwrap();

        let report = mgr.initialize();
        assert!(report.is_complete());
        assert_eq!(report.get(Collection::Agents).unwrap().action, Action::Seeded);
        assert_eq!(report.get(Collection::Bumbos).unwrap().action, Action::Preserved);

        let bumbos = mgr.read(Side::Web, Collection::Bumbos).unwrap();
        assert_eq!(bumbos, vec![Item::new(9, "Kept")]);
        assert!(mgr.status().initialized);
    }

    #[test]
    fn read_never_resurrects_seed_data() {
        let dir = TempDir::new().unwrap();
        let mgr = open_manager(&dir, seed_with_agents(vec![Item::new(1, "A")]));

        let items = mgr.read(Side::Web, Collection::Agents).unwrap();
        assert!(items.is_empty());
        assert!(mgr.all_items(Side::Web)[&Collection::Agents].is_empty());
    }

    #[test]
    fn admin_session_copies_published_with_admin_source() {
        let dir = TempDir::new().unwrap();
        let mgr = open_manager(&dir, seed_with_agents(vec![Item::new(1, "A")]));
        mgr.initialize();

        let report = mgr.initialize_admin_session();
        assert!(report.is_complete());
        assert_eq!(report.get(Collection::Agents).unwrap().action, Action::Created);

        let draft = mgr
            .document(Side::Admin, Collection::Agents)
            .unwrap()
            .unwrap();
        assert_eq!(draft.source, Side::Admin);
        assert_eq!(draft.data, vec![Item::new(1, "A")]);
        assert!(draft.session_started.is_some());
    }

    #[test]
    fn admin_session_init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mgr = open_manager(&dir, seed_with_agents(vec![Item::new(1, "A")]));
        mgr.initialize();

        mgr.initialize_admin_session();
        let first = fs::read(draft_path(&mgr, Collection::Agents)).unwrap();
        let backups_before = backup_count(&mgr);

        let report = mgr.initialize_admin_session();
        let second = fs::read(draft_path(&mgr, Collection::Agents)).unwrap();

        assert_eq!(first, second);
        assert_eq!(report.get(Collection::Agents).unwrap().action, Action::Preserved);
        assert_eq!(backup_count(&mgr), backups_before);
    }

    #[test]
    fn admin_session_init_keeps_in_progress_edits() {
        let dir = TempDir::new().unwrap();
        let mgr = open_manager(&dir, seed_with_agents(vec![Item::new(1, "A")]));
        mgr.initialize();
        mgr.initialize_admin_session();

        mgr.save_draft(Collection::Agents, vec![Item::new(1, "A"), Item::new(2, "B")])
            .unwrap();
        mgr.initialize_admin_session();

        assert_eq!(mgr.read(Side::Admin, Collection::Agents).unwrap().len(), 2);
    }

    #[test]
    fn save_draft_backs_up_and_keeps_session_start() {
        let dir = TempDir::new().unwrap();
        let mgr = open_manager(&dir, seed_with_agents(vec![Item::new(1, "A")]));
        mgr.initialize();
        mgr.initialize_admin_session();
        let started = mgr
            .document(Side::Admin, Collection::Agents)
            .unwrap()
            .unwrap()
            .session_started;
        let before = fs::read(draft_path(&mgr, Collection::Agents)).unwrap();

        let doc = mgr
            .save_draft(Collection::Agents, vec![Item::new(1, "A"), Item::new(2, "B")])
            .unwrap();

        assert_eq!(doc.count, 2);
        assert_eq!(doc.session_started, started);

        let backups = mgr.backups().unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].tag, BackupTag::Admin);
        let snapshot = fs::read(mgr.store().backups().dir().join(&backups[0].file_name)).unwrap();
        assert_eq!(snapshot, before);
    }

    #[test]
    fn save_draft_rejects_duplicate_ids_without_writing() {
        let dir = TempDir::new().unwrap();
        let mgr = open_manager(&dir, SeedData::default());
        mgr.initialize_admin_session();
        let before = fs::read(draft_path(&mgr, Collection::Agents)).unwrap();

        let err = mgr
            .save_draft(Collection::Agents, vec![Item::new(1, "A"), Item::new(1, "B")])
            .unwrap_err();

        assert!(matches!(err, StagingError::Validation(_)));
        assert_eq!(fs::read(draft_path(&mgr, Collection::Agents)).unwrap(), before);
    }

    #[test]
    fn library_writes_reject_non_positive_ids() {
        let dir = TempDir::new().unwrap();
        let mgr = open_manager(&dir, SeedData::default());

        let err = mgr
            .save_draft(Collection::Agents, vec![Item::new(0, "Zero")])
            .unwrap_err();
        assert!(matches!(err, StagingError::Validation(_)));
        assert!(!mgr.store().exists(Side::Admin, Collection::Agents));

        let err = mgr
            .replace_published(Collection::Agents, vec![Item::new(-1, "Negative")])
            .unwrap_err();
        assert!(matches!(err, StagingError::Validation(_)));
        assert!(!mgr.store().exists(Side::Web, Collection::Agents));
    }

    #[test]
    fn sync_reports_each_collection_independently() {
        let dir = TempDir::new().unwrap();
        let mgr = open_manager(&dir, SeedData::default());
        mgr.initialize();

        mgr.save_draft(Collection::Agents, vec![Item::new(1, "A")])
            .unwrap();
        mgr.save_draft(Collection::Bumbos, vec![Item::new(5, "Butler")])
            .unwrap();
        let engines_before = fs::read(
            mgr.store()
                .layout()
                .document_path(Side::Web, Collection::SoundEngines),
        )
        .unwrap();

        let report = mgr.sync_draft_to_published();

        assert!(report.get(Collection::Agents).unwrap().success);
        assert!(report.get(Collection::Bumbos).unwrap().success);
        let engines = report.get(Collection::SoundEngines).unwrap();
        assert!(!engines.success);
        assert_eq!(engines.action, Action::Skipped);
        assert!(!report.is_complete());
        assert!(report.failures().contains(&Collection::SoundEngines));

        assert_eq!(
            mgr.read(Side::Web, Collection::Agents).unwrap(),
            mgr.read(Side::Admin, Collection::Agents).unwrap()
        );
        assert_eq!(
            mgr.read(Side::Web, Collection::Bumbos).unwrap(),
            vec![Item::new(5, "Butler")]
        );
        let engines_after = fs::read(
            mgr.store()
                .layout()
                .document_path(Side::Web, Collection::SoundEngines),
        )
        .unwrap();
        assert_eq!(engines_before, engines_after);
    }

    #[test]
    fn sync_restamps_published_metadata() {
        let dir = TempDir::new().unwrap();
        let mgr = open_manager(&dir, seed_with_agents(vec![Item::new(1, "A")]));
        mgr.initialize();
        mgr.initialize_admin_session();

        mgr.sync_draft_to_published();

        let published = mgr
            .document(Side::Web, Collection::Agents)
            .unwrap()
            .unwrap();
        assert_eq!(published.source, Side::Web);
        assert!(published.last_sync_from_admin.is_some());
        assert!(published.session_started.is_none());
        assert!(published.count_matches());
    }

    #[test]
    fn corrupt_draft_fails_only_its_collection() {
        let dir = TempDir::new().unwrap();
        let mgr = open_manager(&dir, seed_with_agents(vec![Item::new(1, "A")]));
        mgr.initialize();
        mgr.initialize_admin_session();
        fs::write(draft_path(&mgr, Collection::DriveDisks), "{{{").unwrap();

        let report = mgr.sync_draft_to_published();

        let disks = report.get(Collection::DriveDisks).unwrap();
        assert!(!disks.success);
        assert_eq!(disks.action, Action::Failed);
        assert!(disks.error.as_deref().unwrap().contains("corrupt"));
        assert!(report.get(Collection::Agents).unwrap().success);
        assert_eq!(report.failures(), vec![Collection::DriveDisks]);
    }

    #[test]
    fn cleanup_removes_drafts_with_backups() {
        let dir = TempDir::new().unwrap();
        let mgr = open_manager(&dir, seed_with_agents(vec![Item::new(1, "A")]));
        mgr.initialize();
        mgr.initialize_admin_session();
        let final_draft = fs::read(draft_path(&mgr, Collection::Agents)).unwrap();

        let report = mgr.cleanup_admin_session();
        assert!(report.is_complete());
        assert_eq!(report.get(Collection::Agents).unwrap().action, Action::Removed);

        for collection in Collection::ALL {
            assert!(!mgr.store().exists(Side::Admin, collection));
        }

        let cleanup: Vec<_> = mgr
            .backups()
            .unwrap()
            .into_iter()
            .filter(|e| e.tag == BackupTag::AdminCleanup)
            .collect();
        assert_eq!(cleanup.len(), Collection::ALL.len());
        let agents_snapshot = cleanup
            .iter()
            .find(|e| e.collection == Collection::Agents)
            .unwrap();
        let bytes = fs::read(mgr.store().backups().dir().join(&agents_snapshot.file_name)).unwrap();
        assert_eq!(bytes, final_draft);

        let again = mgr.cleanup_admin_session();
        assert_eq!(again.get(Collection::Agents).unwrap().action, Action::Skipped);
    }

    #[test]
    fn reset_restores_seed_and_keeps_full_backup() {
        let dir = TempDir::new().unwrap();
        let mgr = open_manager(&dir, seed_with_agents(vec![Item::new(1, "A")]));
        mgr.initialize();
        mgr.replace_published(Collection::Agents, vec![Item::new(2, "Edited")])
            .unwrap();

        let summary = mgr.reset_published().unwrap();

        assert!(summary.collections.is_complete());
        assert_eq!(
            mgr.read(Side::Web, Collection::Agents).unwrap(),
            vec![Item::new(1, "A")]
        );
        let saved = fs::read_to_string(summary.backup_dir.join("agents.json")).unwrap();
        assert!(saved.contains("Edited"));
    }

    #[test]
    fn batch_replace_writes_nothing_when_any_entry_is_invalid() {
        let dir = TempDir::new().unwrap();
        let mgr = open_manager(&dir, SeedData::default());

        let mut batch = BTreeMap::new();
        batch.insert(Collection::Agents, vec![Item::new(1, "A")]);
        batch.insert(Collection::Bumbos, vec![Item::new(1, "X"), Item::new(1, "Y")]);
        let err = mgr.replace_published_batch(batch).unwrap_err();
        assert!(matches!(err, StagingError::Validation(_)));
        assert!(!mgr.store().exists(Side::Web, Collection::Agents));

        let mut batch = BTreeMap::new();
        batch.insert(Collection::Agents, vec![Item::new(1, "A")]);
        batch.insert(Collection::Bumbos, vec![Item::new(1, "X")]);
        let report = mgr.replace_published_batch(batch).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.get(Collection::Bumbos).unwrap().action, Action::Replaced);
        assert!(report.get(Collection::DriveDisks).is_none());
        assert_eq!(mgr.read(Side::Web, Collection::Agents).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_draft_saves_leave_a_valid_document() {
        let dir = TempDir::new().unwrap();
        let mgr = Arc::new(open_manager(&dir, SeedData::default()));

        std::thread::scope(|scope| {
            for n in 1..=8i64 {
                let mgr = Arc::clone(&mgr);
                scope.spawn(move || {
                    let items = (1..=n).map(|id| Item::new(id, format!("item {id}"))).collect();
                    mgr.save_draft(Collection::Agents, items).unwrap();
                });
            }
        });

        let doc = mgr
            .document(Side::Admin, Collection::Agents)
            .unwrap()
            .unwrap();
        assert!(doc.count_matches());
        // First save creates the file; the other seven each back it up.
        assert_eq!(backup_count(&mgr), 7);
    }

    #[test]
    fn end_to_end_publish_cycle() {
        let dir = TempDir::new().unwrap();
        let mgr = open_manager(&dir, seed_with_agents(vec![Item::new(1, "A")]));
        mgr.initialize();

        mgr.initialize_admin_session();
        let draft = mgr.document(Side::Admin, Collection::Agents).unwrap().unwrap();
        assert_eq!(draft.data, vec![Item::new(1, "A")]);
        assert_eq!(draft.source, Side::Admin);

        let backups_before = backup_count(&mgr);
        mgr.save_draft(Collection::Agents, vec![Item::new(1, "A"), Item::new(2, "B")])
            .unwrap();
        assert_eq!(mgr.read(Side::Admin, Collection::Agents).unwrap().len(), 2);
        assert_eq!(backup_count(&mgr), backups_before + 1);

        mgr.sync_draft_to_published();
        let published = mgr.document(Side::Web, Collection::Agents).unwrap().unwrap();
        assert_eq!(published.data.len(), 2);
        assert_eq!(published.source, Side::Web);

        let backups_before_cleanup = mgr
            .backups()
            .unwrap()
            .into_iter()
            .filter(|e| e.collection == Collection::Agents)
            .count();
        mgr.cleanup_admin_session();
        assert!(!draft_path(&mgr, Collection::Agents).exists());
        let backups_after_cleanup = mgr
            .backups()
            .unwrap()
            .into_iter()
            .filter(|e| e.collection == Collection::Agents)
            .count();
        assert_eq!(backups_after_cleanup, backups_before_cleanup + 1);
    }
}
