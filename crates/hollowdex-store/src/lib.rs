// ABOUTME: Persistence layer for hollowdex, handling the published/draft JSON stores and the catalog.
// ABOUTME: Provides atomic document I/O, backup snapshots, the staging workflow, and the SQLite catalog.

pub mod backup;
pub mod catalog;
pub mod document;
pub mod staging;
pub mod status;

pub use backup::{BackupArchive, BackupEntry, BackupError, BackupTag};
pub use catalog::{Catalog, CatalogError, Lookup, LookupKind};
pub use document::{DocumentError, DocumentStore, StoreLayout};
pub use staging::{
    Action, CollectionOutcome, CollectionReport, ResetSummary, StagingError, StagingManager,
    StagingOptions,
};
pub use status::{FileStatus, StagingStatus};
