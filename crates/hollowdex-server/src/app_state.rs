// ABOUTME: Shared application state for the hollowdex HTTP server.
// ABOUTME: Holds the staging manager, the catalog connection, and the loaded configuration.

use std::sync::Arc;

use hollowdex_core::{SeedData, SeedError};
use hollowdex_store::{Catalog, CatalogError, StagingError, StagingManager, StagingOptions};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::HollowdexConfig;

/// Errors raised while assembling the application state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to load seed data: {0}")]
    Seed(#[from] SeedError),

    #[error("failed to open storage: {0}")]
    Staging(#[from] StagingError),

    #[error("failed to open catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("failed to create catalog directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    pub staging: StagingManager,
    /// The catalog connection. Handlers hold the lock across a mutation and
    /// the mirror into the published store that follows it.
    pub catalog: Mutex<Catalog>,
    pub config: HollowdexConfig,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(staging: StagingManager, catalog: Catalog, config: HollowdexConfig) -> Self {
        Self {
            staging,
            catalog: Mutex::new(catalog),
            config,
        }
    }

    /// Open the storage root and catalog named by `config`, seeding the
    /// catalog from the bundled dataset if it is empty.
    pub fn open(config: HollowdexConfig) -> Result<Self, StateError> {
        let seed = SeedData::bundled()?;

        let staging = StagingManager::open(
            config.home.clone(),
            StagingOptions {
                backup_retain: config.backup_retain,
                seed: seed.clone(),
            },
        )?;

        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let catalog = Catalog::open(&config.db_path)?;
        catalog.seed_if_empty(&seed)?;

        Ok(Self::new(staging, catalog, config))
    }
}

/// State over a temp directory with the bundled seed, for handler tests.
#[cfg(test)]
pub(crate) fn test_state(dir: &tempfile::TempDir) -> SharedState {
    let config = HollowdexConfig::with_home(dir.path().join("storage"));
    Arc::new(AppState::open(config).unwrap())
}
