// ABOUTME: HTTP server for hollowdex, exposing the staging workflow and the catalog as a REST API.
// ABOUTME: Uses Axum with shared state holding the staging manager and the SQLite catalog.

pub mod api;
pub mod app_state;
pub mod config;
pub mod routes;

pub use app_state::{AppState, SharedState, StateError};
pub use config::{ConfigError, HollowdexConfig};
pub use routes::create_router;
