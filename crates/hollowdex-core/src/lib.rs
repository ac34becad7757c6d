// ABOUTME: Core library for hollowdex, containing collection names, items, and store documents.
// ABOUTME: This crate defines the shared data model used by the store and server crates.

pub mod collection;
pub mod document;
pub mod item;
pub mod seed;
pub mod validate;

pub use collection::{Collection, Side, UnknownCollection};
pub use document::{STORE_VERSION, StoreDocument};
pub use item::Item;
pub use seed::{SeedData, SeedError};
pub use validate::ValidationError;
