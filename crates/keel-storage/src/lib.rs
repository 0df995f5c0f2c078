//! Storage and cache collaborators

mod cache;
mod database;

pub use cache::Cache;
pub use database::{Database, StorageResultExt, classify};
