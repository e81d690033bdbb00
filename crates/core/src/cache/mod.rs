//! Versioned response cache.
//!
//! Responses are grouped into named stores (`<app-name>-<version>`). Two
//! backends implement [`CacheStorage`]:
//!
//! - [`CacheDb`]: SQLite via tokio-rusqlite, WAL mode, schema migrations
//! - [`MemoryStorage`]: a process-local map, for tests and throwaway runs
//!
//! Entries are keyed by the SHA-256 of the request identity.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use memory::MemoryStorage;
pub use storage::{CacheStorage, StoreStats};

/// Name of the store for an application at a given version tag.
pub fn store_name(app_name: &str, version_tag: &str) -> String {
    format!("{app_name}-{version_tag}")
}
