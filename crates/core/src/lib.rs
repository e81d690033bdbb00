//! Core types and shared functionality for campus-edge.
//!
//! This crate provides:
//! - Versioned response cache with SQLite and in-memory backends
//! - The request/response model shared by controller and server
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod model;

pub use cache::{CacheDb, CacheStorage, MemoryStorage, StoreStats};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use model::{EdgeRequest, EdgeResponse, RedirectMode};
