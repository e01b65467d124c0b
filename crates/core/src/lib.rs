//! Core types and shared functionality for cinedex.
//!
//! This crate provides:
//! - Quota-bounded key/value storage (SQLite or in-memory)
//! - Result and image caches with freshness windows
//! - Pagination/search URL state and scroll memory
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod state;
pub mod storage;

pub use cache::{CacheKind, CacheTtls, ImageCache, ResultCache};
pub use config::AppConfig;
pub use error::Error;
pub use state::{PageState, ScrollMemory};
pub use storage::{MemoryStorage, SqliteStorage, Storage, StorageHandler};
