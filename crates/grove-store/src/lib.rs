//! Grove Store - SQLite persistence for the grove record store contract
//!
//! Provides:
//! - `SqliteRecordStore`, a `RecordStore` backed by rusqlite
//! - A migrations framework with checksums and idempotent application
//! - A default schema for nodes, contents and content relations

pub mod db;
pub mod errors;
pub mod migrations;
pub mod repo;

// Re-export key types
pub use errors::Result;
pub use repo::SqliteRecordStore;
