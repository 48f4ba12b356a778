//! Record store layer backed by SQLite
//!
//! Maps grove collections onto tables and filters onto WHERE clauses

pub mod sqlite_store;

pub use sqlite_store::SqliteRecordStore;
