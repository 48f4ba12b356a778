//! Schema migrations
//!
//! SQL files under `migrations/` are embedded at compile time and applied
//! in order. Each applied migration is recorded in `schema_version` with a
//! SHA-256 checksum so later edits to it are detected.

mod checksums;
mod embedded;
mod runner;

pub use runner::{applied_migrations, apply_migrations};
