//! Error handling for grove-store
//!
//! Every backend failure surfaces as a `GroveError::Store`, classified
//! `Internal`, carrying the store operation that failed.

use grove_core::errors::GroveError;

pub use grove_core::errors::Result;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> GroveError {
    GroveError::store(
        "migration",
        format!("Migration {} failed: {}", migration_id, reason),
    )
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> GroveError {
    GroveError::store(
        "migration_checksum",
        format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ),
    )
}

/// Create an error for a collection that has no table
pub fn unknown_collection(op: &str, collection: &str) -> GroveError {
    GroveError::store(op, format!("table {} does not exist", collection))
}

/// Create an error for a field that is not a column
pub fn unknown_field(op: &str, collection: &str, field: &str) -> GroveError {
    GroveError::store(
        op,
        format!("column {} does not exist in {}", field, collection),
    )
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> GroveError {
    GroveError::store("sqlite", err.to_string())
}
