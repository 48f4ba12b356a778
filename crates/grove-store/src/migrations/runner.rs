//! Applies embedded migrations in order, recording each one

use crate::errors::{checksum_mismatch, from_rusqlite, migration_error, Result};
use crate::migrations::checksums::compute_checksum;
use crate::migrations::embedded::{get_migrations, Migration};
use rusqlite::{params, Connection, OptionalExtension};

const VERSION_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        id INTEGER PRIMARY KEY,
        migration_id TEXT NOT NULL UNIQUE,
        applied_at INTEGER NOT NULL,
        checksum TEXT
    )";

/// Bring the schema up to date
///
/// Migrations already recorded are skipped once their checksum matches the
/// embedded SQL. Each pending migration runs in its own transaction.
///
/// # Errors
///
/// Returns `Store` if a migration fails or a recorded migration's SQL was
/// edited after it ran.
pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute(VERSION_TABLE, []).map_err(from_rusqlite)?;

    let mut applied = 0;
    for migration in get_migrations() {
        let checksum = compute_checksum(migration.sql);
        match recorded_checksum(conn, migration.id)? {
            Some(Some(recorded)) if recorded != checksum => {
                return Err(checksum_mismatch(migration.id, &recorded, &checksum));
            }
            Some(_) => continue,
            None => {
                run(conn, &migration, &checksum)?;
                applied += 1;
            }
        }
    }

    if applied > 0 {
        tracing::debug!(applied, "schema migrated");
    }
    Ok(())
}

/// Ids of recorded migrations, oldest first
///
/// # Errors
///
/// Returns `Store` if the version table cannot be read.
pub fn applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT migration_id FROM schema_version ORDER BY id")
        .map_err(from_rusqlite)?;
    let ids = stmt
        .query_map([], |row| row.get(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(from_rusqlite)?;
    Ok(ids)
}

/// `None` when not recorded, `Some(None)` when recorded without a checksum
fn recorded_checksum(conn: &Connection, migration_id: &str) -> Result<Option<Option<String>>> {
    conn.query_row(
        "SELECT checksum FROM schema_version WHERE migration_id = ?",
        [migration_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(from_rusqlite)
}

fn run(conn: &mut Connection, migration: &Migration, checksum: &str) -> Result<()> {
    let tx = conn.transaction().map_err(from_rusqlite)?;
    tx.execute_batch(migration.sql)
        .map_err(|e| migration_error(migration.id, &e.to_string()))?;
    tx.execute(
        "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES (?, ?, ?)",
        params![migration.id, chrono::Utc::now().timestamp(), checksum],
    )
    .map_err(from_rusqlite)?;
    tx.commit().map_err(from_rusqlite)
}
