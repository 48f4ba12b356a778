//! SQLite connections with grove's settings applied

use crate::errors::{from_rusqlite, Result};
use rusqlite::Connection;
use std::path::Path;

/// Pragmas applied to every connection grove opens
const CONNECTION_PRAGMAS: &str = "
    PRAGMA foreign_keys = ON;
    PRAGMA journal_mode = WAL;
    PRAGMA busy_timeout = 5000;
";

/// Open (or create) a database file
///
/// # Errors
///
/// Returns `Store` if the file cannot be opened or a pragma is rejected.
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path).map_err(from_rusqlite)?;
    configure(&conn)?;
    Ok(conn)
}

/// Open a private in-memory database
///
/// # Errors
///
/// Returns `Store` if SQLite cannot allocate it.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().map_err(from_rusqlite)?;
    configure(&conn)?;
    Ok(conn)
}

/// Apply grove's pragmas to a connection opened elsewhere
///
/// # Errors
///
/// Returns `Store` if a pragma is rejected.
pub fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(CONNECTION_PRAGMAS).map_err(from_rusqlite)
}
