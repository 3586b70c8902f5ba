//! SQLite-backed persistence. One database file holds the per-device pairing
//! credentials and the per-device app-id cache, in separate tables.

mod app_cache;
mod secrets;

pub use app_cache::AppCacheStore;
pub use secrets::SecretStore;

use std::path::Path;

use rusqlite::Connection;

use crate::error::RemoteError;

/// Open a connection with the pragmas every store relies on. Each operation
/// opens its own short-lived connection; WAL plus a generous busy timeout
/// keeps concurrent per-device writers from tripping over each other.
pub(crate) fn open_connection(path: &Path) -> Result<Connection, RemoteError> {
    let conn = Connection::open(path)?;

    let _ = conn.execute("PRAGMA busy_timeout = 30000;", []);
    let _ = conn.execute("PRAGMA journal_mode = WAL;", []);
    let _ = conn.execute("PRAGMA synchronous = NORMAL;", []);

    Ok(conn)
}
