//! Per-device secret storage. Holds one opaque credential per device address
//! (the webOS client key); created on first successful registration, reused on
//! every later connect, removed only by explicit request.

use std::path::PathBuf;

use rusqlite::OptionalExtension;

use crate::error::RemoteError;
use crate::store::open_connection;

#[derive(Debug, Clone)]
pub struct SecretStore {
    db_path: PathBuf,
}

impl SecretStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    fn ensure_table(&self) -> Result<rusqlite::Connection, RemoteError> {
        let conn = open_connection(&self.db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS secrets (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(conn)
    }

    pub fn set(&self, key: &str, value: &[u8]) -> Result<(), RemoteError> {
        let conn = self.ensure_table()?;
        conn.execute(
            "INSERT OR REPLACE INTO secrets (key, value) VALUES (?1, ?2)",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteError> {
        let conn = self.ensure_table()?;
        let value = conn
            .query_row("SELECT value FROM secrets WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn delete(&self, key: &str) -> Result<(), RemoteError> {
        let conn = self.ensure_table()?;
        conn.execute("DELETE FROM secrets WHERE key = ?1", [key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, SecretStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SecretStore::new(dir.path().join("secrets.db"));
        (dir, store)
    }

    #[test]
    fn test_set_get_roundtrip() {
        let (_dir, store) = temp_store();
        store.set("lgwebos.client_key.192.168.1.2", b"abc123").unwrap();
        let value = store.get("lgwebos.client_key.192.168.1.2").unwrap();
        assert_eq!(value.as_deref(), Some(b"abc123".as_slice()));
    }

    #[test]
    fn test_get_missing_returns_none() {
        let (_dir, store) = temp_store();
        assert_eq!(store.get("absent").unwrap(), None);
    }

    #[test]
    fn test_set_overwrites() {
        let (_dir, store) = temp_store();
        store.set("k", b"old").unwrap();
        store.set("k", b"new").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some(b"new".as_slice()));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_dir, store) = temp_store();
        store.set("k", b"v").unwrap();
        store.delete("k").unwrap();
        store.delete("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
