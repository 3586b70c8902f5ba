//! Persistent app-id cache. Maps (device identifier, logical app) to the
//! platform app id that last launched successfully on that device. Entries are
//! created lazily on first resolution and removed when a cached id fails a
//! launch.

use std::collections::HashMap;
use std::path::PathBuf;

use rusqlite::OptionalExtension;

use crate::error::RemoteError;
use crate::model::StreamingApp;
use crate::store::open_connection;

#[derive(Debug, Clone)]
pub struct AppCacheStore {
    db_path: PathBuf,
}

impl AppCacheStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    fn ensure_table(&self) -> Result<rusqlite::Connection, RemoteError> {
        let conn = open_connection(&self.db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS app_cache (
                tv_id TEXT NOT NULL,
                app TEXT NOT NULL,
                app_id TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (tv_id, app)
            )",
            [],
        )?;
        Ok(conn)
    }

    pub fn get(&self, tv_id: &str, app: StreamingApp) -> Result<Option<String>, RemoteError> {
        let conn = self.ensure_table()?;
        let app_id = conn
            .query_row(
                "SELECT app_id FROM app_cache WHERE tv_id = ?1 AND app = ?2",
                [tv_id, app.key()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(app_id)
    }

    pub fn set(&self, tv_id: &str, app: StreamingApp, app_id: &str) -> Result<(), RemoteError> {
        let conn = self.ensure_table()?;
        conn.execute(
            "INSERT OR REPLACE INTO app_cache (tv_id, app, app_id) VALUES (?1, ?2, ?3)",
            [tv_id, app.key(), app_id],
        )?;
        Ok(())
    }

    pub fn remove(&self, tv_id: &str, app: StreamingApp) -> Result<(), RemoteError> {
        let conn = self.ensure_table()?;
        conn.execute(
            "DELETE FROM app_cache WHERE tv_id = ?1 AND app = ?2",
            [tv_id, app.key()],
        )?;
        Ok(())
    }

    /// Full cached mapping for one device. Unknown app keys left behind by
    /// older versions are skipped.
    pub fn mapping(&self, tv_id: &str) -> Result<HashMap<StreamingApp, String>, RemoteError> {
        let conn = self.ensure_table()?;
        let mut stmt = conn.prepare("SELECT app, app_id FROM app_cache WHERE tv_id = ?1")?;
        let rows = stmt.query_map([tv_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut mapping = HashMap::new();
        for row in rows {
            let (key, app_id) = row?;
            if let Some(app) = StreamingApp::from_key(&key) {
                mapping.insert(app, app_id);
            }
        }
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, AppCacheStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = AppCacheStore::new(dir.path().join("cache.db"));
        (dir, store)
    }

    #[test]
    fn test_set_get_roundtrip() {
        let (_dir, store) = temp_store();
        store.set("lgwebos.abc", StreamingApp::Netflix, "netflix").unwrap();
        assert_eq!(
            store.get("lgwebos.abc", StreamingApp::Netflix).unwrap().as_deref(),
            Some("netflix")
        );
    }

    #[test]
    fn test_entries_scoped_per_device() {
        let (_dir, store) = temp_store();
        store.set("tv-a", StreamingApp::Netflix, "netflix").unwrap();
        assert_eq!(store.get("tv-b", StreamingApp::Netflix).unwrap(), None);
    }

    #[test]
    fn test_remove_then_reset_caches_one_id() {
        let (_dir, store) = temp_store();
        store.set("tv", StreamingApp::Youtube, "stale.id").unwrap();
        store.remove("tv", StreamingApp::Youtube).unwrap();
        assert_eq!(store.get("tv", StreamingApp::Youtube).unwrap(), None);

        store.set("tv", StreamingApp::Youtube, "youtube.leanback.v4").unwrap();
        let mapping = store.mapping("tv").unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(
            mapping.get(&StreamingApp::Youtube).map(String::as_str),
            Some("youtube.leanback.v4")
        );
    }

    #[test]
    fn test_last_writer_wins() {
        let (_dir, store) = temp_store();
        store.set("tv", StreamingApp::Hulu, "first").unwrap();
        store.set("tv", StreamingApp::Hulu, "second").unwrap();
        assert_eq!(store.get("tv", StreamingApp::Hulu).unwrap().as_deref(), Some("second"));
    }
}
