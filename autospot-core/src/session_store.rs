use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const SESSION_KEY: &str = "autospot.auth.session";

/// Durable key-value storage for auth tokens.
pub trait SessionStore: Send + Sync + 'static {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// Used when there is nowhere to persist to; every call succeeds and nothing
/// is remembered.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSessionStore;

impl SessionStore for NoopSessionStore {
    fn get_item(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    fn remove_item(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct SqliteSessionStore {
    db_path: Arc<PathBuf>,
}

impl SqliteSessionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    crate::error::Error::Config(format!(
                        "cannot create session directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;

        Ok(Self {
            db_path: Arc::new(path.to_path_buf()),
        })
    }

    fn connect(&self) -> Result<Connection> {
        Ok(Connection::open(&*self.db_path)?)
    }
}

impl SessionStore for SqliteSessionStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let conn = self.connect()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Opens the SQLite store at `path`, or falls back to [`NoopSessionStore`]
/// when no path is configured.
pub fn open_store(path: Option<&Path>) -> Result<Arc<dyn SessionStore>> {
    match path {
        Some(path) => Ok(Arc::new(SqliteSessionStore::open(path)?)),
        None => Ok(Arc::new(NoopSessionStore)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_path(name: &str) -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        format!("/tmp/autospot-tests/{name}-{nanos}.db")
    }

    #[test]
    fn set_get_overwrite_remove() {
        let store = SqliteSessionStore::open(db_path("kv")).expect("open");
        assert_eq!(store.get_item(SESSION_KEY).expect("get"), None);

        store.set_item(SESSION_KEY, "one").expect("set");
        store.set_item(SESSION_KEY, "two").expect("overwrite");
        assert_eq!(store.get_item(SESSION_KEY).expect("get"), Some("two".into()));

        store.remove_item(SESSION_KEY).expect("remove");
        assert_eq!(store.get_item(SESSION_KEY).expect("get"), None);
    }

    #[test]
    fn values_survive_reopen() {
        let path = db_path("reopen");
        SqliteSessionStore::open(&path)
            .expect("open")
            .set_item("k", "v")
            .expect("set");

        let reopened = SqliteSessionStore::open(&path).expect("reopen");
        assert_eq!(reopened.get_item("k").expect("get"), Some("v".into()));
    }

    #[test]
    fn noop_store_forgets() {
        let store = open_store(None).expect("open");
        store.set_item("k", "v").expect("set");
        assert_eq!(store.get_item("k").expect("get"), None);
    }
}
