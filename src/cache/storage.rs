//! SQLite-backed key-value store.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::error::StoreError;
use super::traits::KeyValueStore;

/// SQLite-based key-value store.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the store at the default location.
  pub fn open() -> Result<Self, StoreError> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open (or create) the store at `path`.
  pub fn open_at(path: &Path) -> Result<Self, StoreError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| StoreError::Open {
        path: parent.display().to_string(),
        message: e.to_string(),
      })?;
    }

    let conn = Connection::open(path).map_err(|e| StoreError::Open {
      path: path.display().to_string(),
      message: e.to_string(),
    })?;

    tracing::debug!(path = %path.display(), "opened local store");
    Self::with_connection(conn)
  }

  /// Open a store that lives only as long as this value.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self, StoreError> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self, StoreError> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf, StoreError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| StoreError::Open {
        path: "<data dir>".to_string(),
        message: "could not determine data directory".to_string(),
      })?;

    Ok(data_dir.join("parikrama").join("store.db"))
  }

  fn run_migrations(&self) -> Result<(), StoreError> {
    let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
    conn.execute_batch(STORE_SCHEMA)?;
    Ok(())
  }
}

const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl KeyValueStore for SqliteStorage {
  fn try_get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
    let value = conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()?;
    Ok(value)
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
    conn.execute(
      "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
       VALUES (?, ?, datetime('now'))",
      params![key, value],
    )?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StoreError> {
    let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
    conn.execute("DELETE FROM kv_store WHERE key = ?", params![key])?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_set_get_remove() {
    let store = SqliteStorage::open_in_memory().unwrap();
    assert_eq!(store.get("festivals_cache"), None);

    store.set("festivals_cache", "[]").unwrap();
    assert_eq!(store.get("festivals_cache").as_deref(), Some("[]"));

    store.set("festivals_cache", "[1]").unwrap();
    assert_eq!(store.get("festivals_cache").as_deref(), Some("[1]"));

    store.remove("festivals_cache").unwrap();
    assert_eq!(store.get("festivals_cache"), None);
  }

  #[test]
  fn test_remove_absent_key_succeeds() {
    let store = SqliteStorage::open_in_memory().unwrap();
    assert!(store.remove("nothing_here").is_ok());
  }

  #[test]
  fn test_values_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("store.db");

    {
      let store = SqliteStorage::open_at(&path).unwrap();
      store.set("parikrama_selected_city", "Kolkata").unwrap();
    }

    let store = SqliteStorage::open_at(&path).unwrap();
    assert_eq!(
      store.get("parikrama_selected_city").as_deref(),
      Some("Kolkata")
    );
  }
}
