//! SQLite-backed key/value store.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::debug;

use super::{change_channel, KeyValueStore, StoreChange, StoreError};

/// Schema for the state table.
const STATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Persistent store in a single SQLite file.
pub struct SqliteStore {
  conn: Mutex<Connection>,
  changes: broadcast::Sender<StoreChange>,
}

impl SqliteStore {
  /// Open or create the store at the default location.
  pub fn open() -> Result<Self, StoreError> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open or create the store at `path`.
  pub fn open_at(path: &Path) -> Result<Self, StoreError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        StoreError::Io(format!(
          "failed to create state directory {}: {}",
          parent.display(),
          e
        ))
      })?;
    }

    let conn = Connection::open(path)?;
    conn.execute_batch(STATE_SCHEMA)?;
    debug!(path = %path.display(), "opened state store");

    Ok(Self {
      conn: Mutex::new(conn),
      changes: change_channel(),
    })
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf, StoreError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| StoreError::Io("could not determine data directory".to_string()))?;

    Ok(data_dir.join("winix").join("state.db"))
  }

  fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
    self
      .conn
      .lock()
      .map_err(|e| StoreError::Io(format!("lock poisoned: {}", e)))
  }

  fn notify(&self, key: &str, value: Option<Value>) {
    // No subscribers is fine
    let _ = self.changes.send(StoreChange {
      key: key.to_string(),
      value,
    });
  }
}

impl KeyValueStore for SqliteStore {
  fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
    let conn = self.conn()?;
    let raw: Option<String> = conn
      .query_row(
        "SELECT value FROM kv_state WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()?;

    match raw {
      Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
      None => Ok(None),
    }
  }

  fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)?;
    self.conn()?.execute(
      "INSERT OR REPLACE INTO kv_state (key, value, updated_at)
       VALUES (?, ?, datetime('now'))",
      params![key, raw],
    )?;

    self.notify(key, Some(value.clone()));
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StoreError> {
    let removed = self
      .conn()?
      .execute("DELETE FROM kv_state WHERE key = ?", params![key])?;

    if removed > 0 {
      self.notify(key, None);
    }
    Ok(())
  }

  fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
    self.changes.subscribe()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::keys;
  use serde_json::json;

  #[test]
  fn test_values_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.db");

    {
      let store = SqliteStore::open_at(&path).unwrap();
      store
        .set(keys::BALANCE, &json!({"winix": 10.5, "coins": 2}))
        .unwrap();
    }

    let store = SqliteStore::open_at(&path).unwrap();
    assert_eq!(
      store.get(keys::BALANCE).unwrap(),
      Some(json!({"winix": 10.5, "coins": 2}))
    );
  }

  #[test]
  fn test_overwrite_and_remove() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open_at(&dir.path().join("state.db")).unwrap();
    let mut rx = store.subscribe();

    store.set(keys::COINS, &json!(1)).unwrap();
    store.set(keys::COINS, &json!(2)).unwrap();
    assert_eq!(store.get(keys::COINS).unwrap(), Some(json!(2)));

    store.remove(keys::COINS).unwrap();
    assert_eq!(store.get(keys::COINS).unwrap(), None);

    assert_eq!(rx.try_recv().unwrap().value, Some(json!(1)));
    assert_eq!(rx.try_recv().unwrap().value, Some(json!(2)));
    assert_eq!(rx.try_recv().unwrap().value, None);
  }

  #[test]
  fn test_remove_missing_key_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open_at(&dir.path().join("state.db")).unwrap();
    let mut rx = store.subscribe();

    store.remove("missing").unwrap();
    assert!(rx.try_recv().is_err());
  }
}
