use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::broadcast;

use super::{change_channel, KeyValueStore, StoreChange, StoreError};

/// Store that lives only as long as the process.
pub struct MemoryStore {
  values: Mutex<HashMap<String, Value>>,
  changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self {
      values: Mutex::new(HashMap::new()),
      changes: change_channel(),
    }
  }
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new()
  }
}

impl KeyValueStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
    Ok(self.values.lock().get(key).cloned())
  }

  fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
    self.values.lock().insert(key.to_string(), value.clone());
    let _ = self.changes.send(StoreChange {
      key: key.to_string(),
      value: Some(value.clone()),
    });
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StoreError> {
    if self.values.lock().remove(key).is_some() {
      let _ = self.changes.send(StoreChange {
        key: key.to_string(),
        value: None,
      });
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
  use crate::store::{keys, read, write};
  use serde_json::json;

  #[test]
  fn test_get_set_remove() {
    let store = MemoryStore::new();
    assert_eq!(store.get(keys::BALANCE).unwrap(), None);

    store.set(keys::BALANCE, &json!(12.5)).unwrap();
    assert_eq!(store.get(keys::BALANCE).unwrap(), Some(json!(12.5)));

    store.remove(keys::BALANCE).unwrap();
    assert_eq!(store.get(keys::BALANCE).unwrap(), None);
  }

  #[test]
  fn test_typed_helpers() {
    let store = MemoryStore::new();
    write(&store, keys::COINS, &42i64).unwrap();
    let coins: Option<i64> = read(&store, keys::COINS).unwrap();
    assert_eq!(coins, Some(42));
  }

  #[test]
  fn test_subscribe_sees_changes() {
    let store = MemoryStore::new();
    let mut rx = store.subscribe();

    store.set(keys::TICKETS, &json!(3)).unwrap();
    store.remove(keys::TICKETS).unwrap();

    assert_eq!(
      rx.try_recv().unwrap(),
      StoreChange {
        key: keys::TICKETS.to_string(),
        value: Some(json!(3)),
      }
    );
    assert_eq!(rx.try_recv().unwrap().value, None);
  }
}
