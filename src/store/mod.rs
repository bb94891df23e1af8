//! Persisted key/value state.
//!
//! The sync layer reads and writes a handful of well-known keys (balance,
//! coins, session token, ...) through the `KeyValueStore` trait. Writers
//! broadcast every change so other parts of the app can follow along.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// Well-known storage keys.
pub mod keys {
  pub const USER_ID: &str = "telegram_user_id";
  pub const AUTH_TOKEN: &str = "auth_token";
  pub const AUTH_TOKEN_EXPIRES_AT: &str = "auth_token_expires_at";
  pub const BALANCE: &str = "winix_balance";
  pub const TOKENS: &str = "userTokens";
  pub const COINS: &str = "userCoins";
  pub const TICKETS: &str = "winix_user_tickets";
  pub const DAILY_BONUS: &str = "winix_daily_bonus";
  pub const FLEX_STATUS: &str = "winix_flex_status";
  pub const WALLET_ADDRESS: &str = "winix_wallet_address";
}

/// Errors from a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("storage I/O failed: {0}")]
  Io(String),
  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),
  #[error("failed to (de)serialize stored value: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// A change notification. `value` is `None` when the key was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
  pub key: String,
  pub value: Option<Value>,
}

/// Durable key/value store holding JSON values.
pub trait KeyValueStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

  fn set(&self, key: &str, value: &Value) -> Result<(), StoreError>;

  fn remove(&self, key: &str) -> Result<(), StoreError>;

  /// Receive every subsequent `set`/`remove`.
  fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Read and deserialize a typed value.
pub fn read<T: DeserializeOwned>(
  store: &dyn KeyValueStore,
  key: &str,
) -> Result<Option<T>, StoreError> {
  match store.get(key)? {
    Some(value) => Ok(Some(serde_json::from_value(value)?)),
    None => Ok(None),
  }
}

/// Serialize and write a typed value.
pub fn write<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), StoreError> {
  store.set(key, &serde_json::to_value(value)?)
}

/// Capacity of the change broadcast; slow subscribers see `Lagged`.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

fn change_channel() -> broadcast::Sender<StoreChange> {
  broadcast::channel(CHANGE_CHANNEL_CAPACITY).0
}
