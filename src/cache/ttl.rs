//! TTL cache with namespace-based expiry and checksum tracking.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::checksum::Checksum;
use super::diff::{self, Diff};

/// Default time-to-live per key namespace.
///
/// A key belongs to the longest namespace that is a prefix of it, so
/// `balance_123` uses the `balance` TTL.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
  default_ttl: Duration,
  namespaces: Vec<(String, Duration)>,
}

impl TtlPolicy {
  pub fn new(default_ttl: Duration) -> Self {
    Self {
      default_ttl,
      namespaces: Vec::new(),
    }
  }

  /// Set the TTL used for keys starting with `prefix`.
  pub fn with_namespace(mut self, prefix: impl Into<String>, ttl: Duration) -> Self {
    let prefix = prefix.into();
    self.namespaces.retain(|(p, _)| *p != prefix);
    self.namespaces.push((prefix, ttl));
    // Longest prefix first so the most specific namespace wins
    self
      .namespaces
      .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
    self
  }

  pub fn namespaces(&self) -> impl Iterator<Item = (&str, Duration)> + '_ {
    self.namespaces.iter().map(|(prefix, ttl)| (prefix.as_str(), *ttl))
  }

  pub fn ttl_for(&self, key: &str) -> Duration {
    self
      .namespaces
      .iter()
      .find(|(prefix, _)| key.starts_with(prefix.as_str()))
      .map(|(_, ttl)| *ttl)
      .unwrap_or(self.default_ttl)
  }
}

impl Default for TtlPolicy {
  fn default() -> Self {
    Self::new(Duration::from_secs(60))
      .with_namespace("balance", Duration::from_secs(30))
      .with_namespace("tasks", Duration::from_secs(120))
      .with_namespace("userSession", Duration::from_secs(300))
      .with_namespace("daily", Duration::from_secs(60))
      .with_namespace("flex", Duration::from_secs(60))
      .with_namespace("request", Duration::from_secs(60))
      .with_namespace("snapshot", Duration::from_secs(1800))
  }
}

#[derive(Debug)]
struct Entry {
  value: Value,
  checksum: Checksum,
  stored_at: Instant,
  ttl: Duration,
  generation: u64,
}

impl Entry {
  fn is_fresh(&self, now: Instant) -> bool {
    now.saturating_duration_since(self.stored_at) < self.ttl
  }
}

#[derive(Debug, Default)]
struct Entries {
  map: HashMap<String, Entry>,
  next_generation: u64,
}

impl Entries {
  /// Drop the entry with the oldest write time.
  fn evict_oldest(&mut self) {
    let oldest = self
      .map
      .iter()
      .min_by_key(|(_, entry)| (entry.stored_at, entry.generation))
      .map(|(key, _)| key.clone());

    if let Some(key) = oldest {
      debug!(key = %key, "cache full, evicting oldest entry");
      self.map.remove(&key);
    }
  }
}

/// Key/value cache where entries silently expire.
///
/// Cloning is cheap and every clone shares the same entries.
#[derive(Debug, Clone)]
pub struct TtlCache {
  entries: Arc<Mutex<Entries>>,
  policy: Arc<TtlPolicy>,
  max_entries: usize,
}

impl TtlCache {
  pub fn new(policy: TtlPolicy) -> Self {
    Self {
      entries: Arc::new(Mutex::new(Entries::default())),
      policy: Arc::new(policy),
      max_entries: 100,
    }
  }

  /// Set the maximum number of entries kept at once.
  pub fn with_max_entries(mut self, max_entries: usize) -> Self {
    self.max_entries = max_entries.max(1);
    self
  }

  /// Store `value` under `key` and return its checksum.
  ///
  /// The entry expires after `ttl_override`, or the namespace TTL for `key`.
  /// When called inside a Tokio runtime an invalidation timer is also
  /// scheduled, so expired entries do not linger until the next read.
  pub fn set(&self, key: &str, value: Value, ttl_override: Option<Duration>) -> Checksum {
    let checksum = Checksum::of(&value);
    let ttl = ttl_override.unwrap_or_else(|| self.policy.ttl_for(key));

    let generation = {
      let mut entries = self.entries.lock();
      let generation = entries.next_generation;
      entries.next_generation += 1;

      if !entries.map.contains_key(key) && entries.map.len() >= self.max_entries {
        entries.evict_oldest();
      }

      entries.map.insert(
        key.to_string(),
        Entry {
          value,
          checksum,
          stored_at: Instant::now(),
          ttl,
          generation,
        },
      );
      generation
    };

    self.schedule_invalidation(key, generation, ttl);
    checksum
  }

  fn schedule_invalidation(&self, key: &str, generation: u64, ttl: Duration) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
      return;
    };

    let entries: Weak<Mutex<Entries>> = Arc::downgrade(&self.entries);
    let key = key.to_string();

    runtime.spawn(async move {
      tokio::time::sleep(ttl).await;
      let Some(entries) = entries.upgrade() else {
        return;
      };
      let mut entries = entries.lock();
      // A newer write owns the key now
      if entries
        .map
        .get(&key)
        .is_some_and(|entry| entry.generation == generation)
      {
        entries.map.remove(&key);
      }
    });
  }

  /// Get a fresh value, evicting the entry if it has expired.
  pub fn get(&self, key: &str) -> Option<Value> {
    let mut entries = self.entries.lock();
    let fresh = entries.map.get(key)?.is_fresh(Instant::now());

    if fresh {
      entries.map.get(key).map(|entry| entry.value.clone())
    } else {
      entries.map.remove(key);
      None
    }
  }

  /// Checksum of the fresh entry under `key`, if any.
  pub fn checksum(&self, key: &str) -> Option<Checksum> {
    let entries = self.entries.lock();
    entries
      .map
      .get(key)
      .filter(|entry| entry.is_fresh(Instant::now()))
      .map(|entry| entry.checksum)
  }

  /// Whether `new_value` differs from what is cached under `key`.
  ///
  /// A missing or expired entry always counts as changed.
  pub fn has_changed(&self, key: &str, new_value: &Value) -> bool {
    match self.checksum(key) {
      Some(checksum) => checksum != Checksum::of(new_value),
      None => true,
    }
  }

  /// Diff the cached value under `key` against `new_value`.
  pub fn diff(&self, key: &str, new_value: &Value) -> Diff {
    match self.get(key) {
      Some(old) => diff::diff(&old, new_value),
      None => Diff::Full(new_value.clone()),
    }
  }

  pub fn invalidate(&self, key: &str) {
    self.entries.lock().map.remove(key);
  }

  /// Remove every entry whose key starts with `prefix`.
  pub fn invalidate_prefix(&self, prefix: &str) {
    self
      .entries
      .lock()
      .map
      .retain(|key, _| !key.starts_with(prefix));
  }

  pub fn clear(&self) {
    self.entries.lock().map.clear();
  }

  /// Number of stored entries, including expired ones not yet evicted.
  pub fn len(&self) -> usize {
    self.entries.lock().map.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl Default for TtlCache {
  fn default() -> Self {
    Self::new(TtlPolicy::default())
  }
}
