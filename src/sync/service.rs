//! Per-domain fetch, change detection and publishing.

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::activity::ActivityTracker;
use super::events::{EventBus, SyncEvent};
use super::history::SyncHistory;
use super::Domain;
use crate::api::{ApiError, WinixClient};
use crate::cache::{Diff, TtlCache};
use crate::store::{keys, KeyValueStore};

/// Performs the sync of each domain.
///
/// A sync fetches fresh data, compares it with the last snapshot in the
/// cache and only publishes an event and persists values when something
/// actually changed. Success is recorded in the history either way.
pub struct SyncService {
  client: WinixClient,
  cache: TtlCache,
  history: Arc<SyncHistory>,
  events: EventBus,
  store: Arc<dyn KeyValueStore>,
  activity: Arc<ActivityTracker>,
}

impl SyncService {
  pub fn new(
    client: &WinixClient,
    cache: TtlCache,
    history: Arc<SyncHistory>,
    events: EventBus,
    store: Arc<dyn KeyValueStore>,
    activity: Arc<ActivityTracker>,
  ) -> Self {
    Self {
      client: client.uncached(),
      cache,
      history,
      events,
      store,
      activity,
    }
  }

  /// Sync one domain. Failures are published and leave the history alone.
  pub async fn sync(&self, domain: Domain) -> Result<(), ApiError> {
    let result = match domain {
      Domain::Balance => self.sync_balance().await,
      Domain::Flex => self.sync_flex().await,
      Domain::Daily => self.sync_daily().await,
      Domain::Tasks => self.sync_tasks().await,
    };

    match &result {
      Ok(()) => self.history.record_success(domain),
      Err(err) => {
        warn!(%domain, error = %err, code = err.code.as_str(), "domain sync failed");
        self.events.publish(SyncEvent::SyncFailed {
          domain,
          message: err.message.clone(),
        });
      }
    }
    result
  }

  async fn sync_balance(&self) -> Result<(), ApiError> {
    let balance = self.client.get_balance().await?;
    let Some(diff) = self.detect_change(Domain::Balance, &to_json(&balance)?) else {
      return Ok(());
    };

    info!(winix = balance.winix, coins = balance.coins, "balance changed");
    self.persist(keys::BALANCE, &balance.winix);
    self.persist(keys::TOKENS, &balance.winix);
    self.persist(keys::COINS, &balance.coins);
    self.persist(keys::TICKETS, &balance.tickets);
    self.events.publish(SyncEvent::BalanceChanged { balance, diff });
    Ok(())
  }

  async fn sync_flex(&self) -> Result<(), ApiError> {
    let Some(wallet) = self.activity.wallet() else {
      debug!("no wallet connected, skipping flex sync");
      return Ok(());
    };

    let status = self.client.get_flex_status(&wallet).await?;
    if self.detect_change(Domain::Flex, &to_json(&status)?).is_none() {
      return Ok(());
    }

    self.persist(keys::FLEX_STATUS, &status);
    self.events.publish(SyncEvent::FlexStatusChanged(status));
    Ok(())
  }

  async fn sync_daily(&self) -> Result<(), ApiError> {
    let bonus = self.client.get_daily_bonus().await?;
    if self.detect_change(Domain::Daily, &to_json(&bonus)?).is_none() {
      return Ok(());
    }

    self.persist(keys::DAILY_BONUS, &bonus);
    self.events.publish(SyncEvent::DailyBonusChanged(bonus));
    Ok(())
  }

  async fn sync_tasks(&self) -> Result<(), ApiError> {
    let tasks = self.client.get_tasks_with_progress().await?;

    // Key by id so the diff reports individual tasks
    let mut by_id = Map::new();
    for task in &tasks {
      by_id.insert(task.id.clone(), to_json(task)?);
    }

    let Some(diff) = self.detect_change(Domain::Tasks, &Value::Object(by_id)) else {
      return Ok(());
    };

    info!(count = tasks.len(), "tasks changed");
    self.events.publish(SyncEvent::TasksChanged { tasks, diff });
    Ok(())
  }


  /// Store `value` as the domain's snapshot and return the diff, or `None`
  /// when it matches the previous snapshot.
  fn detect_change(&self, domain: Domain, value: &Value) -> Option<Diff> {
    let user = self
      .client
      .requests()
      .identity()
      .resolve_user_id()
      .unwrap_or_default();
    let key = snapshot_key(domain, &user);
    if !self.cache.has_changed(&key, value) {
      debug!(%domain, "no change");
      return None;
    }

    let diff = self.cache.diff(&key, value);
    self.cache.set(&key, value.clone(), None);
    diff.is_change().then_some(diff)
  }

  fn persist<T: Serialize>(&self, key: &str, value: &T) {
    if let Err(e) = crate::store::write(self.store.as_ref(), key, value) {
      warn!(key, error = %e, "failed to persist synced value");
    }
  }
}

/// Cache key of the last synced value of `domain` for `user`.
pub fn snapshot_key(domain: Domain, user: &str) -> String {
  format!("snapshot:{}:{}", domain, user)
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ApiError> {
  serde_json::to_value(value).map_err(|e| ApiError::invalid_response(e.to_string()))
}
