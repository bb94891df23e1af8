use tokio::sync::broadcast;

use super::Domain;
use crate::api::types::{Balance, DailyBonus, FlexStatus, Task};
use crate::cache::Diff;

/// Notifications published by the sync layer.
#[derive(Debug, Clone)]
pub enum SyncEvent {
  BalanceChanged { balance: Balance, diff: Diff },
  /// `diff` is keyed by task id
  TasksChanged { tasks: Vec<Task>, diff: Diff },
  DailyBonusChanged(DailyBonus),
  FlexStatusChanged(FlexStatus),
  SyncFailed { domain: Domain, message: String },
  CycleFinished { synced: Vec<Domain>, failed: Vec<Domain> },
  /// Message for the user, e.g. before a forced restart
  Notice(String),
  /// The session cannot be recovered; the client must be rebuilt
  ReloadRequired,
}

/// Typed broadcast channel for `SyncEvent`s.
#[derive(Debug, Clone)]
pub struct EventBus {
  tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
  pub fn new(capacity: usize) -> Self {
    let (tx, _rx) = broadcast::channel(capacity);
    Self { tx }
  }

  pub fn publish(&self, event: SyncEvent) {
    // Nobody listening is not an error
    let _ = self.tx.send(event);
  }

  pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
    self.tx.subscribe()
  }
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new(64)
  }
}
