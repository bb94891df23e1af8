//! Background synchronization of the user's domain data.
//!
//! The scheduler decides on each tick which domains are stale, the queue
//! runs the resulting sync tasks one at a time, and the service performs
//! each domain's fetch, diff and publish.

mod activity;
mod events;
mod history;
mod queue;
mod scheduler;
mod service;

pub use activity::ActivityTracker;
pub use events::{EventBus, SyncEvent};
pub use history::SyncHistory;
pub use queue::{SyncQueue, TaskHandle, TaskOutcome};
pub use scheduler::{SchedulerConfig, SyncOutcome, SyncScheduler};
pub use service::{snapshot_key, SyncService};

use std::fmt;

/// A unit of user data that is synced independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
  Balance,
  Flex,
  Daily,
  Tasks,
}

impl Domain {
  pub const ALL: [Domain; 4] = [Domain::Balance, Domain::Flex, Domain::Daily, Domain::Tasks];

  pub fn as_str(self) -> &'static str {
    match self {
      Domain::Balance => "balance",
      Domain::Flex => "flex",
      Domain::Daily => "daily",
      Domain::Tasks => "tasks",
    }
  }

  /// Queue priority for scheduled syncs of this domain.
  pub fn priority(self) -> Priority {
    match self {
      Domain::Balance => Priority::High,
      Domain::Flex | Domain::Daily => Priority::Normal,
      Domain::Tasks => Priority::Low,
    }
  }
}

impl fmt::Display for Domain {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Queue priority. Higher variants run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
  Low,
  Normal,
  High,
  Critical,
}
