use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Tabs whose content is driven by task data.
const TASK_TABS: &[&str] = &["earn", "tasks", "social", "limited", "partners"];

/// What the user is doing, as far as sync scheduling cares.
#[derive(Debug)]
pub struct ActivityTracker {
  last_interaction: Mutex<Instant>,
  active_tab: Mutex<String>,
  wallet: Mutex<Option<String>>,
  interaction: Notify,
}

impl ActivityTracker {
  pub fn new(active_tab: impl Into<String>) -> Self {
    Self {
      last_interaction: Mutex::new(Instant::now()),
      active_tab: Mutex::new(active_tab.into()),
      wallet: Mutex::new(None),
      interaction: Notify::new(),
    }
  }

  /// Record a user interaction now.
  pub fn touch(&self) {
    *self.last_interaction.lock() = Instant::now();
    self.interaction.notify_waiters();
  }

  /// Resolves on the next `touch`.
  pub async fn touched(&self) {
    self.interaction.notified().await;
  }

  pub fn idle_for(&self) -> Duration {
    self.last_interaction.lock().elapsed()
  }

  /// Whether the user interacted within `window`.
  pub fn is_active(&self, window: Duration) -> bool {
    self.idle_for() < window
  }

  pub fn set_active_tab(&self, tab: impl Into<String>) {
    *self.active_tab.lock() = tab.into();
  }

  pub fn active_tab(&self) -> String {
    self.active_tab.lock().clone()
  }

  pub fn is_tasks_tab_active(&self) -> bool {
    let tab = self.active_tab.lock();
    TASK_TABS.contains(&tab.as_str())
  }

  pub fn set_wallet(&self, wallet: Option<String>) {
    *self.wallet.lock() = wallet.filter(|w| !w.trim().is_empty());
  }

  pub fn wallet(&self) -> Option<String> {
    self.wallet.lock().clone()
  }
}

impl Default for ActivityTracker {
  fn default() -> Self {
    Self::new("home")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test(start_paused = true)]
  async fn test_activity_window() {
    let activity = ActivityTracker::default();
    assert!(activity.is_active(Duration::from_secs(300)));

    tokio::time::advance(Duration::from_secs(301)).await;
    assert!(!activity.is_active(Duration::from_secs(300)));

    activity.touch();
    assert!(activity.is_active(Duration::from_secs(300)));
  }

  #[tokio::test]
  async fn test_touch_wakes_waiters() {
    let activity = std::sync::Arc::new(ActivityTracker::default());
    let waiter = tokio::spawn({
      let activity = activity.clone();
      async move { activity.touched().await }
    });
    tokio::task::yield_now().await;
    assert!(!waiter.is_finished());

    activity.touch();
    tokio::time::timeout(Duration::from_secs(1), waiter)
      .await
      .unwrap()
      .unwrap();
  }

  #[test]
  fn test_tasks_tabs() {
    let activity = ActivityTracker::default();
    assert!(!activity.is_tasks_tab_active());
    activity.set_active_tab("earn");
    assert!(activity.is_tasks_tab_active());
    activity.set_active_tab("wallet");
    assert!(!activity.is_tasks_tab_active());
  }

  #[test]
  fn test_blank_wallet_is_disconnected() {
    let activity = ActivityTracker::default();
    activity.set_wallet(Some("  ".to_string()));
    assert_eq!(activity.wallet(), None);
    activity.set_wallet(Some("EQabc".to_string()));
    assert_eq!(activity.wallet().as_deref(), Some("EQabc"));
  }
}
