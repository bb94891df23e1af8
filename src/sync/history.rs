use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use super::Domain;

/// Last successful sync per domain.
#[derive(Debug, Default)]
pub struct SyncHistory {
  last_success: Mutex<HashMap<Domain, Instant>>,
}

impl SyncHistory {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record_success(&self, domain: Domain) {
    self.last_success.lock().insert(domain, Instant::now());
  }

  pub fn last_success(&self, domain: Domain) -> Option<Instant> {
    self.last_success.lock().get(&domain).copied()
  }

  /// Whether `threshold` has passed since the last success. Never-synced
  /// domains are always due.
  pub fn is_due(&self, domain: Domain, threshold: Duration, now: Instant) -> bool {
    match self.last_success(domain) {
      Some(last) => now.saturating_duration_since(last) >= threshold,
      None => true,
    }
  }

  pub fn clear(&self) {
    self.last_success.lock().clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test(start_paused = true)]
  async fn test_due_after_threshold() {
    let history = SyncHistory::new();
    let threshold = Duration::from_secs(30);
    assert!(history.is_due(Domain::Balance, threshold, Instant::now()));

    history.record_success(Domain::Balance);
    assert!(!history.is_due(Domain::Balance, threshold, Instant::now()));

    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(history.is_due(Domain::Balance, threshold, Instant::now()));
    assert!(history.is_due(Domain::Tasks, threshold, Instant::now()));
  }
}
