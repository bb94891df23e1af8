//! Adaptive sync loop with a single-flight guard.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::activity::ActivityTracker;
use super::events::{EventBus, SyncEvent};
use super::history::SyncHistory;
use super::queue::{SyncQueue, TaskHandle, TaskOutcome};
use super::service::SyncService;
use super::{Domain, Priority};
use crate::auth::{AuthError, SessionManager};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
  /// Delay between cycles while the user is active
  pub short_interval: Duration,
  /// Delay between cycles while the user is idle
  pub long_interval: Duration,
  /// How recent an interaction must be to count as active
  pub activity_window: Duration,
  pub balance_threshold: Duration,
  pub flex_threshold: Duration,
  pub daily_threshold: Duration,
  pub tasks_threshold: Duration,
  /// Pause between the auth notice and the reload request
  pub reload_delay: Duration,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      short_interval: Duration::from_secs(120),
      long_interval: Duration::from_secs(600),
      activity_window: Duration::from_secs(300),
      balance_threshold: Duration::from_secs(30),
      flex_threshold: Duration::from_secs(60),
      daily_threshold: Duration::from_secs(60),
      tasks_threshold: Duration::from_secs(120),
      reload_delay: Duration::from_secs(3),
    }
  }
}

impl SchedulerConfig {
  pub fn threshold(&self, domain: Domain) -> Duration {
    match domain {
      Domain::Balance => self.balance_threshold,
      Domain::Flex => self.flex_threshold,
      Domain::Daily => self.daily_threshold,
      Domain::Tasks => self.tasks_threshold,
    }
  }
}

/// Result of one `intelligent_sync` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
  /// Another cycle was already running
  Skipped,
  /// The session could not be validated; nothing was synced
  AuthFailed,
  Completed {
    synced: Vec<Domain>,
    failed: Vec<Domain>,
  },
}

/// Clears the syncing flag when the cycle ends, however it ends.
struct SyncGuard<'a>(&'a AtomicBool);

impl<'a> SyncGuard<'a> {
  fn acquire(flag: &'a AtomicBool) -> Option<Self> {
    flag
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| SyncGuard(flag))
  }
}

impl Drop for SyncGuard<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::Release);
  }
}

struct Inner {
  config: SchedulerConfig,
  service: Arc<SyncService>,
  queue: SyncQueue,
  history: Arc<SyncHistory>,
  activity: Arc<ActivityTracker>,
  auth: Arc<SessionManager>,
  events: EventBus,
  is_syncing: AtomicBool,
  /// Set by a domain sync that was rejected as unauthorized
  auth_rejected: AtomicBool,
  reload_pending: AtomicBool,
  task: Mutex<Option<JoinHandle<()>>>,
}

/// Decides when and what to sync.
///
/// Each cycle validates the session, picks the domains whose last success
/// is older than their threshold and queues them by priority. The delay
/// between cycles shrinks while the user is active.
#[derive(Clone)]
pub struct SyncScheduler {
  inner: Arc<Inner>,
}

impl SyncScheduler {
  pub fn new(
    config: SchedulerConfig,
    service: Arc<SyncService>,
    queue: SyncQueue,
    history: Arc<SyncHistory>,
    activity: Arc<ActivityTracker>,
    auth: Arc<SessionManager>,
    events: EventBus,
  ) -> Self {
    Self {
      inner: Arc::new(Inner {
        config,
        service,
        queue,
        history,
        activity,
        auth,
        events,
        is_syncing: AtomicBool::new(false),
        auth_rejected: AtomicBool::new(false),
        reload_pending: AtomicBool::new(false),
        task: Mutex::new(None),
      }),
    }
  }

  pub fn is_syncing(&self) -> bool {
    self.inner.is_syncing.load(Ordering::Acquire)
  }

  /// Whether the queue is still working, including forced syncs.
  pub fn queue_busy(&self) -> bool {
    self.inner.queue.is_processing()
  }

  /// Sync tasks waiting behind the running one.
  pub fn pending_tasks(&self) -> usize {
    self.inner.queue.len()
  }

  /// Delay before the next cycle, based on recent activity.
  pub fn next_interval(&self) -> Duration {
    let config = &self.inner.config;
    if self.inner.activity.is_active(config.activity_window) {
      config.short_interval
    } else {
      config.long_interval
    }
  }

  /// Domains due for a sync at `now`, in declaration order.
  pub fn stale_domains(&self, now: Instant) -> Vec<Domain> {
    let inner = &self.inner;
    Domain::ALL
      .into_iter()
      .filter(|&domain| {
        let relevant = match domain {
          Domain::Balance => inner.activity.is_active(inner.config.activity_window),
          Domain::Flex => inner.activity.wallet().is_some(),
          Domain::Daily => true,
          Domain::Tasks => inner.activity.is_tasks_tab_active(),
        };
        relevant && inner.history.is_due(domain, inner.config.threshold(domain), now)
      })
      .collect()
  }

  /// Run one sync cycle unless one is already in flight.
  pub async fn intelligent_sync(&self) -> SyncOutcome {
    let Some(_guard) = SyncGuard::acquire(&self.inner.is_syncing) else {
      debug!("sync already in progress, skipping");
      return SyncOutcome::Skipped;
    };

    if let Err(err) = self.inner.auth.ensure_valid().await {
      self.handle_auth_failure(&err);
      return SyncOutcome::AuthFailed;
    }
    self.inner.auth_rejected.store(false, Ordering::Release);

    let stale = self.stale_domains(Instant::now());
    if stale.is_empty() {
      debug!("all domains fresh");
    } else {
      info!(domains = ?stale, "sync cycle started");
    }

    let handles: Vec<(Domain, TaskHandle)> = stale
      .into_iter()
      .map(|domain| (domain, self.enqueue_domain(domain, domain.priority())))
      .collect();

    let mut synced = Vec::new();
    let mut failed = Vec::new();
    for (domain, handle) in handles {
      match handle.wait().await {
        TaskOutcome::Completed => synced.push(domain),
        TaskOutcome::Failed | TaskOutcome::Dropped => failed.push(domain),
      }
    }

    // The rejecting task already escalated
    if self.inner.auth_rejected.swap(false, Ordering::AcqRel) {
      return SyncOutcome::AuthFailed;
    }

    info!(synced = ?synced, failed = ?failed, "sync cycle finished");
    self.inner.events.publish(SyncEvent::CycleFinished {
      synced: synced.clone(),
      failed: failed.clone(),
    });
    SyncOutcome::Completed { synced, failed }
  }

  /// Queue a user-requested sync of one domain ahead of everything else.
  pub fn force_sync(&self, domain: Domain) -> TaskHandle {
    info!(%domain, "forced sync");
    self.enqueue_domain(domain, Priority::Critical)
  }

  fn enqueue_domain(&self, domain: Domain, priority: Priority) -> TaskHandle {
    let scheduler = self.clone();

    self.inner.queue.enqueue(format!("sync:{}", domain), priority, move || async move {
      match scheduler.inner.service.sync(domain).await {
        Ok(()) => Ok(()),
        Err(err) => {
          if err.is_auth_failure() {
            scheduler.reject_session(domain);
          }
          Err(color_eyre::Report::new(err))
        }
      }
    })
  }

  /// A domain request came back unauthorized: drop the stored session so
  /// the rebuilt context logs in again, then escalate.
  fn reject_session(&self, domain: Domain) {
    warn!(%domain, "session rejected by domain sync");
    self.inner.auth_rejected.store(true, Ordering::Release);
    if let Err(err) = self.inner.auth.clear() {
      warn!(error = %err, "failed to clear rejected session");
    }
    self.escalate_reload("Your session has expired. Reconnecting...");
  }

  fn handle_auth_failure(&self, err: &AuthError) {
    if err.requires_reload() {
      warn!(error = %err, "session rejected");
      self.escalate_reload("Your session has expired. Reconnecting...");
    } else {
      warn!(error = %err, "session check failed, skipping cycle");
    }
  }

  /// Tell the user, then ask the outer layer to rebuild everything.
  fn escalate_reload(&self, notice: &str) {
    if self.inner.reload_pending.swap(true, Ordering::AcqRel) {
      return;
    }

    self.inner.events.publish(SyncEvent::Notice(notice.to_string()));
    let events = self.inner.events.clone();
    let delay = self.inner.config.reload_delay;
    tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      events.publish(SyncEvent::ReloadRequired);
    });
  }

  /// Run an initial cycle, then keep syncing on the adaptive interval.
  pub fn start(&self) {
    let mut task = self.inner.task.lock();
    if task.is_some() {
      return;
    }

    let scheduler = self.clone();
    *task = Some(tokio::spawn(async move {
      scheduler.intelligent_sync().await;
      loop {
        scheduler.wait_for_next_tick().await;

        scheduler.intelligent_sync().await;
        if scheduler.inner.reload_pending.load(Ordering::Acquire) {
          debug!("reload pending, stopping sync loop");
          break;
        }
      }
    }));
  }

  /// Sleep until the next cycle is due.
  ///
  /// An idle sleep is cut short when the user comes back: the next cycle
  /// then runs no later than one short interval after the sleep began.
  async fn wait_for_next_tick(&self) {
    let config = &self.inner.config;
    let started = Instant::now();
    let mut deadline = started + self.next_interval();
    debug!(secs = (deadline - started).as_secs(), "next sync scheduled");

    loop {
      tokio::select! {
        _ = tokio::time::sleep_until(deadline) => return,
        _ = self.inner.activity.touched() => {
          let short = started + config.short_interval;
          if short < deadline {
            debug!("user active again, bringing next sync forward");
            deadline = short;
          }
        }
      }
    }
  }

  /// Stop the loop and drop queued work.
  pub fn dispose(&self) {
    if let Some(task) = self.inner.task.lock().take() {
      task.abort();
    }
    if !self.inner.queue.is_empty() {
      debug!(count = self.inner.queue.len(), "dropping queued sync tasks");
    }
    self.inner.queue.clear();
  }
}
