//! Priority queue of sync tasks, drained one at a time.

use color_eyre::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::Priority;

type SyncAction = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// How a queued task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
  Completed,
  Failed,
  /// Removed from the queue before it ran
  Dropped,
}

/// Resolves when the queued task has settled.
#[derive(Debug)]
pub struct TaskHandle {
  rx: oneshot::Receiver<TaskOutcome>,
}

impl TaskHandle {
  pub async fn wait(self) -> TaskOutcome {
    self.rx.await.unwrap_or(TaskOutcome::Dropped)
  }
}

struct QueuedTask {
  label: String,
  action: SyncAction,
  priority: Priority,
  enqueued_at: Instant,
  done: oneshot::Sender<TaskOutcome>,
}

#[derive(Default)]
struct QueueState {
  tasks: VecDeque<QueuedTask>,
  processing: bool,
}

/// Single-concurrency task queue ordered by priority.
///
/// Tasks of equal priority run in insertion order. After each task the
/// drain loop pauses for `delay` so a burst of tasks does not hit the
/// backend all at once. Draining starts on demand and stops when empty.
#[derive(Clone)]
pub struct SyncQueue {
  state: Arc<Mutex<QueueState>>,
  delay: Duration,
}

impl SyncQueue {
  pub fn new(delay: Duration) -> Self {
    Self {
      state: Arc::new(Mutex::new(QueueState::default())),
      delay,
    }
  }

  /// Add a task and start draining if idle.
  pub fn enqueue<F, Fut>(&self, label: impl Into<String>, priority: Priority, action: F) -> TaskHandle
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
  {
    let (done, rx) = oneshot::channel();
    let task = QueuedTask {
      label: label.into(),
      action: Box::new(move || action().boxed()),
      priority,
      enqueued_at: Instant::now(),
      done,
    };

    let start_drain = {
      let mut state = self.state.lock();
      // Insert after every task of equal or higher priority
      let position = state
        .tasks
        .iter()
        .position(|queued| queued.priority < priority)
        .unwrap_or(state.tasks.len());
      debug!(task = %task.label, ?priority, position, "sync task queued");
      state.tasks.insert(position, task);

      if state.processing {
        false
      } else {
        state.processing = true;
        true
      }
    };

    if start_drain {
      tokio::spawn(drain(Arc::clone(&self.state), self.delay));
    }

    TaskHandle { rx }
  }

  /// Number of tasks waiting to run.
  pub fn len(&self) -> usize {
    self.state.lock().tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn is_processing(&self) -> bool {
    self.state.lock().processing
  }

  /// Drop every waiting task. A running task is not interrupted.
  pub fn clear(&self) {
    let dropped: Vec<QueuedTask> = self.state.lock().tasks.drain(..).collect();
    for task in dropped {
      let _ = task.done.send(TaskOutcome::Dropped);
    }
  }
}

async fn drain(state: Arc<Mutex<QueueState>>, delay: Duration) {
  loop {
    let next = {
      let mut state = state.lock();
      match state.tasks.pop_front() {
        Some(task) => task,
        None => {
          state.processing = false;
          return;
        }
      }
    };

    let waited = next.enqueued_at.elapsed();
    debug!(
      task = %next.label,
      waited_ms = waited.as_millis() as u64,
      "running sync task"
    );

    let outcome = match AssertUnwindSafe((next.action)()).catch_unwind().await {
      Ok(Ok(())) => TaskOutcome::Completed,
      Ok(Err(e)) => {
        warn!(task = %next.label, error = %e, "sync task failed");
        TaskOutcome::Failed
      }
      Err(_) => {
        warn!(task = %next.label, "sync task panicked");
        TaskOutcome::Failed
      }
    };
    let _ = next.done.send(outcome);

    tokio::time::sleep(delay).await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use color_eyre::eyre::eyre;

  fn explode() -> Result<()> {
    panic!("unexpected")
  }

  fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
    Arc::new(Mutex::new(Vec::new()))
  }

  fn record(
    log: &Arc<Mutex<Vec<&'static str>>>,
    name: &'static str,
  ) -> impl FnOnce() -> BoxFuture<'static, Result<()>> + Send + 'static {
    let log = Arc::clone(log);
    move || {
      async move {
        log.lock().push(name);
        Ok(())
      }
      .boxed()
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_runs_in_priority_order() {
    let queue = SyncQueue::new(Duration::from_millis(100));
    let log = recorder();

    // Current-thread runtime: nothing runs until we await
    let low = queue.enqueue("low", Priority::Low, record(&log, "low"));
    let critical = queue.enqueue("critical", Priority::Critical, record(&log, "critical"));
    let normal = queue.enqueue("normal", Priority::Normal, record(&log, "normal"));

    assert_eq!(low.wait().await, TaskOutcome::Completed);
    assert_eq!(critical.wait().await, TaskOutcome::Completed);
    assert_eq!(normal.wait().await, TaskOutcome::Completed);
    assert_eq!(*log.lock(), vec!["critical", "normal", "low"]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_fifo_within_priority() {
    let queue = SyncQueue::new(Duration::from_millis(100));
    let log = recorder();

    let handles = vec![
      queue.enqueue("a", Priority::Normal, record(&log, "a")),
      queue.enqueue("b", Priority::Normal, record(&log, "b")),
      queue.enqueue("c", Priority::High, record(&log, "c")),
      queue.enqueue("d", Priority::Normal, record(&log, "d")),
    ];
    for handle in handles {
      handle.wait().await;
    }
    assert_eq!(*log.lock(), vec!["c", "a", "b", "d"]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_failure_does_not_stop_queue() {
    let queue = SyncQueue::new(Duration::from_millis(100));
    let log = recorder();

    let failing = queue.enqueue("failing", Priority::High, || async {
      Err::<(), _>(eyre!("boom"))
    });
    let panicking = queue.enqueue("panicking", Priority::High, || async { explode() });
    let after = queue.enqueue("after", Priority::Low, record(&log, "after"));

    assert_eq!(failing.wait().await, TaskOutcome::Failed);
    assert_eq!(panicking.wait().await, TaskOutcome::Failed);
    assert_eq!(after.wait().await, TaskOutcome::Completed);
    assert_eq!(*log.lock(), vec!["after"]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_one_task_at_a_time_with_cooldown() {
    let queue = SyncQueue::new(Duration::from_millis(100));
    let starts = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for _ in 0..3 {
      let starts = Arc::clone(&starts);
      handles.push(queue.enqueue("slow", Priority::Normal, move || async move {
        starts.lock().push(Instant::now());
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok::<(), color_eyre::Report>(())
      }));
    }
    for handle in handles {
      handle.wait().await;
    }

    let starts = starts.lock();
    for pair in starts.windows(2) {
      assert!(pair[1] - pair[0] >= Duration::from_millis(600));
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_restarts_after_idle() {
    let queue = SyncQueue::new(Duration::from_millis(100));
    let log = recorder();

    queue.enqueue("first", Priority::Normal, record(&log, "first")).wait().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!queue.is_processing());

    queue.enqueue("second", Priority::Normal, record(&log, "second")).wait().await;
    assert_eq!(*log.lock(), vec!["first", "second"]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_clear_drops_waiting_tasks() {
    let queue = SyncQueue::new(Duration::from_millis(100));
    let log = recorder();

    let first = queue.enqueue("first", Priority::Normal, record(&log, "first"));
    let second = queue.enqueue("second", Priority::Normal, record(&log, "second"));
    assert_eq!(queue.len(), 2);

    queue.clear();
    assert_eq!(first.wait().await, TaskOutcome::Dropped);
    assert_eq!(second.wait().await, TaskOutcome::Dropped);
    assert!(log.lock().is_empty());
  }
}
