use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use crate::store::StoreChange;
use crate::sync::SyncEvent;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh
  Tick,
  /// Notification from the sync layer
  Sync(SyncEvent),
  /// A persisted value changed
  Store(StoreChange),
  /// A forwarder lagged behind and dropped this many events
  Lagged(u64),
  /// Result of a backend reachability check
  Ping(bool),
}

/// Event handler that merges terminal input, a tick timer and sync events
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
  forwarders: Vec<tokio::task::JoinHandle<()>>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // crossterm polling blocks, keep it off the runtime threads
    let input_tx = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      let event = if event::poll(tick_rate).unwrap_or(false) {
        match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Event::Key(key),
          _ => continue,
        }
      } else {
        Event::Tick
      };

      if input_tx.send(event).is_err() {
        break;
      }
    });

    Self {
      tx,
      rx,
      forwarders: Vec::new(),
    }
  }

  /// Forward sync events and store changes into this handler, replacing
  /// any previous sources.
  pub fn follow(
    &mut self,
    sync_events: broadcast::Receiver<SyncEvent>,
    store_changes: broadcast::Receiver<StoreChange>,
  ) {
    for previous in self.forwarders.drain(..) {
      previous.abort();
    }

    self.forwarders.push(self.forward(sync_events, Event::Sync));
    self.forwarders.push(self.forward(store_changes, Event::Store));
  }

  fn forward<T>(
    &self,
    mut source: broadcast::Receiver<T>,
    wrap: fn(T) -> Event,
  ) -> tokio::task::JoinHandle<()>
  where
    T: Clone + Send + 'static,
  {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      loop {
        let event = match source.recv().await {
          Ok(value) => wrap(value),
          Err(broadcast::error::RecvError::Lagged(skipped)) => Event::Lagged(skipped),
          Err(broadcast::error::RecvError::Closed) => break,
        };
        if tx.send(event).is_err() {
          break;
        }
      }
    })
  }

  /// Sender for background tasks reporting back to the app
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
