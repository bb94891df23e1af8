//! Scripted transport for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

use super::transport::{HttpRequest, HttpResponse, Transport, TransportError};

#[derive(Debug, Clone)]
enum Reply {
  Response(u16, String),
  Failure,
}

/// Transport answering by URL path.
///
/// Each path holds a queue of replies; the last one repeats forever.
/// Unknown paths answer 404.
#[derive(Default)]
pub struct MockTransport {
  routes: Mutex<HashMap<String, VecDeque<Reply>>>,
  calls: Mutex<Vec<(Instant, HttpRequest)>>,
  latency: Option<Duration>,
}

impl MockTransport {
  pub fn new() -> Self {
    Self::default()
  }

  /// Delay every reply.
  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = Some(latency);
    self
  }

  pub fn respond(&self, path: &str, status: u16, body: &str) {
    self.respond_sequence(path, vec![(status, body.to_string())]);
  }

  pub fn respond_sequence(&self, path: &str, replies: Vec<(u16, String)>) {
    self.routes.lock().insert(
      path.to_string(),
      replies
        .into_iter()
        .map(|(status, body)| Reply::Response(status, body))
        .collect(),
    );
  }

  /// Make every request to `path` fail at the transport level.
  pub fn fail(&self, path: &str) {
    self
      .routes
      .lock()
      .insert(path.to_string(), VecDeque::from([Reply::Failure]));
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().len()
  }

  pub fn calls_to(&self, path: &str) -> usize {
    self
      .calls
      .lock()
      .iter()
      .filter(|(_, request)| request.url.path() == path)
      .count()
  }

  pub fn call_times(&self) -> Vec<Instant> {
    self.calls.lock().iter().map(|(at, _)| *at).collect()
  }

  pub fn requests(&self) -> Vec<HttpRequest> {
    self
      .calls
      .lock()
      .iter()
      .map(|(_, request)| request.clone())
      .collect()
  }

  fn next_reply(&self, path: &str) -> Reply {
    let mut routes = self.routes.lock();
    match routes.get_mut(path) {
      Some(replies) if replies.len() > 1 => replies.pop_front().unwrap_or(Reply::Failure),
      Some(replies) => replies.front().cloned().unwrap_or(Reply::Failure),
      None => Reply::Response(404, r#"{"message":"no mock route"}"#.to_string()),
    }
  }
}

#[async_trait]
impl Transport for MockTransport {
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    let path = request.url.path().to_string();
    self.calls.lock().push((Instant::now(), request));

    if let Some(latency) = self.latency {
      tokio::time::sleep(latency).await;
    }

    match self.next_reply(&path) {
      Reply::Response(status, body) => Ok(HttpResponse { status, body }),
      Reply::Failure => Err(TransportError("connection refused".to_string())),
    }
  }
}
