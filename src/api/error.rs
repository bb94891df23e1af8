use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Classification of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
  /// Connection or transport failure
  Network,
  /// The attempt did not finish within the timeout
  Timeout,
  /// HTTP 5xx
  Server,
  /// HTTP 4xx other than 401, 403 and 429
  Client,
  /// HTTP 429
  RateLimited,
  /// HTTP 401/403, or a session the server no longer accepts
  Unauthorized,
  /// No user id could be resolved for an identity-bound request
  MissingIdentity,
  /// The response could not be understood
  InvalidResponse,
}

impl ErrorCode {
  /// Classify a non-success HTTP status.
  pub fn from_status(status: u16) -> Self {
    match status {
      401 | 403 => Self::Unauthorized,
      429 => Self::RateLimited,
      400..=499 => Self::Client,
      500..=599 => Self::Server,
      _ => Self::InvalidResponse,
    }
  }

  /// Whether the request layer retries a failure of this kind.
  pub fn is_retryable(self) -> bool {
    matches!(
      self,
      Self::Network | Self::Timeout | Self::Server | Self::RateLimited
    )
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Network => "network",
      Self::Timeout => "timeout",
      Self::Server => "server",
      Self::Client => "client",
      Self::RateLimited => "rate_limited",
      Self::Unauthorized => "unauthorized",
      Self::MissingIdentity => "missing_identity",
      Self::InvalidResponse => "invalid_response",
    }
  }
}

/// Terminal failure of a request, returned to callers as a value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
  pub message: String,
  pub http_status: Option<u16>,
  pub code: ErrorCode,
}

impl ApiError {
  pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      http_status: None,
      code,
    }
  }

  pub fn network(message: impl Into<String>) -> Self {
    Self::new(ErrorCode::Network, message)
  }

  pub fn timeout(after: Duration) -> Self {
    Self::new(
      ErrorCode::Timeout,
      format!("request timed out after {}ms", after.as_millis()),
    )
  }

  pub fn missing_identity() -> Self {
    Self::new(ErrorCode::MissingIdentity, "user id is not available")
  }

  pub fn invalid_response(message: impl Into<String>) -> Self {
    Self::new(ErrorCode::InvalidResponse, message)
  }

  /// Build an error from a non-success response, keeping the server message.
  pub fn from_response(status: u16, body: &str) -> Self {
    Self {
      message: server_message(body).unwrap_or_else(|| format!("HTTP {}", status)),
      http_status: Some(status),
      code: ErrorCode::from_status(status),
    }
  }

  pub fn is_auth_failure(&self) -> bool {
    self.code == ErrorCode::Unauthorized
  }
}

/// Extract `message` or `error` from a JSON error body.
fn server_message(body: &str) -> Option<String> {
  let value: Value = serde_json::from_str(body).ok()?;
  ["message", "error"]
    .iter()
    .find_map(|field| value.get(field).and_then(Value::as_str))
    .filter(|message| !message.is_empty())
    .map(String::from)
}
