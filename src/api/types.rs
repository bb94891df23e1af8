//! Payloads exchanged with the WINIX backend.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::error::{ApiError, ErrorCode};

/// Token and coin balances
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
  #[serde(default, alias = "balance")]
  pub winix: f64,
  #[serde(default)]
  pub coins: i64,
  #[serde(default)]
  pub tickets: i64,
}

/// A quest the user can complete for a reward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default, alias = "reward_amount")]
  pub reward: f64,
  #[serde(default, rename = "type")]
  pub kind: String,
  #[serde(default = "default_task_status")]
  pub status: String,
  #[serde(default)]
  pub progress: u32,
  #[serde(default = "default_target", alias = "target_value")]
  pub target: u32,
}

/// Ids arrive as strings or numbers depending on the endpoint.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Id {
    Text(String),
    Number(serde_json::Number),
  }

  Ok(match Id::deserialize(deserializer)? {
    Id::Text(text) => text,
    Id::Number(number) => number.to_string(),
  })
}

fn default_task_status() -> String {
  "available".to_string()
}

fn default_target() -> u32 {
  1
}

impl Task {
  pub fn is_completed(&self) -> bool {
    matches!(self.status.as_str(), "completed" | "claimed")
  }

  /// Overlay the user's progress on the task definition.
  pub fn apply_progress(&mut self, progress: &TaskProgress) {
    self.status = progress.status.clone();
    self.progress = progress.progress;
  }
}

/// Per-user progress on a single task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
  #[serde(default = "default_task_status")]
  pub status: String,
  #[serde(default, alias = "progress_value")]
  pub progress: u32,
}

/// Progress keyed by task id
pub type ProgressMap = HashMap<String, TaskProgress>;

/// Daily login bonus state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyBonus {
  #[serde(default, alias = "current_day")]
  pub day: u32,
  #[serde(default)]
  pub streak: u32,
  #[serde(default)]
  pub claimed_today: bool,
  #[serde(default)]
  pub next_claim_at: Option<DateTime<Utc>>,
}

/// Flex (staking) status for a connected wallet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlexStatus {
  #[serde(default)]
  pub wallet: String,
  #[serde(default)]
  pub flex_balance: f64,
  #[serde(default)]
  pub level: String,
  #[serde(default)]
  pub rewards_available: bool,
}

/// Token issued by the auth endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct AuthToken {
  pub token: String,
  #[serde(default)]
  pub expires_at: Option<DateTime<Utc>>,
  /// Lifetime in seconds, used when `expires_at` is absent
  #[serde(default)]
  pub expires_in: Option<i64>,
  #[serde(default)]
  pub user_id: Option<Value>,
}

impl AuthToken {
  pub fn user_id(&self) -> Option<String> {
    match self.user_id.as_ref()? {
      Value::String(s) => Some(s.clone()),
      Value::Number(n) => Some(n.to_string()),
      _ => None,
    }
  }
}

/// Unwrap the `{status, data, message}` envelope into `T`.
///
/// A body with `status: "error"` is a failure even on a 2xx response.
/// Bodies without a `data` field are decoded as a whole.
pub fn extract_data<T: DeserializeOwned>(mut body: Value) -> Result<T, ApiError> {
  if body.get("status").and_then(Value::as_str) == Some("error") {
    let message = body
      .get("message")
      .and_then(Value::as_str)
      .unwrap_or("request failed")
      .to_string();
    let status = body
      .get("httpStatus")
      .and_then(Value::as_u64)
      .and_then(|s| u16::try_from(s).ok());
    return Err(ApiError {
      message,
      http_status: status,
      code: ErrorCode::Client,
    });
  }

  let data = if body.get("data").is_some() {
    body["data"].take()
  } else {
    body
  };

  serde_json::from_value(data).map_err(|e| ApiError::invalid_response(format!("unexpected payload: {}", e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_extract_enveloped_balance() {
    let body = json!({"status": "success", "data": {"balance": 12.5, "coins": 3}, "httpStatus": 200});
    let balance: Balance = extract_data(body).unwrap();
    assert_eq!(
      balance,
      Balance {
        winix: 12.5,
        coins: 3,
        tickets: 0
      }
    );
  }

  #[test]
  fn test_extract_bare_payload() {
    let body = json!({"token": "abc", "expires_in": 3600, "httpStatus": 200});
    let token: AuthToken = extract_data(body).unwrap();
    assert_eq!(token.token, "abc");
    assert_eq!(token.expires_in, Some(3600));
  }

  #[test]
  fn test_error_status_in_body() {
    let body = json!({"status": "error", "message": "Wallet not linked", "httpStatus": 200});
    let err = extract_data::<FlexStatus>(body).unwrap_err();
    assert_eq!(err.message, "Wallet not linked");
    assert_eq!(err.code, ErrorCode::Client);
  }

  #[test]
  fn test_invalid_payload() {
    let err = extract_data::<Vec<Task>>(json!({"data": {"not": "a list"}})).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidResponse);
  }

  #[test]
  fn test_task_defaults_and_progress() {
    let mut task: Task = serde_json::from_value(json!({
      "id": "t1",
      "title": "Join channel",
      "type": "social",
      "reward_amount": 50
    }))
    .unwrap();
    assert_eq!(task.status, "available");
    assert_eq!(task.target, 1);
    assert!(!task.is_completed());

    task.apply_progress(&TaskProgress {
      status: "completed".to_string(),
      progress: 1,
    });
    assert!(task.is_completed());
  }

  #[test]
  fn test_task_numeric_id() {
    let tasks: Vec<Task> = extract_data(json!({
      "data": [{"id": 7, "title": "Invite a friend"}, {"id": "t2", "title": "Follow"}]
    }))
    .unwrap();
    assert_eq!(tasks[0].id, "7");
    assert_eq!(tasks[1].id, "t2");
  }

  #[test]
  fn test_auth_token_numeric_user_id() {
    let token: AuthToken = serde_json::from_value(json!({"token": "t", "user_id": 42})).unwrap();
    assert_eq!(token.user_id().as_deref(), Some("42"));
  }
}
