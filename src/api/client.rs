use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use super::error::ApiError;
use super::request::{RequestLayer, RequestOptions};
use super::types::{extract_data, AuthToken, Balance, DailyBonus, FlexStatus, ProgressMap, Task};

/// Typed WINIX API client
#[derive(Clone)]
pub struct WinixClient {
  requests: Arc<RequestLayer>,
  use_cache: bool,
}

impl WinixClient {
  pub fn new(requests: Arc<RequestLayer>) -> Self {
    Self {
      requests,
      use_cache: true,
    }
  }

  /// A client whose reads always go to the network.
  pub fn uncached(&self) -> Self {
    Self {
      requests: Arc::clone(&self.requests),
      use_cache: false,
    }
  }

  pub fn requests(&self) -> &Arc<RequestLayer> {
    &self.requests
  }

  fn read(&self) -> RequestOptions {
    let options = RequestOptions::get();
    if self.use_cache {
      options
    } else {
      options.no_cache()
    }
  }

  fn user_id(&self) -> Result<String, ApiError> {
    self
      .requests
      .identity()
      .resolve_user_id()
      .ok_or_else(ApiError::missing_identity)
  }

  /// Check backend reachability with a single short attempt.
  pub async fn ping(&self) -> bool {
    let options = RequestOptions::get()
      .no_cache()
      .anonymous()
      .with_retries(0)
      .with_timeout(Duration::from_secs(5));

    self.requests.request("/api/ping", options).await.is_ok()
  }

  /// Exchange the user id (and Telegram init data, if any) for a token.
  pub async fn authenticate(&self, init_data: Option<&str>) -> Result<AuthToken, ApiError> {
    let user_id = self.user_id()?;
    let body = json!({
      "telegram_id": user_id,
      "init_data": init_data,
    });

    let value = self
      .requests
      .request("/api/auth", RequestOptions::post(body))
      .await?;
    extract_data(value)
  }

  pub async fn refresh_token(&self, token: &str) -> Result<AuthToken, ApiError> {
    let value = self
      .requests
      .request(
        "/api/auth/refresh-token",
        RequestOptions::post(json!({ "token": token })),
      )
      .await?;
    extract_data(value)
  }

  pub async fn get_balance(&self) -> Result<Balance, ApiError> {
    let endpoint = format!("/api/user/{}/balance", self.user_id()?);
    let value = self.requests.request(&endpoint, self.read()).await?;
    extract_data(value)
  }

  pub async fn get_daily_bonus(&self) -> Result<DailyBonus, ApiError> {
    let endpoint = format!("/api/user/{}/daily-bonus", self.user_id()?);
    let value = self.requests.request(&endpoint, self.read()).await?;
    extract_data(value)
  }

  pub async fn get_flex_status(&self, wallet: &str) -> Result<FlexStatus, ApiError> {
    let wallet_param: String = url::form_urlencoded::byte_serialize(wallet.as_bytes()).collect();
    let endpoint = format!(
      "/api/user/{}/flex-status?wallet={}",
      self.user_id()?,
      wallet_param
    );
    let value = self.requests.request(&endpoint, self.read()).await?;
    extract_data(value)
  }

  pub async fn get_tasks(&self) -> Result<Vec<Task>, ApiError> {
    let value = self.requests.request("/quests/tasks", self.read()).await?;
    extract_data(value)
  }

  pub async fn get_progress(&self) -> Result<ProgressMap, ApiError> {
    let endpoint = format!("/user/{}/progress", self.user_id()?);
    let value = self.requests.request(&endpoint, self.read()).await?;
    extract_data(value)
  }

  /// Fetch tasks and progress together and merge them.
  pub async fn get_tasks_with_progress(&self) -> Result<Vec<Task>, ApiError> {
    let (mut tasks, progress) = futures::try_join!(self.get_tasks(), self.get_progress())?;

    for task in &mut tasks {
      if let Some(p) = progress.get(&task.id) {
        task.apply_progress(p);
      }
    }
    Ok(tasks)
  }
}
