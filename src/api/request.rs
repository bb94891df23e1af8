//! Request layer: timeouts, retries with backoff, read-through caching.

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use super::error::{ApiError, ErrorCode};
use super::identity::Identity;
use super::transport::{HttpRequest, HttpResponse, Method, Transport};
use crate::cache::TtlCache;

/// Namespace for cached GET responses.
const REQUEST_CACHE_PREFIX: &str = "request:";

/// Settings shared by every request.
#[derive(Debug, Clone)]
pub struct RequestConfig {
  pub base_url: Url,
  /// Upper bound for a single attempt
  pub timeout: Duration,
  /// Extra attempts after the first one
  pub max_retries: u32,
  /// Delay before the first retry, growing by 1.5x per retry
  pub base_delay: Duration,
}

impl RequestConfig {
  pub fn new(base_url: Url) -> Self {
    Self {
      base_url,
      timeout: Duration::from_secs(15),
      max_retries: 2,
      base_delay: Duration::from_secs(1),
    }
  }

  /// Delay before retry number `retry` (1-based).
  pub fn backoff(&self, retry: u32) -> Duration {
    let exponent = retry.saturating_sub(1) as i32;
    self.base_delay.mul_f64(1.5f64.powi(exponent))
  }
}

/// Per-call options.
#[derive(Debug, Clone)]
pub struct RequestOptions {
  pub method: Method,
  pub body: Option<Value>,
  /// Read GET responses from the cache and store them afterwards
  pub use_cache: bool,
  /// Fail with `missing_identity` instead of sending without `X-User-Id`
  pub requires_identity: bool,
  pub timeout: Option<Duration>,
  pub max_retries: Option<u32>,
}

impl RequestOptions {
  fn with_method(method: Method, body: Option<Value>) -> Self {
    Self {
      method,
      body,
      use_cache: method == Method::Get,
      requires_identity: true,
      timeout: None,
      max_retries: None,
    }
  }

  pub fn get() -> Self {
    Self::with_method(Method::Get, None)
  }

  pub fn post(body: Value) -> Self {
    Self::with_method(Method::Post, Some(body))
  }

  pub fn no_cache(mut self) -> Self {
    self.use_cache = false;
    self
  }

  /// Allow sending without a resolved user id.
  pub fn anonymous(mut self) -> Self {
    self.requires_identity = false;
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  pub fn with_retries(mut self, max_retries: u32) -> Self {
    self.max_retries = Some(max_retries);
    self
  }
}

/// One network attempt, kept only for logging.
struct RequestAttempt<'a> {
  method: Method,
  url: &'a Url,
  attempt: u32,
  started: Instant,
}

impl RequestAttempt<'_> {
  fn elapsed(&self) -> Duration {
    self.started.elapsed()
  }
}

/// Sends API requests with retry, timeout and caching policy applied.
pub struct RequestLayer {
  transport: Arc<dyn Transport>,
  identity: Arc<Identity>,
  cache: TtlCache,
  config: RequestConfig,
}

impl RequestLayer {
  pub fn new(
    transport: Arc<dyn Transport>,
    identity: Arc<Identity>,
    cache: TtlCache,
    config: RequestConfig,
  ) -> Self {
    Self {
      transport,
      identity,
      cache,
      config,
    }
  }

  pub fn identity(&self) -> &Arc<Identity> {
    &self.identity
  }

  /// Drop every cached GET response.
  pub fn clear_cache(&self) {
    self.cache.invalidate_prefix(REQUEST_CACHE_PREFIX);
  }

  /// Resolve an endpoint against the base URL. Absolute URLs pass through.
  pub fn resolve_url(&self, endpoint: &str) -> Result<Url, ApiError> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
      return Url::parse(endpoint)
        .map_err(|e| ApiError::new(ErrorCode::Client, format!("invalid URL {}: {}", endpoint, e)));
    }

    let base = self.config.base_url.as_str().trim_end_matches('/');
    let path = endpoint.trim_start_matches('/');
    Url::parse(&format!("{}/{}", base, path))
      .map_err(|e| ApiError::new(ErrorCode::Client, format!("invalid endpoint {}: {}", endpoint, e)))
  }

  /// Perform a request.
  ///
  /// Network failures, timeouts, 5xx and 429 responses are retried with
  /// exponential backoff. Other 4xx responses fail immediately. A failure is
  /// always returned as an `ApiError` value.
  pub async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<Value, ApiError> {
    let url = self.resolve_url(endpoint)?;

    let user_id = self.identity.resolve_user_id();
    if user_id.is_none() && options.requires_identity {
      warn!(method = %options.method, url = %url, "refusing request without user id");
      return Err(ApiError::missing_identity());
    }

    let cacheable = options.method == Method::Get && options.use_cache;
    let cache_key = cache_key(options.method, &url, options.body.as_ref());
    if cacheable {
      if let Some(cached) = self.cache.get(&cache_key) {
        debug!(url = %url, "request served from cache");
        return Ok(cached);
      }
    }

    let mut headers = vec![
      ("Content-Type".to_string(), "application/json".to_string()),
      ("Accept".to_string(), "application/json".to_string()),
    ];
    if let Some(id) = user_id {
      headers.push(("X-User-Id".to_string(), id));
    }
    if let Some(token) = self.identity.token() {
      headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
    }

    let request = HttpRequest {
      method: options.method,
      url,
      headers,
      body: options.body.clone(),
    };

    let value = self.send_with_retry(&request, &options).await?;

    if cacheable {
      self.cache.set(&cache_key, value.clone(), None);
    } else if options.method != Method::Get {
      // Writes can change anything a cached GET returned
      self.clear_cache();
    }

    Ok(value)
  }

  async fn send_with_retry(
    &self,
    request: &HttpRequest,
    options: &RequestOptions,
  ) -> Result<Value, ApiError> {
    let timeout = options.timeout.unwrap_or(self.config.timeout);
    let max_retries = options.max_retries.unwrap_or(self.config.max_retries);
    let mut attempt = 0;

    loop {
      let record = RequestAttempt {
        method: request.method,
        url: &request.url,
        attempt: attempt + 1,
        started: Instant::now(),
      };

      let error = match tokio::time::timeout(timeout, self.transport.send(request.clone())).await {
        Ok(Ok(response)) if response.is_success() => {
          debug!(
            method = %record.method,
            url = %record.url,
            attempt = record.attempt,
            status = response.status,
            elapsed_ms = record.elapsed().as_millis() as u64,
            "request succeeded"
          );
          return Ok(parse_success(&response));
        }
        Ok(Ok(response)) => ApiError::from_response(response.status, &response.body),
        Ok(Err(e)) => ApiError::network(e.to_string()),
        Err(_) => ApiError::timeout(timeout),
      };

      debug!(
        method = %record.method,
        url = %record.url,
        attempt = record.attempt,
        code = error.code.as_str(),
        elapsed_ms = record.elapsed().as_millis() as u64,
        "request attempt failed"
      );

      if !error.code.is_retryable() || attempt >= max_retries {
        if error.code.is_retryable() {
          warn!(
            url = %request.url,
            attempts = attempt + 1,
            error = %error,
            "request failed after all retries"
          );
        }
        return Err(error);
      }

      attempt += 1;
      let delay = self.config.backoff(attempt);
      warn!(
        url = %request.url,
        retry = attempt,
        delay_ms = delay.as_millis() as u64,
        error = %error,
        "retrying request"
      );
      tokio::time::sleep(delay).await;
    }
  }
}

/// Stable cache key for a request.
fn cache_key(method: Method, url: &Url, body: Option<&Value>) -> String {
  let mut hasher = Sha256::new();
  hasher.update(method.as_str().as_bytes());
  hasher.update(b"\n");
  hasher.update(url.as_str().as_bytes());
  hasher.update(b"\n");
  if let Some(body) = body {
    hasher.update(body.to_string().as_bytes());
  }
  format!("{}{}", REQUEST_CACHE_PREFIX, hex::encode(hasher.finalize()))
}

/// Parse a 2xx body, annotating it with the HTTP status.
fn parse_success(response: &HttpResponse) -> Value {
  match serde_json::from_str::<Value>(&response.body) {
    Ok(Value::Object(mut map)) => {
      map.insert("httpStatus".to_string(), json!(response.status));
      Value::Object(map)
    }
    Ok(other) => json!({
      "status": "success",
      "data": other,
      "httpStatus": response.status,
    }),
    Err(_) => json!({
      "status": "success",
      "message": response.body.trim(),
      "httpStatus": response.status,
    }),
  }
}
