//! Session gate in front of background sync.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::types::AuthToken;
use crate::api::{ApiError, ErrorCode, Identity, WinixClient};
use crate::store::{self, keys, KeyValueStore, StoreError};

/// Token lifetime assumed when the server does not send one.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
  #[error("no user id available to authenticate")]
  MissingIdentity,
  /// The server rejected the session; only a full restart can recover
  #[error("session rejected: {0}")]
  SessionInvalid(String),
  #[error("auth service unavailable: {0}")]
  Unavailable(ApiError),
  #[error(transparent)]
  Store(#[from] StoreError),
}

impl AuthError {
  pub fn requires_reload(&self) -> bool {
    matches!(self, AuthError::SessionInvalid(_))
  }
}

impl From<ApiError> for AuthError {
  fn from(err: ApiError) -> Self {
    match err.code {
      ErrorCode::Unauthorized => AuthError::SessionInvalid(err.message),
      ErrorCode::MissingIdentity => AuthError::MissingIdentity,
      _ => AuthError::Unavailable(err),
    }
  }
}

/// A bearer token and its expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
  pub token: String,
  pub expires_at: DateTime<Utc>,
}

impl Session {
  fn from_token(token: &AuthToken, now: DateTime<Utc>) -> Self {
    let expires_at = token.expires_at.unwrap_or_else(|| {
      now + Duration::seconds(token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS))
    });
    Self {
      token: token.token.clone(),
      expires_at,
    }
  }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expires_at <= now
  }

  /// Whether the token expires within `window` of `now`.
  pub fn expires_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
    self.expires_at - now <= window
  }
}

/// Validates, refreshes and persists the auth session.
pub struct SessionManager {
  client: WinixClient,
  identity: Arc<Identity>,
  store: Arc<dyn KeyValueStore>,
  refresh_window: Duration,
  init_data: Option<String>,
  /// Serializes refreshes so concurrent callers share one round-trip
  refresh_lock: Mutex<()>,
}

impl SessionManager {
  pub fn new(client: WinixClient, identity: Arc<Identity>, store: Arc<dyn KeyValueStore>) -> Self {
    Self {
      client,
      identity,
      store,
      refresh_window: Duration::minutes(5),
      init_data: None,
      refresh_lock: Mutex::new(()),
    }
  }

  /// Telegram init data forwarded on first authentication.
  pub fn with_init_data(mut self, init_data: Option<String>) -> Self {
    self.init_data = init_data;
    self
  }

  /// Load the persisted session, if complete.
  pub fn load(&self) -> Result<Option<Session>, StoreError> {
    let token: Option<String> = store::read(self.store.as_ref(), keys::AUTH_TOKEN)?;
    let expires_at: Option<DateTime<Utc>> =
      store::read(self.store.as_ref(), keys::AUTH_TOKEN_EXPIRES_AT)?;

    Ok(match (token, expires_at) {
      (Some(token), Some(expires_at)) if !token.is_empty() => Some(Session { token, expires_at }),
      _ => None,
    })
  }

  fn save(&self, session: &Session, user_id: Option<String>) -> Result<(), StoreError> {
    store::write(self.store.as_ref(), keys::AUTH_TOKEN, &session.token)?;
    store::write(
      self.store.as_ref(),
      keys::AUTH_TOKEN_EXPIRES_AT,
      &session.expires_at,
    )?;
    if let Some(id) = &user_id {
      store::write(self.store.as_ref(), keys::USER_ID, id)?;
    }
    self.identity.set_session(user_id, session.token.clone());
    Ok(())
  }

  /// Forget the session locally.
  pub fn clear(&self) -> Result<(), StoreError> {
    self.identity.clear_session();
    self.store.remove(keys::AUTH_TOKEN)?;
    self.store.remove(keys::AUTH_TOKEN_EXPIRES_AT)
  }

  /// Return a session that is valid beyond the refresh window.
  ///
  /// A session close to expiry is refreshed; a missing session is created
  /// from the user id. A refresh failure that is not an outright rejection
  /// keeps the current token while it has not yet expired.
  pub async fn ensure_valid(&self) -> Result<Session, AuthError> {
    let _guard = self.refresh_lock.lock().await;
    let now = Utc::now();

    match self.load()? {
      Some(session) if !session.expires_within(self.refresh_window, now) => {
        self.identity.set_session(None, session.token.clone());
        debug!(expires_at = %session.expires_at, "session valid");
        Ok(session)
      }
      Some(session) => self.refresh(session, now).await,
      None => self.authenticate(now).await,
    }
  }

  async fn refresh(&self, current: Session, now: DateTime<Utc>) -> Result<Session, AuthError> {
    info!(expires_at = %current.expires_at, "refreshing session token");
    self.identity.set_session(None, current.token.clone());

    match self.client.refresh_token(&current.token).await {
      Ok(token) => {
        let session = Session::from_token(&token, now);
        self.save(&session, token.user_id())?;
        Ok(session)
      }
      Err(err) if err.is_auth_failure() => {
        warn!(error = %err, "session rejected during refresh");
        self.clear()?;
        Err(AuthError::SessionInvalid(err.message))
      }
      Err(err) if !current.is_expired(now) => {
        warn!(error = %err, "token refresh failed, keeping current token");
        Ok(current)
      }
      Err(err) => Err(err.into()),
    }
  }

  async fn authenticate(&self, now: DateTime<Utc>) -> Result<Session, AuthError> {
    if self.identity.resolve_user_id().is_none() {
      return Err(AuthError::MissingIdentity);
    }

    info!("authenticating");
    let token = self.client.authenticate(self.init_data.as_deref()).await?;
    let session = Session::from_token(&token, now);
    self.save(&session, token.user_id())?;
    Ok(session)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::mock::MockTransport;
  use crate::api::{RequestConfig, RequestLayer};
  use crate::cache::TtlCache;
  use crate::store::MemoryStore;
  use url::Url;

  struct Fixture {
    transport: Arc<MockTransport>,
    store: Arc<MemoryStore>,
    identity: Arc<Identity>,
    manager: SessionManager,
  }

  fn fixture() -> Fixture {
    let transport = Arc::new(MockTransport::new());
    let store = Arc::new(MemoryStore::new());
    let identity = Arc::new(Identity::new().with_user_id("42"));
    let requests = RequestLayer::new(
      transport.clone(),
      identity.clone(),
      TtlCache::default(),
      RequestConfig::new(Url::parse("https://api.winix.test").unwrap()),
    );
    let manager = SessionManager::new(
      WinixClient::new(Arc::new(requests)),
      identity.clone(),
      store.clone(),
    );
    Fixture {
      transport,
      store,
      identity,
      manager,
    }
  }

  fn persist(store: &MemoryStore, token: &str, expires_at: DateTime<Utc>) {
    store::write(store, keys::AUTH_TOKEN, &token).unwrap();
    store::write(store, keys::AUTH_TOKEN_EXPIRES_AT, &expires_at).unwrap();
  }

  #[tokio::test]
  async fn test_valid_session_needs_no_request() {
    let f = fixture();
    persist(&f.store, "tok", Utc::now() + Duration::hours(1));

    let session = f.manager.ensure_valid().await.unwrap();
    assert_eq!(session.token, "tok");
    assert_eq!(f.transport.call_count(), 0);
    assert_eq!(f.identity.token().as_deref(), Some("tok"));
  }

  #[tokio::test]
  async fn test_expiring_session_is_refreshed() {
    let f = fixture();
    persist(&f.store, "old", Utc::now() + Duration::minutes(2));
    f.transport.respond(
      "/api/auth/refresh-token",
      200,
      r#"{"status":"success","data":{"token":"new","expires_in":7200}}"#,
    );

    let session = f.manager.ensure_valid().await.unwrap();
    assert_eq!(session.token, "new");
    assert!(session.expires_at > Utc::now() + Duration::hours(1));
    assert_eq!(f.manager.load().unwrap().unwrap().token, "new");

    let request = &f.transport.requests()[0];
    assert_eq!(request.header("Authorization"), Some("Bearer old"));
  }

  #[tokio::test]
  async fn test_rejected_refresh_invalidates_session() {
    let f = fixture();
    persist(&f.store, "old", Utc::now() + Duration::minutes(2));
    f.transport.respond(
      "/api/auth/refresh-token",
      401,
      r#"{"message":"token revoked"}"#,
    );

    let err = f.manager.ensure_valid().await.unwrap_err();
    assert!(err.requires_reload());
    assert_eq!(f.manager.load().unwrap(), None);
    assert_eq!(f.identity.token(), None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_unreachable_refresh_keeps_unexpired_token() {
    let f = fixture();
    persist(&f.store, "old", Utc::now() + Duration::minutes(2));
    f.transport.fail("/api/auth/refresh-token");

    let session = f.manager.ensure_valid().await.unwrap();
    assert_eq!(session.token, "old");
  }

  #[tokio::test]
  async fn test_missing_session_authenticates() {
    let f = fixture();
    f.transport.respond(
      "/api/auth",
      200,
      r#"{"status":"success","data":{"token":"fresh","user_id":42}}"#,
    );

    let session = f.manager.ensure_valid().await.unwrap();
    assert_eq!(session.token, "fresh");
    let stored: Option<String> = store::read(f.store.as_ref(), keys::USER_ID).unwrap();
    assert_eq!(stored.as_deref(), Some("42"));
  }

  #[test]
  fn test_expiry_window() {
    let now = Utc::now();
    let session = Session {
      token: "t".to_string(),
      expires_at: now + Duration::minutes(4),
    };
    assert!(session.expires_within(Duration::minutes(5), now));
    assert!(!session.expires_within(Duration::minutes(3), now));
    assert!(!session.is_expired(now));
  }
}
