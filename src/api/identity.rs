//! User identity and bearer token resolution.

use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::store::{keys, KeyValueStore};

/// Caller-provided user id lookup, consulted first.
pub type UserIdGetter = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Resolves who the current user is.
///
/// The user id comes from the first source that yields a usable value:
/// 1. An injected getter
/// 2. The authenticated session
/// 3. The persisted store (`telegram_user_id`)
/// 4. The launch URL (`user_id`/`id` parameters, or Telegram `tgWebAppData`)
#[derive(Default)]
pub struct Identity {
  injected: Option<UserIdGetter>,
  session_user: RwLock<Option<String>>,
  token: RwLock<Option<String>>,
  store: Option<Arc<dyn KeyValueStore>>,
  launch_url: Option<Url>,
}

impl Identity {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_getter<F>(mut self, getter: F) -> Self
  where
    F: Fn() -> Option<String> + Send + Sync + 'static,
  {
    self.injected = Some(Arc::new(getter));
    self
  }

  /// Inject a fixed user id.
  pub fn with_user_id(self, user_id: impl Into<String>) -> Self {
    let user_id = user_id.into();
    self.with_getter(move || Some(user_id.clone()))
  }

  pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
    self.store = Some(store);
    self
  }

  pub fn with_launch_url(mut self, url: Url) -> Self {
    self.launch_url = Some(url);
    self
  }

  /// Resolve the user id through the fallback chain.
  pub fn resolve_user_id(&self) -> Option<String> {
    if let Some(id) = self
      .injected
      .as_ref()
      .and_then(|getter| getter())
      .and_then(|raw| normalize_user_id(&raw))
    {
      return Some(id);
    }

    if let Some(id) = self.session_user.read().clone() {
      return Some(id);
    }

    if let Some(id) = self.stored_user_id() {
      return Some(id);
    }

    let id = self.launch_url.as_ref().and_then(user_id_from_url);
    if id.is_none() {
      debug!("no user id source produced a value");
    }
    id
  }

  fn stored_user_id(&self) -> Option<String> {
    let store = self.store.as_ref()?;
    match store.get(keys::USER_ID) {
      Ok(Some(value)) => value_as_id(&value),
      Ok(None) => None,
      Err(e) => {
        warn!(error = %e, "failed to read stored user id");
        None
      }
    }
  }

  /// Record the authenticated session.
  pub fn set_session(&self, user_id: Option<String>, token: String) {
    if let Some(id) = user_id.as_deref().and_then(normalize_user_id) {
      *self.session_user.write() = Some(id);
    }
    *self.token.write() = Some(token);
  }

  pub fn clear_session(&self) {
    *self.session_user.write() = None;
    *self.token.write() = None;
  }

  /// Current bearer token, if authenticated.
  pub fn token(&self) -> Option<String> {
    self.token.read().clone()
  }
}

/// Reject empty and placeholder ids.
fn normalize_user_id(raw: &str) -> Option<String> {
  let trimmed = raw.trim();
  match trimmed {
    "" | "undefined" | "null" => None,
    id => Some(id.to_string()),
  }
}

fn value_as_id(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => normalize_user_id(s),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

/// Extract a user id from launch URL parameters.
fn user_id_from_url(url: &Url) -> Option<String> {
  let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
  if let Some(fragment) = url.fragment() {
    pairs.extend(url::form_urlencoded::parse(fragment.as_bytes()).into_owned());
  }

  for (name, value) in &pairs {
    match name.as_str() {
      "user_id" | "id" => {
        if let Some(id) = normalize_user_id(value) {
          return Some(id);
        }
      }
      "tgWebAppData" => {
        if let Some(id) = user_id_from_init_data(value) {
          return Some(id);
        }
      }
      _ => {}
    }
  }
  None
}

/// Telegram init data is itself form-encoded, with `user` holding JSON.
fn user_id_from_init_data(init_data: &str) -> Option<String> {
  url::form_urlencoded::parse(init_data.as_bytes())
    .find(|(name, _)| name == "user")
    .and_then(|(_, user)| serde_json::from_str::<Value>(&user).ok())
    .and_then(|user| user.get("id").and_then(value_as_id))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryStore;
  use serde_json::json;

  #[test]
  fn test_injected_getter_wins() {
    let store = Arc::new(MemoryStore::new());
    store.set(keys::USER_ID, &json!("stored")).unwrap();

    let identity = Identity::new().with_user_id("injected").with_store(store);
    assert_eq!(identity.resolve_user_id().as_deref(), Some("injected"));
  }

  #[test]
  fn test_placeholder_getter_falls_through() {
    let identity = Identity::new()
      .with_getter(|| Some("undefined".to_string()))
      .with_launch_url(Url::parse("https://app.test/?user_id=99").unwrap());
    assert_eq!(identity.resolve_user_id().as_deref(), Some("99"));
  }

  #[test]
  fn test_session_before_store() {
    let store = Arc::new(MemoryStore::new());
    store.set(keys::USER_ID, &json!(555)).unwrap();

    let identity = Identity::new().with_store(store);
    assert_eq!(identity.resolve_user_id().as_deref(), Some("555"));

    identity.set_session(Some("777".to_string()), "tok".to_string());
    assert_eq!(identity.resolve_user_id().as_deref(), Some("777"));
    assert_eq!(identity.token().as_deref(), Some("tok"));

    identity.clear_session();
    assert_eq!(identity.resolve_user_id().as_deref(), Some("555"));
    assert_eq!(identity.token(), None);
  }

  #[test]
  fn test_telegram_init_data_in_fragment() {
    let init_data = url::form_urlencoded::Serializer::new(String::new())
      .append_pair("user", r#"{"id":123456,"first_name":"A"}"#)
      .append_pair("auth_date", "1700000000")
      .finish();
    let fragment = url::form_urlencoded::Serializer::new(String::new())
      .append_pair("tgWebAppData", &init_data)
      .finish();
    let url = Url::parse(&format!("https://app.test/index.html#{}", fragment)).unwrap();

    let identity = Identity::new().with_launch_url(url);
    assert_eq!(identity.resolve_user_id().as_deref(), Some("123456"));
  }

  #[test]
  fn test_nothing_resolves() {
    let identity = Identity::new().with_launch_url(Url::parse("https://app.test/?tab=earn").unwrap());
    assert_eq!(identity.resolve_user_id(), None);
  }
}
