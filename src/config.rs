use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::api::RequestConfig;
use crate::cache::TtlPolicy;
use crate::sync::SchedulerConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  #[serde(default)]
  pub user: UserConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  pub timeout_secs: u64,
  pub max_retries: u32,
  pub retry_delay_ms: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8080".to_string(),
      timeout_secs: 15,
      max_retries: 2,
      retry_delay_ms: 1000,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub default_ttl_secs: u64,
  pub max_entries: usize,
  /// TTL overrides by key prefix, in seconds
  pub namespaces: BTreeMap<String, u64>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      default_ttl_secs: 60,
      max_entries: 100,
      namespaces: BTreeMap::new(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  pub short_interval_secs: u64,
  pub long_interval_secs: u64,
  pub activity_window_secs: u64,
  pub queue_delay_ms: u64,
  /// Staleness thresholds per domain, in seconds
  pub thresholds: ThresholdConfig,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      short_interval_secs: 120,
      long_interval_secs: 600,
      activity_window_secs: 300,
      queue_delay_ms: 100,
      thresholds: ThresholdConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
  pub balance: u64,
  pub flex: u64,
  pub daily: u64,
  pub tasks: u64,
}

impl Default for ThresholdConfig {
  fn default() -> Self {
    Self {
      balance: 30,
      flex: 60,
      daily: 60,
      tasks: 120,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserConfig {
  /// Telegram user id, takes precedence over anything stored
  pub id: Option<String>,
  /// Connected TON wallet, enables flex sync
  pub wallet: Option<String>,
  /// Telegram WebApp init data sent on authentication
  pub init_data: Option<String>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./winix.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/winix/config.yaml
  ///
  /// Without any file the defaults are used. Environment overrides
  /// (`WINIX_API_URL`, `WINIX_USER_ID`) are applied last.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };
    config.apply_env(|name| std::env::var(name).ok());
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("winix.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("winix").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty file is a valid, all-default config
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }

  fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
    if let Some(url) = var("WINIX_API_URL").filter(|v| !v.is_empty()) {
      self.api.base_url = url;
    }
    if let Some(id) = var("WINIX_USER_ID").filter(|v| !v.is_empty()) {
      self.user.id = Some(id);
    }
  }

  pub fn request_config(&self) -> Result<RequestConfig> {
    let base_url = Url::parse(&self.api.base_url)
      .map_err(|e| eyre!("Invalid API base URL {}: {}", self.api.base_url, e))?;

    Ok(RequestConfig {
      timeout: Duration::from_secs(self.api.timeout_secs),
      max_retries: self.api.max_retries,
      base_delay: Duration::from_millis(self.api.retry_delay_ms),
      ..RequestConfig::new(base_url)
    })
  }

  /// Built-in namespace TTLs with the configured overrides on top.
  pub fn ttl_policy(&self) -> TtlPolicy {
    let defaults = TtlPolicy::default();
    let base = TtlPolicy::new(Duration::from_secs(self.cache.default_ttl_secs));
    let base = defaults
      .namespaces()
      .fold(base, |policy, (prefix, ttl)| policy.with_namespace(prefix, ttl));

    self
      .cache
      .namespaces
      .iter()
      .fold(base, |policy, (prefix, secs)| {
        policy.with_namespace(prefix.clone(), Duration::from_secs(*secs))
      })
  }

  pub fn scheduler_config(&self) -> SchedulerConfig {
    let sync = &self.sync;
    SchedulerConfig {
      short_interval: Duration::from_secs(sync.short_interval_secs),
      long_interval: Duration::from_secs(sync.long_interval_secs),
      activity_window: Duration::from_secs(sync.activity_window_secs),
      balance_threshold: Duration::from_secs(sync.thresholds.balance),
      flex_threshold: Duration::from_secs(sync.thresholds.flex),
      daily_threshold: Duration::from_secs(sync.thresholds.daily),
      tasks_threshold: Duration::from_secs(sync.thresholds.tasks),
      ..SchedulerConfig::default()
    }
  }

  pub fn queue_delay(&self) -> Duration {
    Duration::from_millis(self.sync.queue_delay_ms)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_partial_file_keeps_defaults() {
    let config = Config::parse(
      r#"
api:
  base_url: https://api.winix.test
cache:
  namespaces:
    balance: 10
user:
  id: "42"
"#,
    )
    .unwrap();

    assert_eq!(config.api.base_url, "https://api.winix.test");
    assert_eq!(config.api.max_retries, 2);
    assert_eq!(config.sync.thresholds.tasks, 120);
    assert_eq!(config.user.id.as_deref(), Some("42"));

    let policy = config.ttl_policy();
    assert_eq!(policy.ttl_for("balance_123"), Duration::from_secs(10));
    assert_eq!(policy.ttl_for("tasks_list"), Duration::from_secs(120));
    assert_eq!(policy.ttl_for("other"), Duration::from_secs(60));
  }

  #[test]
  fn test_empty_file_is_default() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.sync.short_interval_secs, 120);
    assert_eq!(config.scheduler_config().long_interval, Duration::from_secs(600));
  }

  #[test]
  fn test_env_overrides() {
    let mut config = Config::default();
    config.apply_env(|name| match name {
      "WINIX_API_URL" => Some("https://staging.winix.test".to_string()),
      "WINIX_USER_ID" => Some("7".to_string()),
      _ => None,
    });
    assert_eq!(config.api.base_url, "https://staging.winix.test");
    assert_eq!(config.user.id.as_deref(), Some("7"));
  }

  #[test]
  fn test_invalid_base_url() {
    let mut config = Config::default();
    config.api.base_url = "not a url".to_string();
    assert!(config.request_config().is_err());
  }

  #[test]
  fn test_missing_explicit_file() {
    assert!(Config::load(Some(Path::new("/nonexistent/winix.yaml"))).is_err());
  }
}
