//! Composition root for the cache and sync services.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::api::{Identity, RequestLayer, ReqwestTransport, Transport, WinixClient};
use crate::auth::SessionManager;
use crate::cache::TtlCache;
use crate::config::Config;
use crate::store::{self, keys, KeyValueStore};
use crate::sync::{
  snapshot_key, ActivityTracker, Domain, EventBus, SyncHistory, SyncQueue, SyncScheduler,
  SyncService,
};

/// Every long-lived service, wired together.
///
/// Nothing here is global: dropping the context after `dispose` and
/// building a new one starts from a clean slate, apart from what the
/// store persisted.
pub struct SyncContext {
  client: WinixClient,
  cache: TtlCache,
  store: Arc<dyn KeyValueStore>,
  identity: Arc<Identity>,
  activity: Arc<ActivityTracker>,
  history: Arc<SyncHistory>,
  events: EventBus,
  scheduler: SyncScheduler,
}

impl SyncContext {
  /// Build a context talking to the configured backend over HTTP.
  pub fn build(
    config: &Config,
    store: Arc<dyn KeyValueStore>,
    launch_url: Option<Url>,
  ) -> Result<Self> {
    let transport =
      ReqwestTransport::new().map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;
    Self::with_transport(config, Arc::new(transport), store, launch_url)
  }

  pub fn with_transport(
    config: &Config,
    transport: Arc<dyn Transport>,
    store: Arc<dyn KeyValueStore>,
    launch_url: Option<Url>,
  ) -> Result<Self> {
    let mut identity = Identity::new().with_store(Arc::clone(&store));
    if let Some(id) = config.user.id.clone() {
      identity = identity.with_user_id(id);
    }
    if let Some(url) = launch_url {
      identity = identity.with_launch_url(url);
    }
    let identity = Arc::new(identity);

    let cache = TtlCache::new(config.ttl_policy()).with_max_entries(config.cache.max_entries);
    let requests = RequestLayer::new(
      transport,
      Arc::clone(&identity),
      cache.clone(),
      config.request_config()?,
    );
    let client = WinixClient::new(Arc::new(requests));

    let activity = Arc::new(ActivityTracker::default());
    let wallet = match config.user.wallet.clone() {
      Some(wallet) => Some(wallet),
      None => store::read::<String>(store.as_ref(), keys::WALLET_ADDRESS)?,
    };
    activity.set_wallet(wallet);

    let history = Arc::new(SyncHistory::new());
    let events = EventBus::default();

    let service = SyncService::new(
      &client,
      cache.clone(),
      Arc::clone(&history),
      events.clone(),
      Arc::clone(&store),
      Arc::clone(&activity),
    );
    let auth = SessionManager::new(client.clone(), Arc::clone(&identity), Arc::clone(&store))
      .with_init_data(config.user.init_data.clone());

    let scheduler = SyncScheduler::new(
      config.scheduler_config(),
      Arc::new(service),
      SyncQueue::new(config.queue_delay()),
      Arc::clone(&history),
      Arc::clone(&activity),
      Arc::new(auth),
      events.clone(),
    );

    Ok(Self {
      client,
      cache,
      store,
      identity,
      activity,
      history,
      events,
      scheduler,
    })
  }

  /// Start background syncing.
  pub fn start(&self) {
    info!(user = ?self.identity.resolve_user_id(), "starting sync");
    self.scheduler.start();
  }

  /// Stop background work and drop cached data.
  pub fn dispose(&self) {
    self.scheduler.dispose();
    self.cache.clear();
  }

  /// Forget cached responses and snapshots so the next cycle refetches.
  /// Returns how many entries were dropped.
  pub fn clear_cache(&self) -> usize {
    let count = self.cache.len();
    if !self.cache.is_empty() {
      info!(count, "clearing cache");
    }
    self.cache.clear();
    self.history.clear();
    count
  }

  /// Connect or disconnect a wallet; enables or disables flex sync.
  pub fn set_wallet(&self, wallet: Option<String>) {
    let result = match &wallet {
      Some(address) => store::write(self.store.as_ref(), keys::WALLET_ADDRESS, address),
      None => self.store.remove(keys::WALLET_ADDRESS),
    };
    if let Err(e) = result {
      warn!(error = %e, "failed to persist wallet address");
    }
    // The old wallet's snapshot must not mask the new wallet's status
    if let Some(user) = self.identity.resolve_user_id() {
      self.cache.invalidate(&snapshot_key(Domain::Flex, &user));
    }
    self.activity.set_wallet(wallet);
  }

  pub fn client(&self) -> &WinixClient {
    &self.client
  }

  pub fn identity(&self) -> &Arc<Identity> {
    &self.identity
  }

  pub fn activity(&self) -> &Arc<ActivityTracker> {
    &self.activity
  }

  pub fn history(&self) -> &Arc<SyncHistory> {
    &self.history
  }

  pub fn events(&self) -> &EventBus {
    &self.events
  }

  pub fn scheduler(&self) -> &SyncScheduler {
    &self.scheduler
  }
}
