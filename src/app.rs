use crate::api::types::{Balance, DailyBonus, FlexStatus, Task};
use crate::cache::Diff;
use crate::commands::{self, Command};
use crate::config::Config;
use crate::context::SyncContext;
use crate::event::{Event, EventHandler};
use crate::store::{self, keys, KeyValueStore, StoreChange};
use crate::sync::{Domain, SyncEvent};
use crate::ui;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use url::Url;

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  Command,
}

/// Dashboard tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
  Home,
  Earn,
  Wallet,
}

impl Tab {
  pub const ALL: [Tab; 3] = [Tab::Home, Tab::Earn, Tab::Wallet];

  /// Name reported to the activity tracker
  pub fn name(self) -> &'static str {
    match self {
      Tab::Home => "home",
      Tab::Earn => "earn",
      Tab::Wallet => "wallet",
    }
  }

  pub fn title(self) -> &'static str {
    match self {
      Tab::Home => "Home",
      Tab::Earn => "Earn",
      Tab::Wallet => "Wallet",
    }
  }

  /// Domains shown on this tab, refreshed by a manual sync
  pub fn domains(self) -> &'static [Domain] {
    match self {
      Tab::Home => &[Domain::Balance, Domain::Daily],
      Tab::Earn => &[Domain::Tasks],
      Tab::Wallet => &[Domain::Balance, Domain::Flex],
    }
  }

  fn index(self) -> usize {
    Tab::ALL.iter().position(|t| *t == self).unwrap_or(0)
  }

  fn next(self) -> Tab {
    Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
  }

  fn prev(self) -> Tab {
    Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
  }
}

/// Latest known data for each domain
#[derive(Debug, Default)]
pub struct Dashboard {
  pub balance: Option<Balance>,
  pub daily: Option<DailyBonus>,
  pub flex: Option<FlexStatus>,
  pub tasks: Vec<Task>,
  pub selected_task: usize,
}

impl Dashboard {
  /// Fill in whatever the last session persisted.
  fn restore(store: &dyn KeyValueStore) -> Self {
    let winix: Option<f64> = read_persisted(store, keys::BALANCE);
    let balance = winix.map(|winix| Balance {
      winix,
      coins: read_persisted(store, keys::COINS).unwrap_or_default(),
      tickets: read_persisted(store, keys::TICKETS).unwrap_or_default(),
    });

    Self {
      balance,
      daily: read_persisted(store, keys::DAILY_BONUS),
      flex: read_persisted(store, keys::FLEX_STATUS),
      ..Self::default()
    }
  }
}

impl Dashboard {
  /// Follow a persisted value written by the sync layer or another client.
  fn apply(&mut self, change: &StoreChange) {
    let value = change.value.clone();
    match change.key.as_str() {
      keys::BALANCE => match value.as_ref().and_then(Value::as_f64) {
        Some(winix) => self.balance.get_or_insert_with(Balance::default).winix = winix,
        None => self.balance = None,
      },
      keys::COINS => {
        if let (Some(balance), Some(coins)) = (self.balance.as_mut(), value.as_ref().and_then(Value::as_i64)) {
          balance.coins = coins;
        }
      }
      keys::TICKETS => {
        if let (Some(balance), Some(tickets)) = (self.balance.as_mut(), value.as_ref().and_then(Value::as_i64)) {
          balance.tickets = tickets;
        }
      }
      keys::DAILY_BONUS => self.daily = value.and_then(|v| serde_json::from_value(v).ok()),
      keys::FLEX_STATUS => self.flex = value.and_then(|v| serde_json::from_value(v).ok()),
      _ => {}
    }
  }
}

fn read_persisted<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
  store::read(store, key).unwrap_or_else(|e| {
    warn!(key, error = %e, "ignoring unreadable persisted value");
    None
  })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
  Info,
  Error,
}

/// One-line message in the status bar
#[derive(Debug, Clone)]
pub struct Status {
  pub text: String,
  pub kind: StatusKind,
}

/// Main application state
pub struct App {
  config: Config,
  store: Arc<dyn KeyValueStore>,
  launch_url: Option<Url>,

  /// Services for the current session, rebuilt on reload
  context: SyncContext,

  tab: Tab,
  mode: Mode,

  /// Command input buffer (after pressing :)
  command_input: String,

  /// Selected autocomplete suggestion index
  selected_suggestion: usize,

  dashboard: Dashboard,
  status: Option<Status>,

  /// Backend reachability, unknown until the first ping returns
  online: Option<bool>,

  should_quit: bool,
  reload_requested: bool,
}

impl App {
  pub fn new(config: Config, store: Arc<dyn KeyValueStore>, launch_url: Option<Url>) -> Result<Self> {
    let context = SyncContext::build(&config, Arc::clone(&store), launch_url.clone())?;
    Ok(Self::with_context(config, store, launch_url, context))
  }

  fn with_context(
    config: Config,
    store: Arc<dyn KeyValueStore>,
    launch_url: Option<Url>,
    context: SyncContext,
  ) -> Self {
    let dashboard = Dashboard::restore(store.as_ref());
    Self {
      config,
      store,
      launch_url,
      context,
      tab: Tab::Home,
      mode: Mode::Normal,
      command_input: String::new(),
      selected_suggestion: 0,
      dashboard,
      status: None,
      online: None,
      should_quit: false,
      reload_requested: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(250));
    let result = self.event_loop(&mut terminal, &mut events).await;
    self.context.dispose();

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop<B: Backend>(
    &mut self,
    terminal: &mut Terminal<B>,
    events: &mut EventHandler,
  ) -> Result<()> {
    self.start_session(events);

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }

      if self.reload_requested {
        self.reload(events)?;
      }
    }

    Ok(())
  }

  fn start_session(&mut self, events: &mut EventHandler) {
    events.follow(self.context.events().subscribe(), self.store.subscribe());
    self.context.activity().set_active_tab(self.tab.name());
    self.context.start();
    self.check_connection(events.sender());
  }

  /// Tear everything down and start over from persisted state.
  fn reload(&mut self, events: &mut EventHandler) -> Result<()> {
    info!("reloading session");
    self.reload_requested = false;
    self.context.dispose();
    self.context = SyncContext::build(&self.config, Arc::clone(&self.store), self.launch_url.clone())?;
    self.dashboard = Dashboard::restore(self.store.as_ref());
    self.start_session(events);
    Ok(())
  }

  fn check_connection(&self, tx: mpsc::UnboundedSender<Event>) {
    let client = self.context.client().clone();
    tokio::spawn(async move {
      let _ = tx.send(Event::Ping(client.ping().await));
    });
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {} // UI refresh happens automatically
      Event::Sync(sync_event) => self.handle_sync_event(sync_event),
      Event::Store(change) => self.dashboard.apply(&change),
      Event::Lagged(skipped) => warn!(skipped, "dropped events"),
      Event::Ping(online) => {
        if !online {
          self.set_error("Server unreachable, showing saved data");
        }
        self.online = Some(online);
      }
    }
  }

  fn handle_sync_event(&mut self, event: SyncEvent) {
    match event {
      SyncEvent::BalanceChanged { balance, diff } => {
        self.dashboard.balance = Some(balance);
        if let Diff::Changes(changes) = diff {
          let fields: Vec<&str> = changes
            .modified
            .keys()
            .chain(changes.added.keys())
            .map(String::as_str)
            .collect();
          self.set_info(format!("Balance updated: {}", fields.join(", ")));
        }
      }
      SyncEvent::TasksChanged { tasks, diff } => {
        let changed = match &diff {
          Diff::Changes(changes) => changes.added.len() + changes.modified.len(),
          _ => tasks.len(),
        };
        self.dashboard.tasks = tasks;
        self.dashboard.selected_task = self
          .dashboard
          .selected_task
          .min(self.dashboard.tasks.len().saturating_sub(1));
        self.set_info(format!("{} task(s) updated", changed));
      }
      SyncEvent::DailyBonusChanged(daily) => self.dashboard.daily = Some(daily),
      SyncEvent::FlexStatusChanged(flex) => self.dashboard.flex = Some(flex),
      SyncEvent::SyncFailed { domain, message } => {
        self.set_error(format!("{} sync failed: {}", domain, message));
      }
      SyncEvent::CycleFinished { synced, failed } => {
        if !failed.is_empty() {
          let names: Vec<&str> = failed.iter().map(|d| d.as_str()).collect();
          self.set_error(format!("Sync incomplete, failed: {}", names.join(", ")));
        } else if !synced.is_empty() {
          self.online = Some(true);
          self.set_info(format!("Synced {} domain(s)", synced.len()));
        }
      }
      SyncEvent::Notice(message) => self.set_info(message),
      SyncEvent::ReloadRequired => self.reload_requested = true,
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    self.context.activity().touch();
    match self.mode {
      Mode::Normal => self.handle_normal_mode_key(key),
      Mode::Command => self.handle_command_mode_key(key),
    }
  }

  fn handle_normal_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Char('q') => self.should_quit = true,
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }

      // Tabs
      KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => self.switch_tab(self.tab.next()),
      KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => self.switch_tab(self.tab.prev()),
      KeyCode::Char('1') => self.switch_tab(Tab::Home),
      KeyCode::Char('2') => self.switch_tab(Tab::Earn),
      KeyCode::Char('3') => self.switch_tab(Tab::Wallet),

      // Task list navigation
      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),

      KeyCode::Char('r') => self.sync_current_tab(),

      KeyCode::Char(':') => {
        self.mode = Mode::Command;
        self.command_input.clear();
      }

      _ => {}
    }
  }

  fn handle_command_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Enter => {
        self.execute_command();
        self.mode = Mode::Normal;
        self.selected_suggestion = 0;
      }
      KeyCode::Tab | KeyCode::Down => {
        let count = self.autocomplete_suggestions().len();
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + 1) % count;
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        let count = self.autocomplete_suggestions().len();
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + count - 1) % count;
        }
      }
      KeyCode::Backspace => {
        self.command_input.pop();
        self.selected_suggestion = 0; // Reset selection on input change
      }
      KeyCode::Char(c) => {
        self.command_input.push(c);
        self.selected_suggestion = 0; // Reset selection on input change
      }
      _ => {}
    }
  }

  fn execute_command(&mut self) {
    let input = std::mem::take(&mut self.command_input);
    let (name, argument) = split_command(&input);

    // Selected suggestion wins over the raw input
    let suggestions = commands::get_suggestions(name);
    let cmd = suggestions
      .get(self.selected_suggestion)
      .copied()
      .or_else(|| commands::lookup(name));

    let Some(cmd) = cmd else {
      self.set_error("Unknown command");
      return;
    };

    match cmd.name {
      "home" => self.switch_tab(Tab::Home),
      "earn" => self.switch_tab(Tab::Earn),
      "wallet" => {
        self.switch_tab(Tab::Wallet);
        if let Some(address) = argument {
          self.connect_wallet(address);
        }
      }
      "sync" => self.sync_current_tab(),
      "clear-cache" => {
        let dropped = self.context.clear_cache();
        self.set_info(format!("Cache cleared ({} entries)", dropped));
        self.sync_current_tab();
      }
      "quit" => self.should_quit = true,
      _ => {}
    }
  }

  /// `off` disconnects; anything else is taken as the wallet address.
  fn connect_wallet(&mut self, address: &str) {
    if address.eq_ignore_ascii_case("off") {
      self.context.set_wallet(None);
      self.dashboard.flex = None;
      self.set_info("Wallet disconnected");
    } else {
      self.context.set_wallet(Some(address.to_string()));
      self.context.scheduler().force_sync(Domain::Flex);
      self.set_info(format!("Wallet {} connected", address));
    }
  }

  fn switch_tab(&mut self, tab: Tab) {
    self.tab = tab;
    self.context.activity().set_active_tab(tab.name());
  }

  fn move_selection(&mut self, delta: i32) {
    if self.tab != Tab::Earn {
      return;
    }
    let len = self.dashboard.tasks.len();
    if len > 0 {
      let selected = self.dashboard.selected_task as i32 + delta;
      self.dashboard.selected_task = selected.rem_euclid(len as i32) as usize;
    }
  }

  /// Force a sync of every domain shown on the current tab.
  fn sync_current_tab(&mut self) {
    let has_wallet = self.context.activity().wallet().is_some();
    for &domain in self.tab.domains() {
      if domain == Domain::Flex && !has_wallet {
        continue;
      }
      self.context.scheduler().force_sync(domain);
    }
    self.set_info(format!("Syncing {}...", self.tab.name()));
  }

  fn set_info(&mut self, text: impl Into<String>) {
    self.status = Some(Status {
      text: text.into(),
      kind: StatusKind::Info,
    });
  }

  fn set_error(&mut self, text: impl Into<String>) {
    self.status = Some(Status {
      text: text.into(),
      kind: StatusKind::Error,
    });
  }

  // Accessors for UI rendering
  pub fn tab(&self) -> Tab {
    self.tab
  }

  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn command_input(&self) -> &str {
    &self.command_input
  }

  pub fn autocomplete_suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(split_command(&self.command_input).0)
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }

  pub fn dashboard(&self) -> &Dashboard {
    &self.dashboard
  }

  pub fn status(&self) -> Option<&Status> {
    self.status.as_ref()
  }

  pub fn online(&self) -> Option<bool> {
    self.online
  }

  pub fn api_url(&self) -> &str {
    &self.config.api.base_url
  }

  pub fn user_id(&self) -> Option<String> {
    self.context.identity().resolve_user_id()
  }

  pub fn wallet(&self) -> Option<String> {
    self.context.activity().wallet()
  }

  /// Queued task count while a sync is running, `None` when idle
  pub fn sync_activity(&self) -> Option<usize> {
    let scheduler = self.context.scheduler();
    (scheduler.is_syncing() || scheduler.queue_busy()).then(|| scheduler.pending_tasks())
  }

  /// Time since each domain last synced successfully
  pub fn sync_ages(&self) -> Vec<(Domain, Option<Duration>)> {
    let history = self.context.history();
    Domain::ALL
      .into_iter()
      .map(|domain| (domain, history.last_success(domain).map(|at| at.elapsed())))
      .collect()
  }
}

/// Split palette input into the command name and an optional argument.
fn split_command(input: &str) -> (&str, Option<&str>) {
  let input = input.trim();
  match input.split_once(char::is_whitespace) {
    Some((name, argument)) => (name, Some(argument.trim()).filter(|a| !a.is_empty())),
    None => (input, None),
  }
}
