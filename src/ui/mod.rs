mod components;
mod renderfns;
mod views;

use crate::app::{App, Mode, StatusKind, Tab};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Length(1), // Tabs
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Status bar
      Constraint::Length(1), // Sync ages
    ])
    .split(frame.area());

  let user_id = app.user_id();
  renderfns::draw_header(
    frame,
    chunks[0],
    app.api_url(),
    user_id.as_deref(),
    app.online(),
    app.sync_activity(),
  );
  renderfns::draw_tabs(frame, chunks[1], app.tab());

  let dashboard = app.dashboard();
  match app.tab() {
    Tab::Home => views::draw_home(
      frame,
      chunks[2],
      dashboard.balance.as_ref(),
      dashboard.daily.as_ref(),
    ),
    Tab::Earn => views::draw_task_list(frame, chunks[2], &dashboard.tasks, dashboard.selected_task),
    Tab::Wallet => {
      let wallet = app.wallet();
      views::draw_wallet(
        frame,
        chunks[2],
        wallet.as_deref(),
        dashboard.flex.as_ref(),
        dashboard.balance.as_ref(),
      );
    }
  }

  if *app.mode() == Mode::Command {
    components::draw_command_overlay(
      frame,
      chunks[2],
      app.command_input(),
      &app.autocomplete_suggestions(),
      app.selected_suggestion(),
    );
  }

  draw_status_bar(frame, chunks[3], app);
  renderfns::draw_footer(frame, chunks[4], &app.sync_ages());
}

fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
  let (content, style) = match (app.mode(), app.status()) {
    (Mode::Command, _) => (
      " Enter:run  Tab:next  Esc:cancel".to_string(),
      Style::default().fg(Color::Yellow),
    ),
    (Mode::Normal, Some(status)) => {
      let color = match status.kind {
        StatusKind::Info => Color::Green,
        StatusKind::Error => Color::Red,
      };
      (format!(" {}", status.text), Style::default().fg(color))
    }
    (Mode::Normal, None) => (
      " Tab:switch  r:sync  j/k:nav  :command  q:quit".to_string(),
      Style::default().fg(Color::DarkGray),
    ),
  };

  frame.render_widget(Paragraph::new(content).style(style), area);
}
