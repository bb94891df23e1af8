use crate::api::types::{Balance, DailyBonus};
use crate::ui::renderfns::format_amount;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

pub fn draw_home(frame: &mut Frame, area: Rect, balance: Option<&Balance>, daily: Option<&DailyBonus>) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Length(5), Constraint::Min(3)])
    .split(area);

  draw_balance(frame, chunks[0], balance);
  draw_daily(frame, chunks[1], daily);
}

fn draw_balance(frame: &mut Frame, area: Rect, balance: Option<&Balance>) {
  let block = Block::default()
    .title(" Balance ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let Some(balance) = balance else {
    let paragraph = Paragraph::new("Waiting for first sync...")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  };

  let lines = vec![
    Line::from(vec![
      Span::styled(format!("{:<10}", "WINIX"), Style::default().fg(Color::DarkGray)),
      Span::styled(format_amount(balance.winix), Style::default().fg(Color::Cyan).bold()),
    ]),
    Line::from(vec![
      Span::styled(format!("{:<10}", "Coins"), Style::default().fg(Color::DarkGray)),
      Span::styled(balance.coins.to_string(), Style::default().fg(Color::Yellow)),
    ]),
    Line::from(vec![
      Span::styled(format!("{:<10}", "Tickets"), Style::default().fg(Color::DarkGray)),
      Span::raw(balance.tickets.to_string()),
    ]),
  ];

  frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_daily(frame: &mut Frame, area: Rect, daily: Option<&DailyBonus>) {
  let block = Block::default()
    .title(" Daily bonus ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let Some(daily) = daily else {
    let paragraph = Paragraph::new("No daily bonus data yet.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  };

  let (state, color) = if daily.claimed_today {
    ("claimed today".to_string(), Color::Green)
  } else {
    ("ready to claim".to_string(), Color::Yellow)
  };
  let next = daily
    .next_claim_at
    .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
    .unwrap_or_else(|| "-".to_string());

  let lines = vec![
    Line::from(format!("Day {}  ·  streak {}", daily.day, daily.streak)),
    Line::from(Span::styled(state, Style::default().fg(color))),
    Line::from(Span::styled(
      format!("Next claim: {}", next),
      Style::default().fg(Color::DarkGray),
    )),
  ];

  frame.render_widget(Paragraph::new(lines).block(block), area);
}
