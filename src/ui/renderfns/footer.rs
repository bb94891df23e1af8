use super::utils::format_age;
use crate::sync::Domain;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use std::time::Duration;

/// Draw the footer bar with the age of each domain's last sync
pub fn draw_footer(frame: &mut Frame, area: Rect, ages: &[(Domain, Option<Duration>)]) {
  let mut spans = vec![Span::raw(" ")];

  for (i, (domain, age)) in ages.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled("  ·  ", Style::default().fg(Color::DarkGray)));
    }
    let age_color = if age.is_some() {
      Color::White
    } else {
      Color::DarkGray
    };
    spans.push(Span::styled(
      format!("{} ", domain),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(format_age(*age), Style::default().fg(age_color)));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}
