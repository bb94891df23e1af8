use crate::app::Tab;
use ratatui::prelude::*;
use ratatui::widgets::{Paragraph, Tabs};

/// Draw the header bar with logo, backend, user and connection state
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  api_url: &str,
  user_id: Option<&str>,
  online: Option<bool>,
  queued: Option<usize>,
) {
  let host = extract_host(api_url);

  let (dot, dot_color) = match online {
    Some(true) => ("●", Color::Green),
    Some(false) => ("●", Color::Red),
    None => ("○", Color::DarkGray),
  };

  let mut spans = vec![
    Span::styled(" winix ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", host), Style::default().fg(Color::White)),
    Span::styled(dot, Style::default().fg(dot_color)),
    Span::raw(" "),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" user {} ", user_id.unwrap_or("?")),
      Style::default().fg(Color::Yellow).bold(),
    ),
  ];
  match queued {
    Some(0) => spans.push(Span::styled(" syncing…", Style::default().fg(Color::Magenta))),
    Some(n) => spans.push(Span::styled(
      format!(" syncing… ({} queued)", n),
      Style::default().fg(Color::Magenta),
    )),
    None => {}
  }

  // Shortcuts - keys highlighted, descriptions dimmed
  spans.push(Span::raw("  "));
  for (key, label) in [("<:>", " command"), ("<r>", " sync"), ("<q>", " quit")] {
    spans.push(Span::styled(key, Style::default().fg(Color::Cyan)));
    spans.push(Span::styled(label, Style::default().fg(Color::DarkGray)));
    spans.push(Span::raw("   "));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// Draw the tab strip
pub fn draw_tabs(frame: &mut Frame, area: Rect, active: Tab) {
  let titles: Vec<Line> = Tab::ALL
    .iter()
    .enumerate()
    .map(|(i, tab)| Line::from(format!("{} {}", i + 1, tab.title())))
    .collect();
  let selected = Tab::ALL.iter().position(|t| *t == active).unwrap_or(0);

  let tabs = Tabs::new(titles)
    .select(selected)
    .style(Style::default().fg(Color::DarkGray))
    .highlight_style(Style::default().fg(Color::Cyan).bold())
    .divider("│");

  frame.render_widget(tabs, area);
}

/// Extract the host (and port) from the API base URL
fn extract_host(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_host() {
    assert_eq!(extract_host("https://api.winix.test"), "api.winix.test");
    assert_eq!(extract_host("https://winix.test/api/v1"), "winix.test");
    assert_eq!(extract_host("http://localhost:8080"), "localhost:8080");
  }
}
