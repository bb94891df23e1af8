use ratatui::prelude::Color;
use std::time::Duration;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for a task status
pub fn task_status_color(status: &str) -> Color {
  match status {
    "completed" | "claimed" => Color::Green,
    "in_progress" | "pending" | "verifying" => Color::Yellow,
    "expired" | "failed" => Color::Red,
    _ => Color::White,
  }
}

/// Human-readable time since the last sync
pub fn format_age(age: Option<Duration>) -> String {
  let Some(age) = age else {
    return "never".to_string();
  };
  let secs = age.as_secs();
  match secs {
    0..=59 => format!("{}s ago", secs),
    60..=3599 => format!("{}m ago", secs / 60),
    _ => format!("{}h ago", secs / 3600),
  }
}

/// Token amounts: two decimals, trailing zeros dropped
pub fn format_amount(amount: f64) -> String {
  let formatted = format!("{:.2}", amount);
  formatted
    .trim_end_matches('0')
    .trim_end_matches('.')
    .to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("подписка на канал", 8), "подпи...");
  }

  #[test]
  fn test_task_status_color() {
    assert_eq!(task_status_color("completed"), Color::Green);
    assert_eq!(task_status_color("in_progress"), Color::Yellow);
    assert_eq!(task_status_color("available"), Color::White);
  }

  #[test]
  fn test_format_age() {
    assert_eq!(format_age(None), "never");
    assert_eq!(format_age(Some(Duration::from_secs(42))), "42s ago");
    assert_eq!(format_age(Some(Duration::from_secs(125))), "2m ago");
    assert_eq!(format_age(Some(Duration::from_secs(7300))), "2h ago");
  }

  #[test]
  fn test_format_amount() {
    assert_eq!(format_amount(100.0), "100");
    assert_eq!(format_amount(12.5), "12.5");
    assert_eq!(format_amount(0.126), "0.13");
    assert_eq!(format_amount(0.0), "0");
  }
}
