/// Command palette entries and autocomplete ranking

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "home",
    aliases: &["h", "balance"],
    description: "Balance and daily bonus",
  },
  Command {
    name: "earn",
    aliases: &["e", "tasks", "quests"],
    description: "Tasks and progress",
  },
  Command {
    name: "wallet",
    aliases: &["w", "flex"],
    description: "Wallet and flex status; `wallet <address>` connects, `wallet off` disconnects",
  },
  Command {
    name: "sync",
    aliases: &["s", "refresh"],
    description: "Sync the current tab now",
  },
  Command {
    name: "clear-cache",
    aliases: &["cc", "reset"],
    description: "Drop cached data and refetch",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit winix",
  },
];

/// Find a command by name or alias
pub fn lookup(input: &str) -> Option<&'static Command> {
  let input = input.trim().to_lowercase();
  COMMANDS
    .iter()
    .find(|cmd| cmd.name == input || cmd.aliases.contains(&input.as_str()))
}

/// How well `input` matches `cmd`; lower is better
fn rank(cmd: &Command, input: &str) -> Option<u32> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

/// Get autocomplete suggestions for a given input, best match first
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&'static Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &input).map(|r| (cmd, r)))
    .collect();
  // Stable sort keeps declaration order within a rank
  matches.sort_by_key(|(_, r)| *r);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("wallet");
    assert_eq!(suggestions[0].name, "wallet");
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("tasks");
    assert_eq!(suggestions[0].name, "earn");
  }

  #[test]
  fn test_alias_beats_substring() {
    // "s" is an alias of sync and a substring of several other names
    let suggestions = get_suggestions("s");
    assert_eq!(suggestions[0].name, "sync");
  }

  #[test]
  fn test_fuzzy_match() {
    let suggestions = get_suggestions("cach");
    assert_eq!(suggestions[0].name, "clear-cache");
  }

  #[test]
  fn test_no_match() {
    assert!(get_suggestions("zzz").is_empty());
  }

  #[test]
  fn test_lookup() {
    assert_eq!(lookup("Q").map(|c| c.name), Some("quit"));
    assert_eq!(lookup("flex").map(|c| c.name), Some("wallet"));
    assert!(lookup("nope").is_none());
  }
}
