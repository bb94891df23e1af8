//! One-level structural diff between JSON snapshots.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Result of comparing a previous snapshot with a new one.
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
  /// Nothing changed, no update should be applied
  NoChange,
  /// No comparable previous snapshot, the new value replaces everything
  Full(Value),
  /// Key-level changes between two objects
  Changes(Changes),
}

impl Diff {
  pub fn is_change(&self) -> bool {
    !matches!(self, Diff::NoChange)
  }
}

/// Key-level changes. Never empty: an empty set normalizes to `Diff::NoChange`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
  pub added: Map<String, Value>,
  pub modified: Map<String, Value>,
  pub removed: BTreeSet<String>,
}

impl Changes {
  pub fn is_empty(&self) -> bool {
    self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
  }
}

/// Compare `old` and `new` at one level of key depth.
///
/// Objects are compared key by key. Any other pair of values is either
/// unchanged or fully replaced.
pub fn diff(old: &Value, new: &Value) -> Diff {
  let (Value::Object(old_map), Value::Object(new_map)) = (old, new) else {
    return if old == new {
      Diff::NoChange
    } else {
      Diff::Full(new.clone())
    };
  };

  let mut changes = Changes::default();

  for (key, value) in new_map {
    match old_map.get(key) {
      None => {
        changes.added.insert(key.clone(), value.clone());
      }
      Some(previous) if previous != value => {
        changes.modified.insert(key.clone(), value.clone());
      }
      Some(_) => {}
    }
  }

  for key in old_map.keys() {
    if !new_map.contains_key(key) {
      changes.removed.insert(key.clone());
    }
  }

  if changes.is_empty() {
    Diff::NoChange
  } else {
    Diff::Changes(changes)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_added_and_modified() {
    let result = diff(&json!({"a": 1, "b": 2}), &json!({"a": 1, "b": 3, "c": 4}));

    let Diff::Changes(changes) = result else {
      panic!("expected key-level changes, got {:?}", result);
    };
    assert_eq!(Value::Object(changes.added), json!({"c": 4}));
    assert_eq!(Value::Object(changes.modified), json!({"b": 3}));
    assert!(changes.removed.is_empty());
  }

  #[test]
  fn test_removed_keys() {
    let result = diff(&json!({"a": 1, "b": 2}), &json!({"a": 1}));

    let Diff::Changes(changes) = result else {
      panic!("expected key-level changes");
    };
    assert!(changes.added.is_empty());
    assert!(changes.modified.is_empty());
    assert_eq!(changes.removed.into_iter().collect::<Vec<_>>(), vec!["b"]);
  }

  #[test]
  fn test_identical_objects_normalize_to_no_change() {
    let value = json!({"a": 1, "nested": {"x": [1, 2]}});
    assert_eq!(diff(&value, &value.clone()), Diff::NoChange);
    assert!(!diff(&value, &value).is_change());
  }

  #[test]
  fn test_nested_change_is_reported_at_top_level() {
    let result = diff(&json!({"t1": {"progress": 1}}), &json!({"t1": {"progress": 2}}));

    let Diff::Changes(changes) = result else {
      panic!("expected key-level changes");
    };
    assert_eq!(changes.modified.get("t1"), Some(&json!({"progress": 2})));
  }

  #[test]
  fn test_non_objects_are_fully_replaced() {
    assert_eq!(diff(&json!([1, 2]), &json!([1, 3])), Diff::Full(json!([1, 3])));
    assert_eq!(diff(&json!(5), &json!(5)), Diff::NoChange);
    assert_eq!(diff(&json!(null), &json!({"a": 1})), Diff::Full(json!({"a": 1})));
  }
}
