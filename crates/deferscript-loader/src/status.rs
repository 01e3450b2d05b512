use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a script entry.
///
/// Transitions only move forward. `Loaded` and `Error` are terminal for an
/// attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadStatus {
  #[default]
  AwaitingTrigger,
  Loading,
  Loaded,
  Error,
}

impl LoadStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, LoadStatus::Loaded | LoadStatus::Error)
  }

  /// Whether moving from `self` to `next` is a legal transition.
  pub fn can_transition_to(self, next: LoadStatus) -> bool {
    matches!(
      (self, next),
      (LoadStatus::AwaitingTrigger, LoadStatus::Loading)
        | (LoadStatus::Loading, LoadStatus::Loaded)
        | (LoadStatus::Loading, LoadStatus::Error)
        | (LoadStatus::AwaitingTrigger, LoadStatus::Error)
    )
  }
}

impl fmt::Display for LoadStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      LoadStatus::AwaitingTrigger => "awaitingTrigger",
      LoadStatus::Loading => "loading",
      LoadStatus::Loaded => "loaded",
      LoadStatus::Error => "error",
    };
    f.write_str(name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_forward_only() {
    use LoadStatus::*;

    assert!(AwaitingTrigger.can_transition_to(Loading));
    assert!(Loading.can_transition_to(Loaded));
    assert!(Loading.can_transition_to(Error));

    assert!(!Loaded.can_transition_to(Loading));
    assert!(!Error.can_transition_to(Loaded));
    assert!(!Loaded.can_transition_to(Error));
    assert!(!Loading.can_transition_to(AwaitingTrigger));
  }

  #[test]
  fn test_serializes_camel_case() {
    let json = serde_json::to_string(&LoadStatus::AwaitingTrigger).unwrap();
    assert_eq!(json, r#""awaitingTrigger""#);
  }
}
