use std::fmt;

use serde::{Deserialize, Serialize};

/// DOM interaction that can resolve an element trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
  /// Element entered the viewport.
  Visible,
  /// Pointer moved over the element.
  Hover,
  MouseDown,
  Click,
  Focus,
  Scroll,
  KeyDown,
  TouchStart,
}

impl fmt::Display for InteractionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      InteractionKind::Visible => "visible",
      InteractionKind::Hover => "hover",
      InteractionKind::MouseDown => "mousedown",
      InteractionKind::Click => "click",
      InteractionKind::Focus => "focus",
      InteractionKind::Scroll => "scroll",
      InteractionKind::KeyDown => "keydown",
      InteractionKind::TouchStart => "touchstart",
    };
    f.write_str(name)
  }
}

/// Declarative trigger as written in a manifest.
///
/// Triggers that need runtime values (external futures, consent handles) are
/// built in code; see `deferscript_trigger::TriggerSpec`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerDef {
  /// Insert as soon as the script is requested.
  Immediate,
  /// Insert when the host signals it is ready and idle.
  #[default]
  OnReady,
  /// Insert only when the caller invokes `load()`.
  Manual,
  /// Insert on the first qualifying interaction with an element.
  Element {
    element: String,
    kinds: Vec<InteractionKind>,
  },
  /// Insert after a fixed delay.
  IdleTimeout { ms: u64 },
  /// Insert once consent is granted, then optionally wait for another trigger.
  Consent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    then: Option<Box<TriggerDef>>,
  },
}

impl TriggerDef {
  /// Check structural constraints that serde cannot express.
  pub fn validate(&self) -> Result<(), String> {
    match self {
      TriggerDef::Element { element, kinds } => {
        if element.trim().is_empty() {
          return Err("element trigger needs a target element".to_string());
        }
        if kinds.is_empty() {
          return Err("element trigger needs at least one interaction kind".to_string());
        }
        Ok(())
      }
      TriggerDef::Consent { then: Some(inner) } => match inner.as_ref() {
        TriggerDef::Consent { .. } => Err("consent cannot wrap another consent trigger".to_string()),
        other => other.validate(),
      },
      _ => Ok(()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_is_on_ready() {
    assert_eq!(TriggerDef::default(), TriggerDef::OnReady);
  }

  #[test]
  fn test_parse_unit_triggers() {
    let t: TriggerDef = serde_json::from_str(r#""manual""#).unwrap();
    assert_eq!(t, TriggerDef::Manual);

    let t: TriggerDef = serde_json::from_str(r#""on_ready""#).unwrap();
    assert_eq!(t, TriggerDef::OnReady);
  }

  #[test]
  fn test_parse_element_trigger() {
    let t: TriggerDef =
      serde_json::from_str(r##"{"element": {"element": "#player", "kinds": ["visible", "mousedown"]}}"##)
        .unwrap();

    assert_eq!(
      t,
      TriggerDef::Element {
        element: "#player".to_string(),
        kinds: vec![InteractionKind::Visible, InteractionKind::MouseDown],
      }
    );
  }

  #[test]
  fn test_parse_consent_with_follow_up() {
    let t: TriggerDef =
      serde_json::from_str(r#"{"consent": {"then": {"idle_timeout": {"ms": 500}}}}"#).unwrap();

    assert_eq!(
      t,
      TriggerDef::Consent {
        then: Some(Box::new(TriggerDef::IdleTimeout { ms: 500 })),
      }
    );
  }

  #[test]
  fn test_validate_rejects_empty_element_kinds() {
    let t = TriggerDef::Element {
      element: "#x".to_string(),
      kinds: vec![],
    };
    assert!(t.validate().is_err());
  }

  #[test]
  fn test_validate_rejects_nested_consent() {
    let t = TriggerDef::Consent {
      then: Some(Box::new(TriggerDef::Consent { then: None })),
    };
    assert!(t.validate().is_err());
  }
}
