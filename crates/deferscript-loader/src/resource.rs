use deferscript_config::{AttrValue, Attributes, BundleManifest, ScriptDef};
use tracing::warn;

/// A script as requested by a caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptResource {
  /// Identity key used for dedup.
  pub key: String,
  pub src: String,
  pub attributes: Attributes,
  /// Served from the local origin after bundling.
  pub bundle: bool,
}

impl ScriptResource {
  /// A resource keyed by its own locator.
  pub fn new(src: impl Into<String>) -> Self {
    let src = src.into();
    Self {
      key: src.clone(),
      src,
      attributes: Attributes::new(),
      bundle: false,
    }
  }

  pub fn with_key(mut self, key: impl Into<String>) -> Self {
    self.key = key.into();
    self
  }

  /// Set an attribute. `None` records it as undefined.
  pub fn with_attribute(mut self, name: impl Into<String>, value: Option<AttrValue>) -> Self {
    self.attributes.insert(name.into(), value);
    self
  }

  pub fn with_attributes(mut self, attributes: Attributes) -> Self {
    self.attributes.extend(attributes);
    self
  }

  pub fn bundled(mut self, bundle: bool) -> Self {
    self.bundle = bundle;
    self
  }

  pub fn from_def(def: &ScriptDef) -> Self {
    Self {
      key: def.key().to_string(),
      src: def.src.clone(),
      attributes: def.attributes.clone(),
      bundle: def.bundle,
    }
  }

  /// Swap in the local locator for a bundled resource.
  ///
  /// Resources that are not bundled, or that the bundler fell back on, keep
  /// their remote locator. The identity key is unchanged.
  pub fn with_bundle_manifest(mut self, manifest: &BundleManifest) -> Self {
    if self.bundle
      && let Some(local) = manifest.locator_for(&self.src)
    {
      self.src = local.to_string();
    }
    self
  }

  /// The element to insert, with undefined and `false` attributes dropped.
  ///
  /// Names that are not valid attribute names are dropped with a warning.
  pub fn element(&self) -> ScriptElement {
    let attributes = self
      .attributes
      .iter()
      .filter(|(name, _)| name.as_str() != "src")
      .filter(|(name, _)| {
        let valid = is_attribute_name(name);
        if !valid {
          warn!(key = %self.key, attribute = %name, "invalid attribute name dropped");
        }
        valid
      })
      .filter_map(|(name, value)| match value {
        None | Some(AttrValue::Bool(false)) => None,
        Some(value) => Some((name.clone(), value.clone())),
      })
      .collect();

    ScriptElement {
      key: self.key.clone(),
      src: self.src.clone(),
      attributes,
    }
  }
}

/// The concrete element handed to the document.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptElement {
  pub key: String,
  pub src: String,
  /// Defined attributes only, in name order.
  pub attributes: Vec<(String, AttrValue)>,
}

impl ScriptElement {
  pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
    self
      .attributes
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, v)| v)
  }

  /// Render as an HTML tag, for server renderers.
  pub fn to_html(&self) -> String {
    let mut html = format!("<script src=\"{}\"", escape_attr(&self.src));
    for (name, value) in &self.attributes {
      if !is_attribute_name(name) {
        continue;
      }
      match value {
        AttrValue::Bool(true) => {
          html.push(' ');
          html.push_str(name);
        }
        other => {
          html.push_str(&format!(" {}=\"{}\"", name, escape_attr(&other.to_string())));
        }
      }
    }
    html.push_str("></script>");
    html
  }
}

/// HTML attribute name: non-empty, no whitespace, quotes, `=`, `<`, `>` or `/`.
fn is_attribute_name(name: &str) -> bool {
  !name.is_empty()
    && !name
      .chars()
      .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '=' | '<' | '>' | '/'))
}

fn escape_attr(value: &str) -> String {
  let mut out = String::with_capacity(value.len());
  for c in value.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '"' => out.push_str("&quot;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      c => out.push(c),
    }
  }
  out
}
