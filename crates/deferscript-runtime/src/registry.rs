use deferscript_config::Attributes;
use deferscript_loader::{GlobalScope, SharedApi};
use deferscript_trigger::TriggerSpec;

/// A preconfigured integration for one third-party service.
///
/// Options arrive already shape-valid. `use_api` is only called after the
/// script reports it has loaded.
pub trait RegistryScript: Send + Sync {
  type Options;

  /// Identity key shared by every use of this integration.
  fn key(&self) -> &str;

  fn src(&self, options: &Self::Options) -> String;

  fn attributes(&self, _options: &Self::Options) -> Attributes {
    Attributes::new()
  }

  /// Extract the service's API object from the global namespace.
  fn use_api(&self, globals: &dyn GlobalScope) -> Option<SharedApi>;
}

/// Per-call options for [`ScriptRuntime::use_registry_script`].
///
/// [`ScriptRuntime::use_registry_script`]: crate::ScriptRuntime::use_registry_script
#[derive(Debug, Default)]
pub struct UseScriptOptions {
  pub trigger: TriggerSpec,
  /// Overrides the integration's key.
  pub key: Option<String>,
  /// Serve from the bundled local copy when one exists.
  pub bundle: bool,
}

impl UseScriptOptions {
  pub fn with_trigger(mut self, trigger: TriggerSpec) -> Self {
    self.trigger = trigger;
    self
  }

  pub fn with_key(mut self, key: impl Into<String>) -> Self {
    self.key = Some(key.into());
    self
  }

  pub fn bundled(mut self) -> Self {
    self.bundle = true;
    self
  }
}
