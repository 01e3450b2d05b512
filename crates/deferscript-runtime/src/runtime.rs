use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use deferscript_config::{BundleManifest, LoaderConfig, ScriptDef};
use deferscript_loader::{
  Document, GlobalScope, LoadHandle, LoadRequest, LoadStatus, ScriptLoader, ScriptResource, UseFn,
};
use deferscript_proxy::CallProxy;
use deferscript_trigger::{
  ConsentHandle, RenderMode, Scope, TriggerEnvironment, TriggerResolver, TriggerSpec,
};
use tracing::{debug, info};

use crate::instance::ScriptInstance;
use crate::registry::{RegistryScript, UseScriptOptions};

pub(crate) struct RuntimeInner {
  resolver: TriggerResolver,
  loader: ScriptLoader,
  bundles: BundleManifest,
  consent: ConsentHandle,
  /// One proxy per key, tagged with the attempt it follows.
  proxies: Mutex<HashMap<String, (u64, CallProxy)>>,
}

/// Entry point for loading third-party scripts.
///
/// Cloning is cheap; clones share the loader, proxies and consent state.
#[derive(Clone)]
pub struct ScriptRuntime {
  inner: Arc<RuntimeInner>,
}

impl ScriptRuntime {
  pub fn new(
    document: Arc<dyn Document>,
    globals: Arc<dyn GlobalScope>,
    environment: Arc<dyn TriggerEnvironment>,
    config: LoaderConfig,
  ) -> Self {
    Self::build(document, globals, environment, config, BundleManifest::default())
  }

  /// A runtime that serves bundled scripts from the locators in `bundles`.
  pub fn with_bundles(
    document: Arc<dyn Document>,
    globals: Arc<dyn GlobalScope>,
    environment: Arc<dyn TriggerEnvironment>,
    config: LoaderConfig,
    bundles: BundleManifest,
  ) -> Self {
    Self::build(document, globals, environment, config, bundles)
  }

  fn build(
    document: Arc<dyn Document>,
    globals: Arc<dyn GlobalScope>,
    environment: Arc<dyn TriggerEnvironment>,
    config: LoaderConfig,
    bundles: BundleManifest,
  ) -> Self {
    Self {
      inner: Arc::new(RuntimeInner {
        resolver: TriggerResolver::new(environment),
        loader: ScriptLoader::new(document, globals, config),
        bundles,
        consent: ConsentHandle::new(),
        proxies: Mutex::new(HashMap::new()),
      }),
    }
  }

  pub fn render_mode(&self) -> RenderMode {
    self.inner.loader.render_mode()
  }

  /// The application-wide consent handle that manifest consent triggers bind to.
  pub fn consent(&self) -> &ConsentHandle {
    &self.inner.consent
  }

  /// Load a script once `trigger` resolves.
  pub fn use_script(
    &self,
    mut request: LoadRequest,
    trigger: TriggerSpec,
    scope: &Scope,
  ) -> ScriptInstance {
    request.resource = request.resource.with_bundle_manifest(&self.inner.bundles);

    let trigger = self.inner.resolver.resolve(trigger, scope);
    let handle = self.inner.loader.load(request, &trigger);
    let proxy = self.inner.proxy_for(&handle);

    ScriptInstance::new(self.clone(), handle, trigger, proxy)
  }

  /// Load a preconfigured integration.
  pub fn use_registry_script<A>(
    &self,
    adapter: &A,
    options: A::Options,
    use_options: UseScriptOptions,
    scope: &Scope,
  ) -> ScriptInstance
  where
    A: RegistryScript + Clone + 'static,
  {
    let key = use_options
      .key
      .clone()
      .unwrap_or_else(|| adapter.key().to_string());
    let resource = ScriptResource::new(adapter.src(&options))
      .with_key(key)
      .with_attributes(adapter.attributes(&options))
      .bundled(use_options.bundle);

    let extractor = adapter.clone();
    let use_api: UseFn = Arc::new(move |globals: &dyn GlobalScope| extractor.use_api(globals));
    let request = LoadRequest { resource, use_api };

    debug!(key = %request.resource.key, trigger = use_options.trigger.kind(), "registry script requested");
    self.use_script(request, use_options.trigger, scope)
  }

  /// Load a manifest declaration. Its trigger definition binds to this
  /// runtime's consent handle.
  pub fn use_def(&self, def: &ScriptDef, use_api: UseFn, scope: &Scope) -> ScriptInstance {
    let trigger = TriggerSpec::from_def(&def.trigger, &self.inner.consent);
    let request = LoadRequest {
      resource: ScriptResource::from_def(def),
      use_api,
    };
    self.use_script(request, trigger, scope)
  }

  /// Remove a script and drop its proxy.
  pub fn remove(&self, key: &str) -> bool {
    self.inner.forget_proxy(key);
    self.inner.loader.remove(key)
  }

  /// Remove `key` only if `attempt` is still the live entry.
  pub(crate) fn remove_attempt(&self, key: &str, attempt: u64) -> bool {
    let current = self
      .inner
      .loader
      .handle(key)
      .is_some_and(|handle| handle.attempt() == attempt);
    if !current {
      debug!(key = %key, attempt, "remove skipped, attempt no longer current");
      return false;
    }
    self.remove(key)
  }

  pub fn status(&self, key: &str) -> Option<LoadStatus> {
    self.inner.loader.status(key)
  }

  /// Known keys and their status, sorted by key.
  pub fn snapshot(&self) -> Vec<(String, LoadStatus)> {
    self.inner.loader.snapshot()
  }
}

impl RuntimeInner {
  fn proxies(&self) -> MutexGuard<'_, HashMap<String, (u64, CallProxy)>> {
    self.proxies.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// The proxy for the handle's key and attempt, attaching one if needed.
  fn proxy_for(&self, handle: &LoadHandle) -> CallProxy {
    let mut proxies = self.proxies();
    if let Some((attempt, proxy)) = proxies.get(handle.key())
      && *attempt == handle.attempt()
    {
      return proxy.clone();
    }

    let proxy = CallProxy::attach(handle);
    if proxies
      .insert(handle.key().to_string(), (handle.attempt(), proxy.clone()))
      .is_some()
    {
      info!(key = %handle.key(), attempt = handle.attempt(), "proxy replaced for new attempt");
    }
    proxy
  }

  fn forget_proxy(&self, key: &str) {
    self.proxies().remove(key);
  }
}
