//! Integration tests for ScriptRuntime against the in-memory document and environment.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use deferscript_config::{
  AttrValue, Attributes, BundleManifest, ErrorPolicy, InteractionKind, LoaderConfig, ScriptDef,
  TriggerDef,
};
use deferscript_loader::testing::{AutoOutcome, MapGlobals, RecordingApi, RecordingDocument};
use deferscript_loader::{GlobalScope, LoadFailure, LoadStatus, ScriptResource, SharedApi};
use deferscript_proxy::{CallError, ProxyMode};
use deferscript_runtime::{RegistryScript, ScriptRequest, ScriptRuntime, UseScriptOptions};
use deferscript_trigger::testing::FakeEnvironment;
use deferscript_trigger::{ElementRef, RenderMode, Scope, TriggerSpec};
use serde_json::json;

struct Harness {
  document: Arc<RecordingDocument>,
  env: Arc<FakeEnvironment>,
  api: Arc<RecordingApi>,
  runtime: ScriptRuntime,
}

fn harness_with(config: LoaderConfig, bundles: BundleManifest) -> Harness {
  let document = Arc::new(RecordingDocument::client());
  let globals = Arc::new(MapGlobals::new());
  let api = Arc::new(RecordingApi::new());
  globals.set("analytics", api.clone());
  let env = Arc::new(FakeEnvironment::client());
  let runtime = ScriptRuntime::with_bundles(document.clone(), globals, env.clone(), config, bundles);
  Harness {
    document,
    env,
    api,
    runtime,
  }
}

fn harness() -> Harness {
  harness_with(LoaderConfig::default(), BundleManifest::default())
}

fn request(key: &str) -> ScriptRequest {
  ScriptRequest::global(
    ScriptResource::new(format!("https://cdn.example.com/{}.js", key)).with_key(key),
    "analytics",
  )
}

#[derive(Clone)]
struct Analytics;

struct AnalyticsOptions {
  id: String,
  defer: bool,
}

impl RegistryScript for Analytics {
  type Options = AnalyticsOptions;

  fn key(&self) -> &str {
    "analytics"
  }

  fn src(&self, options: &AnalyticsOptions) -> String {
    format!("https://analytics.example.com/tag.js?id={}", options.id)
  }

  fn attributes(&self, options: &AnalyticsOptions) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert("defer".to_string(), Some(AttrValue::Bool(options.defer)));
    attributes.insert("data-site".to_string(), Some(options.id.clone().into()));
    attributes.insert("nonce".to_string(), None);
    attributes
  }

  fn use_api(&self, globals: &dyn GlobalScope) -> Option<SharedApi> {
    globals.get("analytics")
  }
}

#[tokio::test]
async fn test_manual_trigger_replays_queued_calls_after_load() {
  let h = harness();
  let scope = Scope::new();
  let instance = h.runtime.use_script(request("x"), TriggerSpec::Manual, &scope);

  let a = instance.proxy().get("track").call(vec![json!("a")]);
  let b = instance.proxy().get("track").call(vec![json!("b")]);

  assert_eq!(instance.status(), LoadStatus::AwaitingTrigger);
  assert_eq!(h.document.insert_count("x"), 0);
  assert!(h.api.calls().is_empty());

  assert!(instance.load());
  assert_eq!(instance.status(), LoadStatus::Loading);
  assert!(h.api.calls().is_empty());

  h.document.complete("x");

  assert_eq!(instance.status(), LoadStatus::Loaded);
  assert_eq!(
    h.api.calls(),
    vec![
      ("track".to_string(), vec![json!("a")]),
      ("track".to_string(), vec![json!("b")]),
    ]
  );
  assert!(a.await.is_ok());
  assert!(b.await.is_ok());
}

#[test]
fn test_instances_for_same_key_share_proxy_and_insertion() {
  let h = harness();
  let scope = Scope::new();
  let first = h.runtime.use_script(request("x"), TriggerSpec::Manual, &scope);
  let second = h.runtime.use_script(request("x"), TriggerSpec::Manual, &scope);

  assert!(first.proxy().same_proxy(second.proxy()));

  let _ = first.proxy().invoke("track", vec![json!(1)]);
  let _ = second.proxy().invoke("track", vec![json!(2)]);
  let _ = first.proxy().invoke("track", vec![json!(3)]);

  // Either instance's trigger may perform the insertion.
  second.load();
  first.load();
  assert_eq!(h.document.insert_count("x"), 1);

  h.document.complete("x");
  let args: Vec<_> = h.api.calls().into_iter().map(|(_, args)| args[0].clone()).collect();
  assert_eq!(args, vec![json!(1), json!(2), json!(3)]);
}

#[test]
fn test_network_failure_rejects_proxy_calls() {
  let h = harness();
  let instance = h
    .runtime
    .use_script(request("x"), TriggerSpec::Immediate, &Scope::new());

  let mut queued = instance.proxy().invoke("track", vec![json!("a")]);
  let errors = Arc::new(AtomicUsize::new(0));
  let e = errors.clone();
  instance.on_error(move |_| {
    e.fetch_add(1, Ordering::SeqCst);
  });

  h.document.fail("x", LoadFailure::network("blocked by client"));

  assert_eq!(instance.status(), LoadStatus::Error);
  assert_eq!(errors.load(Ordering::SeqCst), 1);
  assert!(matches!(queued.try_result(), Some(Err(CallError::ScriptFailed { .. }))));

  let mut later = instance.proxy().invoke("track", vec![json!("b")]);
  assert!(matches!(later.try_result(), Some(Err(CallError::ScriptFailed { .. }))));
  assert_eq!(instance.proxy().mode(), ProxyMode::Failed);
}

#[test]
fn test_registry_script_maps_attributes() {
  let h = harness();
  let instance = h.runtime.use_registry_script(
    &Analytics,
    AnalyticsOptions {
      id: "site-1".to_string(),
      defer: false,
    },
    UseScriptOptions::default().with_trigger(TriggerSpec::Immediate),
    &Scope::new(),
  );

  assert_eq!(instance.key(), "analytics");
  let inserted = h.document.inserted();
  assert_eq!(inserted.len(), 1);
  assert_eq!(inserted[0].src, "https://analytics.example.com/tag.js?id=site-1");
  assert_eq!(
    inserted[0].attribute("data-site"),
    Some(&AttrValue::Str("site-1".to_string()))
  );
  assert_eq!(inserted[0].attribute("defer"), None);
  assert_eq!(inserted[0].attribute("nonce"), None);

  h.document.complete("analytics");
  assert!(instance.handle().api().is_some());
}

#[test]
fn test_on_ready_trigger_waits_for_ready_event() {
  let h = harness();
  let instance = h
    .runtime
    .use_script(request("x"), TriggerSpec::default(), &Scope::new());

  assert_eq!(h.document.insert_count("x"), 0);
  h.env.fire_ready();
  assert_eq!(h.document.insert_count("x"), 1);
  assert_eq!(instance.status(), LoadStatus::Loading);
}

#[tokio::test]
async fn test_dropped_instance_still_inserts_on_ready() {
  let h = harness();
  let _ = h
    .runtime
    .use_script(request("x"), TriggerSpec::OnReady, &Scope::new());

  let button: ElementRef = "#chat".into();
  let _ = h.runtime.use_script(
    request("chat"),
    TriggerSpec::element(button.clone(), InteractionKind::Click),
    &Scope::new(),
  );

  let keeper = h.runtime.use_script(request("x"), TriggerSpec::Manual, &Scope::new());
  let queued = keeper.proxy().invoke("track", vec![json!("page")]);

  h.env.fire_ready();
  h.env.fire(&button, InteractionKind::Click);

  assert_eq!(h.runtime.status("x"), Some(LoadStatus::Loading));
  assert_eq!(h.document.insert_count("x"), 1);
  assert_eq!(h.runtime.status("chat"), Some(LoadStatus::Loading));
  assert_eq!(h.document.insert_count("chat"), 1);
  assert_eq!(h.env.listener_count(), 0);

  h.document.complete("x");
  assert_eq!(keeper.status(), LoadStatus::Loaded);
  assert_eq!(h.api.calls(), vec![("track".to_string(), vec![json!("page")])]);
  assert!(queued.await.is_ok());
}

#[test]
fn test_visible_trigger_inserts_once() {
  let h = harness();
  let player: ElementRef = "#player".into();
  let instance = h.runtime.use_script(
    request("video"),
    TriggerSpec::element(player.clone(), InteractionKind::Visible),
    &Scope::new(),
  );

  for _ in 0..4 {
    h.env.fire(&player, InteractionKind::Visible);
  }

  assert_eq!(h.document.insert_count("video"), 1);
  assert_eq!(instance.status(), LoadStatus::Loading);
  assert_eq!(h.env.listener_count(), 0);
}

#[test]
fn test_hydrated_interaction_resolves_without_event() {
  let h = harness();
  let button: ElementRef = "#chat".into();
  h.env.set_satisfied(&button, InteractionKind::Click);

  let instance = h.runtime.use_script(
    request("chat"),
    TriggerSpec::element(button, InteractionKind::Click),
    &Scope::new(),
  );

  assert_eq!(instance.status(), LoadStatus::Loading);
  assert_eq!(h.env.observe_calls(), 0);
}

#[test]
fn test_disposed_scope_prevents_insertion() {
  let h = harness();
  let button: ElementRef = "#chat".into();
  let scope = Scope::new();
  let instance = h.runtime.use_script(
    request("chat"),
    TriggerSpec::element(button.clone(), InteractionKind::Hover),
    &scope,
  );

  scope.dispose();
  h.env.fire(&button, InteractionKind::Hover);

  assert_eq!(h.document.insert_count("chat"), 0);
  assert_eq!(instance.status(), LoadStatus::AwaitingTrigger);
  assert_eq!(h.env.listener_count(), 0);
}

#[test]
fn test_server_render_defers_everything() {
  let document = Arc::new(RecordingDocument::server());
  let runtime = ScriptRuntime::new(
    document.clone(),
    Arc::new(MapGlobals::new()),
    Arc::new(FakeEnvironment::server()),
    LoaderConfig::default(),
  );

  let instance = runtime.use_script(request("x"), TriggerSpec::Immediate, &Scope::new());

  assert_eq!(runtime.render_mode(), RenderMode::Server);
  assert!(!instance.load());
  assert_eq!(instance.status(), LoadStatus::AwaitingTrigger);
  assert_eq!(instance.proxy().mode(), ProxyMode::Queueing);
  assert!(document.inserted().is_empty());
}

#[test]
fn test_bundled_script_uses_local_locator() {
  let mut bundles = BundleManifest::default();
  bundles.insert(
    "https://cdn.example.com/x.js",
    "/_scripts/0123456789abcdef.js",
  );
  let h = harness_with(LoaderConfig::default(), bundles);

  let mut req = request("x");
  req.resource = req.resource.bundled(true);
  let instance = h.runtime.use_script(req, TriggerSpec::Immediate, &Scope::new());

  assert_eq!(instance.key(), "x");
  assert_eq!(h.document.inserted()[0].src, "/_scripts/0123456789abcdef.js");
}

#[test]
fn test_retry_policy_attaches_fresh_proxy() {
  let h = harness_with(
    LoaderConfig {
      on_error: ErrorPolicy::Retry,
    },
    BundleManifest::default(),
  );
  let first = h
    .runtime
    .use_script(request("x"), TriggerSpec::Immediate, &Scope::new());
  h.document.fail("x", LoadFailure::network("timeout"));

  let second = h
    .runtime
    .use_script(request("x"), TriggerSpec::Immediate, &Scope::new());

  assert!(!first.proxy().same_proxy(second.proxy()));
  assert_eq!(first.proxy().mode(), ProxyMode::Failed);
  assert_eq!(h.document.insert_count("x"), 2);

  h.document.complete("x");
  assert_eq!(second.proxy().mode(), ProxyMode::Live);
}

#[test]
fn test_manifest_consent_trigger() {
  let h = harness();
  let def = ScriptDef {
    key: Some("pixel".to_string()),
    trigger: TriggerDef::Consent { then: None },
    ..ScriptDef::new("https://pixel.example.com/p.js")
  };
  let use_api: deferscript_loader::UseFn = Arc::new(|globals: &dyn GlobalScope| globals.get("analytics"));

  let instance = h.runtime.use_def(&def, use_api, &Scope::new());
  assert_eq!(instance.status(), LoadStatus::AwaitingTrigger);

  h.runtime.consent().accept();
  assert_eq!(instance.status(), LoadStatus::Loading);
  assert_eq!(h.document.insert_count("pixel"), 1);
}

#[test]
fn test_instance_remove_only_touches_its_attempt() {
  let h = harness();
  let old = h
    .runtime
    .use_script(request("x"), TriggerSpec::Immediate, &Scope::new());
  assert!(old.remove());
  assert_eq!(old.status(), LoadStatus::Error);

  let new = h
    .runtime
    .use_script(request("x"), TriggerSpec::Immediate, &Scope::new());
  assert!(!old.remove());
  assert_eq!(h.runtime.status("x"), Some(LoadStatus::Loading));
  assert!(!old.proxy().same_proxy(new.proxy()));
}

#[tokio::test]
async fn test_wait_returns_api_from_auto_loading_document() {
  let h = harness();
  h.document.set_auto(AutoOutcome::Load);

  let instance = h
    .runtime
    .use_script(request("x"), TriggerSpec::Immediate, &Scope::new());

  let api = instance.wait().await.unwrap();
  api.invoke(&"ping".into(), &[]).unwrap();
  assert_eq!(h.api.calls(), vec![("ping".to_string(), vec![])]);
  assert_eq!(h.runtime.snapshot(), vec![("x".to_string(), LoadStatus::Loaded)]);
}

#[tokio::test(start_paused = true)]
async fn test_idle_timeout_trigger() {
  let h = harness();
  let instance = h.runtime.use_script(
    request("x"),
    TriggerSpec::IdleTimeout(std::time::Duration::from_millis(500)),
    &Scope::new(),
  );

  assert_eq!(instance.status(), LoadStatus::AwaitingTrigger);
  let mut status = instance.watch_status();
  status
    .wait_for(|s| *s == LoadStatus::Loading)
    .await
    .unwrap();
  assert_eq!(h.document.insert_count("x"), 1);
}
