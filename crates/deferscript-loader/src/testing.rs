//! Test doubles for the document, the global namespace and API objects.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use deferscript_trigger::RenderMode;
use serde_json::Value;

use crate::api::{ApiError, ApiObject, CallPath, SharedApi};
use crate::document::{Document, GlobalScope, LoadSignal};
use crate::error::LoadFailure;
use crate::resource::ScriptElement;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
  m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How a [`RecordingDocument`] reports inserted scripts.
#[derive(Debug, Clone, PartialEq)]
pub enum AutoOutcome {
  /// Hold the signal until the test calls `complete` or `fail`.
  Manual,
  /// Report load completion during `insert`.
  Load,
  /// Report this failure during `insert`.
  Fail(LoadFailure),
}

/// Document that records insertions and lets tests report outcomes.
pub struct RecordingDocument {
  mode: RenderMode,
  auto: Mutex<AutoOutcome>,
  inserted: Mutex<Vec<ScriptElement>>,
  removed: Mutex<Vec<String>>,
  pending: Mutex<HashMap<String, LoadSignal>>,
}

impl RecordingDocument {
  pub fn client() -> Self {
    Self::new(RenderMode::Client)
  }

  pub fn server() -> Self {
    Self::new(RenderMode::Server)
  }

  fn new(mode: RenderMode) -> Self {
    Self {
      mode,
      auto: Mutex::new(AutoOutcome::Manual),
      inserted: Mutex::new(Vec::new()),
      removed: Mutex::new(Vec::new()),
      pending: Mutex::new(HashMap::new()),
    }
  }

  pub fn set_auto(&self, outcome: AutoOutcome) {
    *lock(&self.auto) = outcome;
  }

  /// Report load completion for `key`. Returns whether a signal was pending.
  pub fn complete(&self, key: &str) -> bool {
    let signal = lock(&self.pending).remove(key);
    match signal {
      Some(signal) => {
        signal.loaded();
        true
      }
      None => false,
    }
  }

  /// Report a failure for `key`. Returns whether a signal was pending.
  pub fn fail(&self, key: &str, failure: LoadFailure) -> bool {
    let signal = lock(&self.pending).remove(key);
    match signal {
      Some(signal) => {
        signal.failed(failure);
        true
      }
      None => false,
    }
  }

  pub fn inserted(&self) -> Vec<ScriptElement> {
    lock(&self.inserted).clone()
  }

  pub fn insert_count(&self, key: &str) -> usize {
    lock(&self.inserted).iter().filter(|e| e.key == key).count()
  }

  pub fn removed(&self) -> Vec<String> {
    lock(&self.removed).clone()
  }
}

impl Document for RecordingDocument {
  fn render_mode(&self) -> RenderMode {
    self.mode
  }

  fn insert(&self, element: ScriptElement, signal: LoadSignal) {
    let key = element.key.clone();
    lock(&self.inserted).push(element);

    let auto = lock(&self.auto).clone();
    match auto {
      AutoOutcome::Manual => {
        lock(&self.pending).insert(key, signal);
      }
      AutoOutcome::Load => signal.loaded(),
      AutoOutcome::Fail(failure) => signal.failed(failure),
    }
  }

  fn remove(&self, key: &str) -> bool {
    let present = lock(&self.inserted).iter().any(|e| e.key == key);
    lock(&self.removed).push(key.to_string());
    present
  }
}

/// Global namespace backed by a map.
#[derive(Default)]
pub struct MapGlobals {
  values: Mutex<HashMap<String, SharedApi>>,
}

impl MapGlobals {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set(&self, name: impl Into<String>, api: SharedApi) {
    lock(&self.values).insert(name.into(), api);
  }
}

impl GlobalScope for MapGlobals {
  fn get(&self, name: &str) -> Option<SharedApi> {
    lock(&self.values).get(name).cloned()
  }
}

/// API object that records every call.
///
/// Paths starting with `fail` raise; everything else returns the call count
/// so far.
#[derive(Default)]
pub struct RecordingApi {
  calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl RecordingApi {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
    lock(&self.calls).clone()
  }
}

impl ApiObject for RecordingApi {
  fn invoke(&self, path: &CallPath, args: &[Value]) -> Result<Value, ApiError> {
    let name = path.to_string();
    if name.starts_with("fail") {
      return Err(ApiError::thrown(format!("{} raised", name)));
    }

    let mut calls = lock(&self.calls);
    calls.push((name, args.to_vec()));
    Ok(Value::from(calls.len()))
  }
}
