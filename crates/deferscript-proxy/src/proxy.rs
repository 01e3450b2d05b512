use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use deferscript_loader::{CallPath, LoadFailure, LoadHandle, SharedApi};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::CallError;
use crate::pending::{Completion, PendingCall};

/// What the proxy does with a new call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
  /// The script has not loaded; calls are buffered.
  Queueing,
  /// Buffered calls are replaying; new calls queue behind them.
  Draining,
  /// Calls go straight to the API object.
  Live,
  /// The script failed; calls reject.
  Failed,
}

struct QueuedCall {
  path: CallPath,
  args: Vec<Value>,
  done: Completion,
}

enum State {
  Queueing,
  Draining(SharedApi),
  Live(SharedApi),
  Failed(String),
}

struct Inner {
  key: String,
  state: State,
  queue: VecDeque<QueuedCall>,
}

/// Facade over a script's API that works before the script has loaded.
///
/// Clones share the same queue, so submission order is preserved across
/// every holder.
#[derive(Clone)]
pub struct CallProxy {
  inner: Arc<Mutex<Inner>>,
}

impl CallProxy {
  /// Build a proxy that follows `handle`'s outcome.
  ///
  /// Attaching after the script already settled yields a live or failed
  /// proxy straight away.
  pub fn attach(handle: &LoadHandle) -> Self {
    let proxy = Self {
      inner: Arc::new(Mutex::new(Inner {
        key: handle.key().to_string(),
        state: State::Queueing,
        queue: VecDeque::new(),
      })),
    };

    let on_loaded = proxy.clone();
    handle.on_loaded(move |api| on_loaded.go_live(api));
    let on_error = proxy.clone();
    handle.on_error(move |failure| on_error.fail(&failure));

    proxy
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn key(&self) -> String {
    self.lock().key.clone()
  }

  pub fn mode(&self) -> ProxyMode {
    match self.lock().state {
      State::Queueing => ProxyMode::Queueing,
      State::Draining(_) => ProxyMode::Draining,
      State::Live(_) => ProxyMode::Live,
      State::Failed(_) => ProxyMode::Failed,
    }
  }

  /// Number of calls waiting for replay.
  pub fn queued(&self) -> usize {
    self.lock().queue.len()
  }

  /// Whether two proxies share one queue.
  pub fn same_proxy(&self, other: &CallProxy) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  /// Call the member at `path`.
  ///
  /// Never fails synchronously. The path is only resolved against the real
  /// API object, at the time the call actually runs.
  pub fn invoke(&self, path: impl Into<CallPath>, args: Vec<Value>) -> PendingCall {
    let path = path.into();

    let api = {
      let mut inner = self.lock();
      match &inner.state {
        State::Live(api) => api.clone(),
        State::Failed(reason) => {
          debug!(key = %inner.key, path = %path, "call rejected, script failed");
          return PendingCall::settled(Err(CallError::ScriptFailed {
            key: inner.key.clone(),
            reason: reason.clone(),
          }));
        }
        State::Queueing | State::Draining(_) => {
          let (done, pending) = PendingCall::channel();
          debug!(key = %inner.key, path = %path, position = inner.queue.len(), "call queued");
          inner.queue.push_back(QueuedCall { path, args, done });
          return pending;
        }
      }
    };

    PendingCall::settled(api.invoke(&path, &args).map_err(CallError::from))
  }

  /// Start a path at `segment`.
  pub fn get(&self, segment: impl Into<String>) -> ProxyPath {
    ProxyPath {
      proxy: self.clone(),
      path: CallPath::new().child(segment),
    }
  }

  fn go_live(&self, api: SharedApi) {
    let key = {
      let mut inner = self.lock();
      if !matches!(inner.state, State::Queueing) {
        return;
      }
      inner.state = State::Draining(api.clone());
      inner.key.clone()
    };

    let mut replayed = 0usize;
    loop {
      // One call at a time so calls made during replay land behind the queue.
      let next = {
        let mut inner = self.lock();
        match inner.queue.pop_front() {
          Some(call) => call,
          None => {
            inner.state = State::Live(api.clone());
            break;
          }
        }
      };

      let result = api.invoke(&next.path, &next.args).map_err(CallError::from);
      if let Err(err) = &result {
        debug!(key = %key, path = %next.path, error = %err, "replayed call failed");
      }
      let _ = next.done.send(result);
      replayed += 1;
    }

    info!(key = %key, replayed, "proxy live");
  }

  fn fail(&self, failure: &LoadFailure) {
    let reason = failure.to_string();
    let (key, rejected) = {
      let mut inner = self.lock();
      if !matches!(inner.state, State::Queueing) {
        return;
      }
      inner.state = State::Failed(reason.clone());
      (inner.key.clone(), std::mem::take(&mut inner.queue))
    };

    if !rejected.is_empty() {
      warn!(key = %key, rejected = rejected.len(), error = %reason, "rejecting queued calls");
    }
    for call in rejected {
      let _ = call.done.send(Err(CallError::ScriptFailed {
        key: key.clone(),
        reason: reason.clone(),
      }));
    }
  }
}

impl std::fmt::Debug for CallProxy {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CallProxy")
      .field("key", &self.key())
      .field("mode", &self.mode())
      .field("queued", &self.queued())
      .finish()
  }
}

/// A lazily resolved member path on a proxy, e.g. `proxy.get("slots").get("define")`.
#[derive(Debug, Clone)]
pub struct ProxyPath {
  proxy: CallProxy,
  path: CallPath,
}

impl ProxyPath {
  pub fn get(mut self, segment: impl Into<String>) -> Self {
    self.path = self.path.child(segment);
    self
  }

  pub fn path(&self) -> &CallPath {
    &self.path
  }

  pub fn call(&self, args: Vec<Value>) -> PendingCall {
    self.proxy.invoke(self.path.clone(), args)
  }
}
