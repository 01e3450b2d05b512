//! Per-key script state machine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use deferscript_trigger::TriggerGate;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::SharedApi;
use crate::document::{Document, GlobalScope, LoadSignal};
use crate::error::LoadFailure;
use crate::loader::UseFn;
use crate::resource::ScriptResource;
use crate::status::LoadStatus;

pub(crate) type LoadedCallback = Box<dyn FnOnce(SharedApi) + Send>;
pub(crate) type ErrorCallback = Box<dyn FnOnce(LoadFailure) + Send>;

struct EntryState {
  status: LoadStatus,
  api: Option<SharedApi>,
  failure: Option<LoadFailure>,
  on_loaded: Vec<LoadedCallback>,
  on_error: Vec<ErrorCallback>,
  /// Gates attached while awaiting a trigger. Kept here so a caller dropping
  /// its handle and scope does not release the listeners.
  triggers: Vec<TriggerGate>,
}

/// One load attempt for one identity key, shared by every handle to it.
pub(crate) struct ScriptEntry {
  attempt: u64,
  resource: ScriptResource,
  use_api: UseFn,
  document: Arc<dyn Document>,
  globals: Arc<dyn GlobalScope>,
  /// Single-attempt insertion flag.
  inserted: AtomicBool,
  /// Set when the key was removed; late signals are ignored.
  detached: AtomicBool,
  state: Mutex<EntryState>,
  status_tx: watch::Sender<LoadStatus>,
}

/// Callbacks to run once the state lock is released.
enum Fanout {
  None,
  Loaded(SharedApi, Vec<LoadedCallback>),
  Failed(LoadFailure, Vec<ErrorCallback>),
}

impl Fanout {
  fn run(self) {
    match self {
      Fanout::None => {}
      Fanout::Loaded(api, callbacks) => {
        for cb in callbacks {
          cb(api.clone());
        }
      }
      Fanout::Failed(failure, callbacks) => {
        for cb in callbacks {
          cb(failure.clone());
        }
      }
    }
  }
}

impl ScriptEntry {
  pub(crate) fn new(
    attempt: u64,
    resource: ScriptResource,
    use_api: UseFn,
    document: Arc<dyn Document>,
    globals: Arc<dyn GlobalScope>,
  ) -> Self {
    Self {
      attempt,
      resource,
      use_api,
      document,
      globals,
      inserted: AtomicBool::new(false),
      detached: AtomicBool::new(false),
      state: Mutex::new(EntryState {
        status: LoadStatus::AwaitingTrigger,
        api: None,
        failure: None,
        on_loaded: Vec::new(),
        on_error: Vec::new(),
        triggers: Vec::new(),
      }),
      status_tx: watch::Sender::new(LoadStatus::AwaitingTrigger),
    }
  }

  fn lock(&self) -> MutexGuard<'_, EntryState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub(crate) fn key(&self) -> &str {
    &self.resource.key
  }

  pub(crate) fn attempt(&self) -> u64 {
    self.attempt
  }

  pub(crate) fn resource(&self) -> &ScriptResource {
    &self.resource
  }

  pub(crate) fn status(&self) -> LoadStatus {
    self.lock().status
  }

  pub(crate) fn watch(&self) -> watch::Receiver<LoadStatus> {
    self.status_tx.subscribe()
  }

  pub(crate) fn api(&self) -> Option<SharedApi> {
    self.lock().api.clone()
  }

  pub(crate) fn failure(&self) -> Option<LoadFailure> {
    self.lock().failure.clone()
  }

  /// Keep `gate` alive until the entry stops awaiting a trigger.
  pub(crate) fn retain_trigger(&self, gate: &TriggerGate) {
    let mut state = self.lock();
    if state.status != LoadStatus::AwaitingTrigger || self.detached.load(Ordering::Acquire) {
      return;
    }
    state.triggers.retain(TriggerGate::is_pending);
    if gate.is_pending() {
      state.triggers.push(gate.clone());
    }
  }

  #[cfg(test)]
  pub(crate) fn retained_triggers(&self) -> usize {
    self.lock().triggers.len()
  }

  /// Insert the element unless an insertion already happened.
  pub(crate) fn begin_insert(self: &Arc<Self>) {
    if self.detached.load(Ordering::Acquire) {
      debug!(key = %self.key(), "trigger resolved for removed script, ignoring");
      return;
    }

    if self
      .inserted
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      debug!(key = %self.key(), "duplicate insertion attempt suppressed");
      return;
    }

    // Dropped after the lock; releasing a gate unregisters its listeners.
    let _released = {
      let mut state = self.lock();
      if !state.status.can_transition_to(LoadStatus::Loading) {
        return;
      }
      state.status = LoadStatus::Loading;
      self.status_tx.send_replace(LoadStatus::Loading);
      std::mem::take(&mut state.triggers)
    };

    let element = self.resource.element();
    info!(
      key = %self.key(),
      src = %element.src,
      attributes = element.attributes.len(),
      "inserting script"
    );

    let signal = LoadSignal::new(Arc::downgrade(self), self.key().to_string());
    self.document.insert(element, signal);
  }

  /// Apply the document's load outcome.
  pub(crate) fn complete(&self, outcome: Result<(), LoadFailure>) {
    if self.detached.load(Ordering::Acquire) {
      debug!(key = %self.key(), "load signal for removed script, ignoring");
      return;
    }

    if self.status() != LoadStatus::Loading {
      debug!(key = %self.key(), status = %self.status(), "late load signal ignored");
      return;
    }

    // The extraction function is caller code; run it outside the lock.
    let outcome = outcome.and_then(|()| {
      (self.use_api)(self.globals.as_ref()).ok_or_else(|| LoadFailure::MissingApi {
        key: self.key().to_string(),
      })
    });

    let fanout = {
      let mut state = self.lock();
      if state.status != LoadStatus::Loading {
        return;
      }
      Self::settle(&mut state, &self.status_tx, outcome)
    };

    match &fanout {
      Fanout::Loaded(_, callbacks) => {
        info!(key = %self.key(), subscribers = callbacks.len(), "script loaded");
      }
      Fanout::Failed(failure, callbacks) => {
        warn!(
          key = %self.key(),
          error = %failure,
          subscribers = callbacks.len(),
          "script failed to load"
        );
      }
      Fanout::None => {}
    }

    fanout.run();
  }

  fn settle(
    state: &mut EntryState,
    status_tx: &watch::Sender<LoadStatus>,
    outcome: Result<SharedApi, LoadFailure>,
  ) -> Fanout {
    match outcome {
      Ok(api) => {
        state.status = LoadStatus::Loaded;
        state.api = Some(api.clone());
        state.on_error.clear();
        status_tx.send_replace(LoadStatus::Loaded);
        Fanout::Loaded(api, std::mem::take(&mut state.on_loaded))
      }
      Err(failure) => {
        state.status = LoadStatus::Error;
        state.failure = Some(failure.clone());
        state.on_loaded.clear();
        status_tx.send_replace(LoadStatus::Error);
        Fanout::Failed(failure, std::mem::take(&mut state.on_error))
      }
    }
  }

  /// Mark the entry removed. A non-terminal entry fails with `Removed`.
  pub(crate) fn detach(&self) {
    self.detached.store(true, Ordering::Release);

    let (fanout, _released) = {
      let mut state = self.lock();
      let released = std::mem::take(&mut state.triggers);
      let fanout = if state.status.is_terminal() {
        Fanout::None
      } else {
        let failure = LoadFailure::Removed {
          key: self.key().to_string(),
        };
        Self::settle(&mut state, &self.status_tx, Err(failure))
      };
      (fanout, released)
    };

    fanout.run();
  }

  pub(crate) fn on_loaded(&self, cb: LoadedCallback) {
    let api = {
      let mut state = self.lock();
      match state.status {
        LoadStatus::Loaded => state.api.clone(),
        LoadStatus::Error => return,
        _ => {
          state.on_loaded.push(cb);
          return;
        }
      }
    };

    if let Some(api) = api {
      cb(api);
    }
  }

  pub(crate) fn on_error(&self, cb: ErrorCallback) {
    let failure = {
      let mut state = self.lock();
      match state.status {
        LoadStatus::Error => state.failure.clone(),
        LoadStatus::Loaded => return,
        _ => {
          state.on_error.push(cb);
          return;
        }
      }
    };

    if let Some(failure) = failure {
      cb(failure);
    }
  }
}
