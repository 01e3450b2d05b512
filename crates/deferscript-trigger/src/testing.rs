//! In-memory [`TriggerEnvironment`] for tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use deferscript_config::InteractionKind;

use crate::environment::{ElementRef, EventCallback, RenderMode, TriggerEnvironment};
use crate::subscription::Subscription;

#[derive(Default)]
struct FakeState {
  ready: bool,
  next_id: u64,
  observe_calls: usize,
  ready_listeners: Vec<(u64, EventCallback)>,
  observers: Vec<(u64, ElementRef, InteractionKind, EventCallback)>,
  satisfied: HashSet<(ElementRef, InteractionKind)>,
}

/// Scriptable environment: tests fire ready and interaction events by hand.
pub struct FakeEnvironment {
  mode: RenderMode,
  state: Arc<Mutex<FakeState>>,
}

fn lock(state: &Mutex<FakeState>) -> MutexGuard<'_, FakeState> {
  state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeEnvironment {
  pub fn client() -> Self {
    Self::new(RenderMode::Client)
  }

  pub fn server() -> Self {
    Self::new(RenderMode::Server)
  }

  fn new(mode: RenderMode) -> Self {
    Self {
      mode,
      state: Arc::new(Mutex::new(FakeState::default())),
    }
  }

  /// Fire the ready event. Later `on_ready` registrations fire immediately.
  pub fn fire_ready(&self) {
    let listeners: Vec<EventCallback> = {
      let mut state = lock(&self.state);
      state.ready = true;
      state.ready_listeners.iter().map(|(_, cb)| cb.clone()).collect()
    };
    for cb in listeners {
      cb();
    }
  }

  /// Fire an interaction. Returns how many listeners were invoked.
  pub fn fire(&self, element: &ElementRef, kind: InteractionKind) -> usize {
    let matching: Vec<EventCallback> = lock(&self.state)
      .observers
      .iter()
      .filter(|(_, el, k, _)| el == element && *k == kind)
      .map(|(_, _, _, cb)| cb.clone())
      .collect();

    let count = matching.len();
    for cb in matching {
      cb();
    }
    count
  }

  /// Mark an interaction as already satisfied, as if server markup said so.
  pub fn set_satisfied(&self, element: &ElementRef, kind: InteractionKind) {
    lock(&self.state).satisfied.insert((element.clone(), kind));
  }

  /// Live listeners of any kind.
  pub fn listener_count(&self) -> usize {
    let state = lock(&self.state);
    state.ready_listeners.len() + state.observers.len()
  }

  /// Total `observe` calls made, including released ones.
  pub fn observe_calls(&self) -> usize {
    lock(&self.state).observe_calls
  }

  fn release(state: &Weak<Mutex<FakeState>>, id: u64) -> Subscription {
    let state = state.clone();
    Subscription::new(move || {
      if let Some(state) = state.upgrade() {
        let mut state = lock(&state);
        state.ready_listeners.retain(|(i, _)| *i != id);
        state.observers.retain(|(i, _, _, _)| *i != id);
      }
    })
  }
}

impl TriggerEnvironment for FakeEnvironment {
  fn render_mode(&self) -> RenderMode {
    self.mode
  }

  fn on_ready(&self, callback: EventCallback) -> Subscription {
    let mut state = lock(&self.state);
    if state.ready {
      drop(state);
      callback();
      return Subscription::noop();
    }

    let id = state.next_id;
    state.next_id += 1;
    state.ready_listeners.push((id, callback));
    Self::release(&Arc::downgrade(&self.state), id)
  }

  fn observe(
    &self,
    element: &ElementRef,
    kind: InteractionKind,
    callback: EventCallback,
  ) -> Subscription {
    let mut state = lock(&self.state);
    let id = state.next_id;
    state.next_id += 1;
    state.observe_calls += 1;
    state.observers.push((id, element.clone(), kind, callback));
    Self::release(&Arc::downgrade(&self.state), id)
  }

  fn is_satisfied(&self, element: &ElementRef, kind: InteractionKind) -> bool {
    lock(&self.state).satisfied.contains(&(element.clone(), kind))
  }
}
