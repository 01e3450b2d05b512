use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::CallError;

pub(crate) type Completion = oneshot::Sender<Result<Value, CallError>>;

/// The eventual result of a proxied call.
///
/// Dropping it does not cancel the call; the result is discarded.
#[derive(Debug)]
pub struct PendingCall {
  rx: oneshot::Receiver<Result<Value, CallError>>,
}

impl PendingCall {
  pub(crate) fn channel() -> (Completion, Self) {
    let (tx, rx) = oneshot::channel();
    (tx, Self { rx })
  }

  /// A call that has already settled.
  pub(crate) fn settled(result: Result<Value, CallError>) -> Self {
    let (tx, pending) = Self::channel();
    let _ = tx.send(result);
    pending
  }

  /// Take the result without waiting. `None` while the call is queued.
  pub fn try_result(&mut self) -> Option<Result<Value, CallError>> {
    match self.rx.try_recv() {
      Ok(result) => Some(result),
      Err(oneshot::error::TryRecvError::Empty) => None,
      Err(oneshot::error::TryRecvError::Closed) => Some(Err(CallError::Dropped)),
    }
  }
}

impl Future for PendingCall {
  type Output = Result<Value, CallError>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    Pin::new(&mut self.rx)
      .poll(cx)
      .map(|received| received.unwrap_or(Err(CallError::Dropped)))
  }
}
