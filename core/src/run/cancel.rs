// gantry/src/run/cancel.rs

//! Run-level cancellation.

use std::sync::Arc;
use tokio::sync::watch;

/// Raises cancellation for a run. Cloneable; any clone may cancel.
#[derive(Debug, Clone)]
pub struct CancelHandle {
  tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(false);
    Self { tx: Arc::new(tx) }
  }

  /// Cancels the run. Idempotent.
  pub fn cancel(&self) {
    self.tx.send_replace(true);
  }

  pub fn is_cancelled(&self) -> bool {
    *self.tx.borrow()
  }

  pub fn signal(&self) -> CancelSignal {
    CancelSignal { rx: self.tx.subscribe() }
  }
}

impl Default for CancelHandle {
  fn default() -> Self {
    Self::new()
  }
}

/// Observes run cancellation. Handed to executors so long-running units can
/// stop cooperatively; units that do not opt out are also aborted by the
/// scheduler.
#[derive(Debug, Clone)]
pub struct CancelSignal {
  rx: watch::Receiver<bool>,
}

impl CancelSignal {
  pub fn is_cancelled(&self) -> bool {
    *self.rx.borrow()
  }

  /// Resolves once the run is cancelled. Never resolves if every
  /// `CancelHandle` is dropped without cancelling.
  pub async fn cancelled(&mut self) {
    loop {
      if *self.rx.borrow_and_update() {
        return;
      }
      if self.rx.changed().await.is_err() {
        std::future::pending::<()>().await;
      }
    }
  }
}
