//! Single-writer holder of the published
//! [`AuthState`].
//!
//! Every resolution takes a [`Generation`] when it starts and may only
//! publish while that generation is still the newest one. Taking a
//! generation and the compare-then-publish both run under the watch
//! channel's write lock, so a stale result can never land after a newer
//! event has been registered.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tablero_core::user::AuthState;
use tokio::sync::watch;

/// Token identifying one resolution attempt. Later attempts compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
  pub fn get(self) -> u64 { self.0 }
}

/// Observable holder of the current [`AuthState`].
#[derive(Debug)]
pub struct AuthStateStore {
  tx:         watch::Sender<AuthState>,
  generation: AtomicU64,
  closed:     AtomicBool,
}

impl Default for AuthStateStore {
  fn default() -> Self { Self::new() }
}

impl AuthStateStore {
  pub fn new() -> Self {
    let (tx, _) = watch::channel(AuthState::default());
    Self {
      tx,
      generation: AtomicU64::new(0),
      closed: AtomicBool::new(false),
    }
  }

  /// A snapshot of the current state.
  pub fn current(&self) -> AuthState { self.tx.borrow().clone() }

  /// Receive every subsequent state change.
  pub fn subscribe(&self) -> watch::Receiver<AuthState> { self.tx.subscribe() }

  /// The newest generation handed out so far.
  pub fn latest(&self) -> Generation { Generation(self.generation.load(Ordering::SeqCst)) }

  pub fn is_closed(&self) -> bool { self.closed.load(Ordering::SeqCst) }

  /// Register a new resolution attempt and mark the state as loading.
  ///
  /// Any attempt started earlier can no longer publish.
  pub fn begin(&self) -> Generation {
    let mut generation = Generation(0);
    self.tx.send_if_modified(|state| {
      generation = Generation(self.generation.fetch_add(1, Ordering::SeqCst) + 1);
      if self.is_closed() || state.loading {
        return false;
      }
      state.loading = true;
      true
    });
    generation
  }

  /// Apply `update` and finish loading, if `generation` is still the newest
  /// attempt. Returns whether anything was published.
  pub fn publish(&self, generation: Generation, update: impl FnOnce(&mut AuthState)) -> bool {
    self.tx.send_if_modified(|state| {
      if self.is_closed() || self.generation.load(Ordering::SeqCst) != generation.0 {
        return false;
      }
      update(state);
      state.loading = false;
      true
    })
  }

  /// Apply `update` regardless of generation. Used for command feedback
  /// (error messages) that is not tied to a session event.
  pub fn update(&self, update: impl FnOnce(&mut AuthState)) -> bool {
    self.tx.send_if_modified(|state| {
      if self.is_closed() {
        return false;
      }
      let before = state.clone();
      update(state);
      *state != before
    })
  }

  /// Stop all further publications. Idempotent.
  pub fn close(&self) {
    self.tx.send_if_modified(|_| {
      self.closed.store(true, Ordering::SeqCst);
      false
    });
  }
}
