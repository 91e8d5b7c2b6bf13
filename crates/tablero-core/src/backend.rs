//! Interfaces of the external authentication-and-storage collaborator.
//!
//! The traits are implemented by backend adapters (e.g. `tablero-supabase`)
//! and by test doubles. Higher layers (`tablero-session`, `tablero-cli`)
//! depend on this abstraction, not on any concrete backend.

use std::future::Future;

use tokio::sync::broadcast;

use crate::{
  profile::ProfileRecord,
  session::{Session, SessionChange},
};

/// Abstraction over the authentication half of the collaborator.
///
/// All methods return `Send` futures so implementations can be driven from
/// spawned tokio tasks.
pub trait AuthBackend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Read the current session, if any.
  fn get_session(
    &self,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  /// Subscribe to session-change notifications.
  ///
  /// Dropping the receiver unsubscribes.
  fn subscribe(&self) -> broadcast::Receiver<SessionChange>;

  /// Exchange credentials for a new session. Implementations also emit a
  /// [`SignedIn`](crate::session::SessionEvent::SignedIn) change.
  fn sign_in_with_password<'a>(
    &'a self,
    email: &'a str,
    password: &'a str,
  ) -> impl Future<Output = Result<Session, Self::Error>> + Send + 'a;

  /// Terminate the current session. Fails on transport or server errors.
  fn sign_out(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

/// Abstraction over the profile table of the collaborator.
pub trait ProfileSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Fetch the profile row for `subject_id`. Returns `None` when the subject
  /// has no row yet.
  fn fetch_profile<'a>(
    &'a self,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<Option<ProfileRecord>, Self::Error>> + Send + 'a;
}
