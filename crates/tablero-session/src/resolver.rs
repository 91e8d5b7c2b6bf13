//! Turns a session into a [`User`].

use std::{sync::Arc, time::Duration};

use tablero_core::{
  backend::ProfileSource,
  profile::ProfileRecord,
  session::Session,
  user::User,
};
use tracing::{debug, warn};

use crate::Result;

/// How the profile lookup for a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
  Found(ProfileRecord),
  /// The subject has no profile row.
  NotFound,
  /// The lookup did not answer within the budget.
  TimedOut,
  Failed(String),
}

impl LookupOutcome {
  pub fn profile(&self) -> Option<&ProfileRecord> {
    match self {
      Self::Found(record) => Some(record),
      _ => None,
    }
  }

  /// Whether the profile source could not give an answer at all.
  ///
  /// `NotFound` is an answer; a timeout or an error is not.
  pub fn is_unavailable(&self) -> bool { matches!(self, Self::TimedOut | Self::Failed(_)) }
}

/// A resolved identity together with the lookup that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
  pub user:   User,
  pub lookup: LookupOutcome,
}

/// Derives [`User`]s from sessions, enriching them from a [`ProfileSource`]
/// within a time budget.
pub struct IdentityResolver<P> {
  profiles: Arc<P>,
}

impl<P> Clone for IdentityResolver<P> {
  fn clone(&self) -> Self {
    Self {
      profiles: Arc::clone(&self.profiles),
    }
  }
}

impl<P: ProfileSource> IdentityResolver<P> {
  pub fn new(profiles: Arc<P>) -> Self { Self { profiles } }

  /// Resolve `session` into a user.
  ///
  /// `None` resolves to `None` without suspending. A profile lookup that is
  /// missing, slow or failing yields the degraded identity; only a
  /// structurally invalid session is an error.
  pub async fn resolve(
    &self,
    session: Option<&Session>,
    timeout: Duration,
  ) -> Result<Option<User>> {
    Ok(
      self
        .resolve_detailed(session, timeout)
        .await?
        .map(|resolved| resolved.user),
    )
  }

  /// Like [`resolve`](Self::resolve), but also reports the lookup outcome.
  pub async fn resolve_detailed(
    &self,
    session: Option<&Session>,
    timeout: Duration,
  ) -> Result<Option<Resolved>> {
    match session {
      Some(session) => Ok(Some(self.resolve_session(session, timeout).await?)),
      None => Ok(None),
    }
  }

  /// Resolve a session that is known to be present.
  pub async fn resolve_session(
    &self,
    session: &Session,
    timeout: Duration,
  ) -> Result<Resolved> {
    let valid = session.validate()?;

    let lookup = self.lookup(valid.id(), timeout).await;
    let user = User::from_valid(valid, lookup.profile());
    Ok(Resolved { user, lookup })
  }

  /// Race the profile fetch against `timeout`.
  async fn lookup(&self, subject_id: &str, timeout: Duration) -> LookupOutcome {
    match tokio::time::timeout(timeout, self.profiles.fetch_profile(subject_id)).await {
      Ok(Ok(Some(record))) => LookupOutcome::Found(record),
      Ok(Ok(None)) => {
        debug!(subject_id, "no profile row; using session defaults");
        LookupOutcome::NotFound
      }
      Ok(Err(e)) => {
        warn!(subject_id, error = %e, "profile lookup failed; using session defaults");
        LookupOutcome::Failed(e.to_string())
      }
      Err(_) => {
        warn!(subject_id, ?timeout, "profile lookup timed out; using session defaults");
        LookupOutcome::TimedOut
      }
    }
  }
}
