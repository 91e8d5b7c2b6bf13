//! The derived application identity and the published auth state.
//!
//! A [`User`] is never stored; it is rebuilt from a [`Session`] and an
//! optional [`ProfileRecord`] on every session change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  profile::ProfileRecord,
  session::{Session, ValidSession},
};

/// Display name used when neither the profile nor the email yields one.
pub const FALLBACK_NAME: &str = "Usuario";

/// The application-level identity derived from a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:         String,
  pub email:      String,
  pub name:       String,
  pub is_manager: bool,
  pub created_at: DateTime<Utc>,
}

impl User {
  /// Build the identity for `session`, enriched by `profile` when present.
  ///
  /// Without a profile the result is the degraded identity: email-derived
  /// name and no manager privileges.
  pub fn derive(session: &Session, profile: Option<&ProfileRecord>) -> Result<Self> {
    Ok(Self::from_valid(session.validate()?, profile))
  }

  /// [`derive`](Self::derive) for a session that was already validated.
  pub fn from_valid(session: ValidSession<'_>, profile: Option<&ProfileRecord>) -> Self {
    let name = profile
      .and_then(ProfileRecord::display_name)
      .map(str::to_owned)
      .unwrap_or_else(|| name_from_email(session.email()));

    Self {
      id:         session.id().to_owned(),
      email:      session.email().to_owned(),
      name,
      is_manager: profile.and_then(|p| p.is_manager).unwrap_or(false),
      created_at: session.created_at(),
    }
  }

  /// Shorthand for `derive(session, None)`.
  pub fn degraded(session: &Session) -> Result<Self> { Self::derive(session, None) }
}

/// The local part of `email` (before the first `@`), or [`FALLBACK_NAME`].
pub fn name_from_email(email: &str) -> String {
  match email.split_once('@') {
    Some((local, _)) if !local.is_empty() => local.to_owned(),
    _ => FALLBACK_NAME.to_owned(),
  }
}

// ─── Published state ─────────────────────────────────────────────────────────

/// The process-wide authentication state observed by front ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
  pub user:    Option<User>,
  pub loading: bool,
  pub error:   Option<String>,
}

impl AuthState {
  pub fn is_authenticated(&self) -> bool { self.user.is_some() }
}

impl Default for AuthState {
  /// Nothing is known until the initial session restore finishes.
  fn default() -> Self {
    Self {
      user:    None,
      loading: true,
      error:   None,
    }
  }
}
