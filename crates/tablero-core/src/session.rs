//! Session: the externally-issued proof of authentication.
//!
//! A session is owned by the auth collaborator. The core only reads the
//! subject id, email and creation timestamp; the tokens are carried along so
//! the collaborator can authorise follow-up requests.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// An authenticated session as handed out by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  /// Stable subject identifier of the authenticated user.
  pub id:            String,
  pub email:         Option<String>,
  /// When the underlying auth user was created.
  pub created_at:    DateTime<Utc>,
  pub access_token:  String,
  pub refresh_token: Option<String>,
  pub expires_at:    Option<DateTime<Utc>>,
}

impl Session {
  /// Check that the fields a derived identity mirrors are present.
  pub fn validate(&self) -> Result<ValidSession<'_>> {
    if self.id.trim().is_empty() {
      return Err(Error::InvalidSession("id"));
    }
    match self.email.as_deref() {
      Some(email) if !email.trim().is_empty() => Ok(ValidSession {
        session: self,
        email,
      }),
      _ => Err(Error::InvalidSession("email")),
    }
  }

  /// Whether the access token expires within `margin` of `now`. Sessions
  /// without a known expiry never do.
  pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
    self.expires_at.is_some_and(|at| at - margin <= now)
  }

  /// Whether `other` is the very same issued session (same access token).
  pub fn same_issue(&self, other: &Session) -> bool {
    self.id == other.id && self.access_token == other.access_token
  }
}

/// A [`Session`] whose id and email are known to be present.
#[derive(Debug, Clone, Copy)]
pub struct ValidSession<'a> {
  session: &'a Session,
  email:   &'a str,
}

impl<'a> ValidSession<'a> {
  pub fn id(&self) -> &'a str { &self.session.id }

  pub fn email(&self) -> &'a str { self.email }

  pub fn created_at(&self) -> DateTime<Utc> { self.session.created_at }
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// The kind of change the auth collaborator reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
  /// A session was restored when the client started.
  InitialSession,
  SignedIn,
  SignedOut,
  TokenRefreshed,
  /// The auth user's attributes changed; the session stays the same.
  UserUpdated,
}

/// One push notification from the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChange {
  pub event:   SessionEvent,
  pub session: Option<Session>,
}

impl SessionChange {
  pub fn new(event: SessionEvent, session: Option<Session>) -> Self {
    Self { event, session }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn session(id: &str, email: Option<&str>) -> Session {
    Session {
      id:            id.into(),
      email:         email.map(str::to_owned),
      created_at:    Utc::now(),
      access_token:  "token".into(),
      refresh_token: None,
      expires_at:    None,
    }
  }

  #[test]
  fn validate_accepts_complete_session() {
    let s = session("u1", Some("sam@co.com"));
    assert_eq!(s.validate().map(|v| v.email()), Ok("sam@co.com"));
  }

  #[test]
  fn validate_rejects_missing_id() {
    let s = session("  ", Some("sam@co.com"));
    assert_eq!(s.validate().err(), Some(Error::InvalidSession("id")));
  }

  #[test]
  fn validate_rejects_missing_or_blank_email() {
    assert_eq!(
      session("u1", None).validate().err(),
      Some(Error::InvalidSession("email"))
    );
    assert_eq!(
      session("u1", Some("")).validate().err(),
      Some(Error::InvalidSession("email"))
    );
  }

  #[test]
  fn expiry_is_checked_against_margin() {
    let now = Utc::now();
    let mut s = session("u1", Some("sam@co.com"));
    assert!(!s.expires_within(now, Duration::seconds(60)));

    s.expires_at = Some(now + Duration::seconds(30));
    assert!(s.expires_within(now, Duration::seconds(60)));
    assert!(!s.expires_within(now, Duration::seconds(10)));

    s.expires_at = Some(now - Duration::seconds(1));
    assert!(s.expires_within(now, Duration::zero()));
  }

  #[test]
  fn event_names_match_wire_format() {
    let json = serde_json::to_string(&SessionEvent::TokenRefreshed).unwrap();
    assert_eq!(json, "\"TOKEN_REFRESHED\"");
  }
}
