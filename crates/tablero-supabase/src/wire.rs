//! Request and response bodies of the GoTrue and PostgREST APIs, and their
//! conversion into core types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tablero_core::session::Session;

// ─── Requests ────────────────────────────────────────────────────────────────

/// Body of `POST /auth/v1/token?grant_type=password`.
#[derive(Debug, Serialize)]
pub struct PasswordGrant<'a> {
  pub email:    &'a str,
  pub password: &'a str,
}

/// Body of `POST /auth/v1/token?grant_type=refresh_token`.
#[derive(Debug, Serialize)]
pub struct RefreshGrant<'a> {
  pub refresh_token: &'a str,
}

// ─── Responses ───────────────────────────────────────────────────────────────

/// The auth user embedded in a token response.
#[derive(Debug, Deserialize)]
pub struct AuthUser {
  pub id:         String,
  #[serde(default)]
  pub email:      Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Successful token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
  pub access_token:  String,
  #[serde(default)]
  pub refresh_token: Option<String>,
  /// Lifetime in seconds.
  #[serde(default)]
  pub expires_in:    Option<i64>,
  /// Absolute expiry as a unix timestamp.
  #[serde(default)]
  pub expires_at:    Option<i64>,
  pub user:          AuthUser,
}

impl TokenResponse {
  pub fn into_session(self, now: DateTime<Utc>) -> Session {
    let expires_at = self
      .expires_at
      .and_then(|secs| DateTime::from_timestamp(secs, 0))
      .or_else(|| self.expires_in.map(|secs| now + Duration::seconds(secs)));

    Session {
      id: self.user.id,
      email: self.user.email,
      created_at: self.user.created_at,
      access_token: self.access_token,
      refresh_token: self.refresh_token,
      expires_at,
    }
  }
}

/// Error body returned by GoTrue and PostgREST. Different endpoints and
/// server versions use different field names for the message.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
  error_description: Option<String>,
  msg:               Option<String>,
  message:           Option<String>,
  error:             Option<String>,
}

impl ErrorBody {
  /// The most descriptive message in `body`, or `fallback`.
  pub fn message_from(body: &str, fallback: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
      .error_description
      .or(parsed.msg)
      .or(parsed.message)
      .or(parsed.error)
      .filter(|m| !m.is_empty())
      .unwrap_or_else(|| fallback.to_owned())
  }
}
