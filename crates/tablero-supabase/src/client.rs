//! GoTrue/PostgREST client implementing the collaborator
//! traits.

use std::{
  sync::{Mutex, PoisonError},
  time::Duration,
};

use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tablero_core::{
  backend::{AuthBackend, ProfileSource},
  profile::ProfileRecord,
  session::{Session, SessionChange, SessionEvent},
};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
  Error, Result,
  wire::{ErrorBody, PasswordGrant, RefreshGrant, TokenResponse},
};

/// Table holding one profile row per auth user.
const PROFILE_TABLE: &str = "employees";

/// Connection settings for a Supabase project.
#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseConfig {
  /// Project URL, e.g. `https://xyz.supabase.co`.
  pub url:             String,
  /// Public (anon) API key.
  pub anon_key:        String,
  #[serde(default = "default_request_timeout")]
  pub request_timeout: u64,
}

fn default_request_timeout() -> u64 { 30 }

impl SupabaseConfig {
  pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
    Self {
      url:             url.into(),
      anon_key:        anon_key.into(),
      request_timeout: default_request_timeout(),
    }
  }
}

/// Async client for a Supabase project's auth and data APIs.
///
/// Holds the current session in memory; share it behind an `Arc`.
pub struct SupabaseClient {
  http:    Client,
  config:  SupabaseConfig,
  session: Mutex<Option<Session>>,
  events:  broadcast::Sender<SessionChange>,
}

impl SupabaseClient {
  pub fn new(config: SupabaseConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(Duration::from_secs(config.request_timeout))
      .build()?;
    let (events, _) = broadcast::channel(16);
    Ok(Self {
      http,
      config,
      session: Mutex::new(None),
      events,
    })
  }

  fn auth_url(&self, path: &str) -> String {
    format!("{}/auth/v1{}", self.config.url.trim_end_matches('/'), path)
  }

  fn rest_url(&self, path: &str) -> String {
    format!("{}/rest/v1{}", self.config.url.trim_end_matches('/'), path)
  }

  /// Attach the API key and the bearer token of the current session (or the
  /// anon key when signed out).
  fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
    let bearer = self
      .current()
      .map(|s| s.access_token)
      .unwrap_or_else(|| self.config.anon_key.clone());
    req
      .header("apikey", &self.config.anon_key)
      .bearer_auth(bearer)
  }

  fn current(&self) -> Option<Session> {
    self
      .session
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  /// Replace the stored session and announce the change.
  fn set_session(&self, event: SessionEvent, session: Option<Session>) {
    *self.session.lock().unwrap_or_else(PoisonError::into_inner) = session.clone();
    // No subscribers is fine.
    let _ = self.events.send(SessionChange::new(event, session));
  }

  /// Seed a session persisted by a previous run and announce it as the
  /// initial session.
  pub fn restore_session(&self, session: Session) {
    debug!(user_id = %session.id, "restoring persisted session");
    self.set_session(SessionEvent::InitialSession, Some(session));
  }

  /// The session held in memory, e.g. to persist it between runs.
  pub fn session(&self) -> Option<Session> { self.current() }

  /// Refresh the session when its access token expires within `margin`.
  /// Returns the new session if a refresh took place.
  pub async fn refresh_if_expiring(&self, margin: chrono::Duration) -> Result<Option<Session>> {
    match self.current() {
      Some(session) if session.expires_within(Utc::now(), margin) => {
        debug!(user_id = %session.id, "access token expiring; refreshing");
        self.refresh_session().await.map(Some)
      }
      _ => Ok(None),
    }
  }

  /// Exchange the current refresh token for a new session.
  pub async fn refresh_session(&self) -> Result<Session> {
    let refresh_token = self
      .current()
      .and_then(|s| s.refresh_token)
      .ok_or(Error::NoSession)?;

    let session = self
      .token_grant("refresh_token", &RefreshGrant {
        refresh_token: &refresh_token,
      })
      .await?;
    self.set_session(SessionEvent::TokenRefreshed, Some(session.clone()));
    Ok(session)
  }

  /// `POST /auth/v1/token?grant_type=<grant>`
  async fn token_grant<T: serde::Serialize>(&self, grant: &str, body: &T) -> Result<Session> {
    let resp = self
      .http
      .post(self.auth_url("/token"))
      .header("apikey", &self.config.anon_key)
      .query(&[("grant_type", grant)])
      .json(body)
      .send()
      .await?;

    let resp = auth_error_for_status(resp).await?;
    let bytes = resp.bytes().await?;
    let token: TokenResponse = serde_json::from_slice(&bytes)?;
    Ok(token.into_session(Utc::now()))
  }
}

/// Turn a non-2xx GoTrue response into [`Error::Auth`].
async fn auth_error_for_status(resp: Response) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let body = resp.text().await.unwrap_or_default();
  Err(Error::Auth {
    status:  status.as_u16(),
    message: ErrorBody::message_from(&body, status.canonical_reason().unwrap_or("auth error")),
  })
}

// ─── Collaborator traits ─────────────────────────────────────────────────────

impl AuthBackend for SupabaseClient {
  type Error = Error;

  async fn get_session(&self) -> Result<Option<Session>> { Ok(self.current()) }

  fn subscribe(&self) -> broadcast::Receiver<SessionChange> { self.events.subscribe() }

  async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
    let session = self
      .token_grant("password", &PasswordGrant { email, password })
      .await?;
    debug!(user_id = %session.id, "password sign-in accepted");
    self.set_session(SessionEvent::SignedIn, Some(session.clone()));
    Ok(session)
  }

  /// `POST /auth/v1/logout`. A session the server no longer knows counts as
  /// signed out.
  async fn sign_out(&self) -> Result<()> {
    if self.current().is_none() {
      self.set_session(SessionEvent::SignedOut, None);
      return Ok(());
    }

    let resp = self
      .authorize(self.http.post(self.auth_url("/logout")))
      .send()
      .await?;

    match resp.status() {
      StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
        warn!(status = %resp.status(), "session already gone on the server");
      }
      _ => {
        auth_error_for_status(resp).await?;
      }
    }

    self.set_session(SessionEvent::SignedOut, None);
    Ok(())
  }
}

impl ProfileSource for SupabaseClient {
  type Error = Error;

  /// `GET /rest/v1/employees?id=eq.<id>&select=name,is_manager`
  async fn fetch_profile(&self, subject_id: &str) -> Result<Option<ProfileRecord>> {
    let resp = self
      .authorize(self.http.get(self.rest_url(&format!("/{PROFILE_TABLE}"))))
      .query(&[
        ("id", format!("eq.{subject_id}")),
        ("select", "name,is_manager".to_string()),
      ])
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(Error::Rest {
        status:  status.as_u16(),
        message: ErrorBody::message_from(&body, status.canonical_reason().unwrap_or("rest error")),
      });
    }

    let bytes = resp.bytes().await?;
    let rows: Vec<ProfileRecord> = serde_json::from_slice(&bytes)?;
    Ok(rows.into_iter().next())
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
  };

  use super::*;

  fn token_body(access_token: &str) -> serde_json::Value {
    json!({
      "access_token": access_token,
      "refresh_token": "refresh-1",
      "token_type": "bearer",
      "expires_in": 3600,
      "user": {
        "id": "u1",
        "email": "sam@co.com",
        "created_at": "2024-03-01T12:00:00Z"
      }
    })
  }

  fn client(server: &MockServer) -> SupabaseClient {
    SupabaseClient::new(SupabaseConfig::new(server.uri(), "anon")).unwrap()
  }

  async fn signed_in(server: &MockServer) -> SupabaseClient {
    Mock::given(method("POST"))
      .and(path("/auth/v1/token"))
      .and(query_param("grant_type", "password"))
      .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1")))
      .mount(server)
      .await;
    let c = client(server);
    c.sign_in_with_password("sam@co.com", "secret").await.unwrap();
    c
  }

  #[tokio::test]
  async fn password_sign_in_stores_session_and_announces_it() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/auth/v1/token"))
      .and(query_param("grant_type", "password"))
      .and(header("apikey", "anon"))
      .and(body_json(json!({"email": "sam@co.com", "password": "secret"})))
      .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1")))
      .expect(1)
      .mount(&server)
      .await;

    let c = client(&server);
    let mut events = c.subscribe();
    let session = c.sign_in_with_password("sam@co.com", "secret").await.unwrap();

    assert_eq!(session.id, "u1");
    assert_eq!(session.access_token, "access-1");
    assert_eq!(c.get_session().await.unwrap(), Some(session.clone()));

    let change = events.try_recv().unwrap();
    assert_eq!(change.event, SessionEvent::SignedIn);
    assert_eq!(change.session, Some(session));
  }

  #[tokio::test]
  async fn rejected_credentials_surface_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/auth/v1/token"))
      .respond_with(ResponseTemplate::new(400).set_body_json(json!({
        "error": "invalid_grant",
        "error_description": "Invalid login credentials"
      })))
      .mount(&server)
      .await;

    let c = client(&server);
    let mut events = c.subscribe();
    let err = c.sign_in_with_password("sam@co.com", "wrong").await.unwrap_err();

    assert!(matches!(err, Error::Auth { status: 400, .. }));
    assert_eq!(err.to_string(), "Invalid login credentials");
    assert!(c.get_session().await.unwrap().is_none());
    assert!(events.try_recv().is_err());
  }

  #[tokio::test]
  async fn profile_lookup_sends_bearer_and_filters_by_id() {
    let server = MockServer::start().await;
    let c = signed_in(&server).await;

    Mock::given(method("GET"))
      .and(path("/rest/v1/employees"))
      .and(query_param("id", "eq.u1"))
      .and(query_param("select", "name,is_manager"))
      .and(header("authorization", "Bearer access-1"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(json!([{"name": "Samuel", "is_manager": true}])),
      )
      .mount(&server)
      .await;

    let record = c.fetch_profile("u1").await.unwrap();
    assert_eq!(record, Some(ProfileRecord::new("Samuel", true)));
  }

  #[tokio::test]
  async fn profile_lookup_with_no_rows_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/rest/v1/employees"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .mount(&server)
      .await;

    let c = client(&server);
    assert_eq!(c.fetch_profile("u9").await.unwrap(), None);
  }

  #[tokio::test]
  async fn profile_lookup_server_error_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/rest/v1/employees"))
      .respond_with(
        ResponseTemplate::new(500).set_body_json(json!({"message": "permission denied"})),
      )
      .mount(&server)
      .await;

    let c = client(&server);
    let err = c.fetch_profile("u1").await.unwrap_err();
    assert!(matches!(err, Error::Rest { status: 500, .. }));
    assert!(err.to_string().contains("permission denied"));
  }

  #[tokio::test]
  async fn sign_out_clears_session_after_server_confirms() {
    let server = MockServer::start().await;
    let c = signed_in(&server).await;
    Mock::given(method("POST"))
      .and(path("/auth/v1/logout"))
      .and(header("authorization", "Bearer access-1"))
      .respond_with(ResponseTemplate::new(204))
      .expect(1)
      .mount(&server)
      .await;

    let mut events = c.subscribe();
    c.sign_out().await.unwrap();
    assert!(c.get_session().await.unwrap().is_none());
    assert_eq!(events.try_recv().unwrap().event, SessionEvent::SignedOut);
  }

  #[tokio::test]
  async fn failed_sign_out_keeps_session() {
    let server = MockServer::start().await;
    let c = signed_in(&server).await;
    Mock::given(method("POST"))
      .and(path("/auth/v1/logout"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;

    let err = c.sign_out().await.unwrap_err();
    assert!(matches!(err, Error::Auth { status: 500, .. }));
    assert!(c.get_session().await.unwrap().is_some());
  }

  #[tokio::test]
  async fn expired_session_counts_as_signed_out() {
    let server = MockServer::start().await;
    let c = signed_in(&server).await;
    Mock::given(method("POST"))
      .and(path("/auth/v1/logout"))
      .respond_with(ResponseTemplate::new(401))
      .mount(&server)
      .await;

    c.sign_out().await.unwrap();
    assert!(c.get_session().await.unwrap().is_none());
  }

  #[tokio::test]
  async fn refresh_replaces_session_and_announces_it() {
    let server = MockServer::start().await;
    let c = signed_in(&server).await;
    Mock::given(method("POST"))
      .and(path("/auth/v1/token"))
      .and(query_param("grant_type", "refresh_token"))
      .and(body_json(json!({"refresh_token": "refresh-1"})))
      .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-2")))
      .mount(&server)
      .await;

    let mut events = c.subscribe();
    let session = c.refresh_session().await.unwrap();
    assert_eq!(session.access_token, "access-2");

    let change = events.try_recv().unwrap();
    assert_eq!(change.event, SessionEvent::TokenRefreshed);
  }

  #[tokio::test]
  async fn refresh_without_session_fails() {
    let server = MockServer::start().await;
    let c = client(&server);
    assert!(matches!(c.refresh_session().await, Err(Error::NoSession)));
  }

  #[tokio::test]
  async fn restored_session_is_announced_as_initial() {
    let server = MockServer::start().await;
    let c = client(&server);
    let mut events = c.subscribe();

    let session = Session {
      id:            "u1".into(),
      email:         Some("sam@co.com".into()),
      created_at:    Utc::now(),
      access_token:  "persisted".into(),
      refresh_token: None,
      expires_at:    None,
    };
    c.restore_session(session.clone());

    let change = events.try_recv().unwrap();
    assert_eq!(change.event, SessionEvent::InitialSession);
    assert_eq!(c.get_session().await.unwrap(), Some(session));
  }

  fn persisted(access_token: &str, expires_at: Option<chrono::DateTime<Utc>>) -> Session {
    Session {
      id: "u1".into(),
      email: Some("sam@co.com".into()),
      created_at: Utc::now(),
      access_token: access_token.into(),
      refresh_token: Some("refresh-1".into()),
      expires_at,
    }
  }

  #[tokio::test]
  async fn expiring_session_is_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/auth/v1/token"))
      .and(query_param("grant_type", "refresh_token"))
      .and(body_json(json!({"refresh_token": "refresh-1"})))
      .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-2")))
      .expect(1)
      .mount(&server)
      .await;
    let c = client(&server);
    c.restore_session(persisted("stale", Some(Utc::now() + chrono::Duration::seconds(5))));
    let mut events = c.subscribe();

    let refreshed = c
      .refresh_if_expiring(chrono::Duration::seconds(60))
      .await
      .unwrap();
    assert_eq!(refreshed.map(|s| s.access_token).as_deref(), Some("access-2"));
    assert_eq!(c.session().unwrap().access_token, "access-2");
    assert_eq!(events.try_recv().unwrap().event, SessionEvent::TokenRefreshed);
  }

  #[tokio::test]
  async fn fresh_session_is_left_alone() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/auth/v1/token"))
      .respond_with(ResponseTemplate::new(500))
      .expect(0)
      .mount(&server)
      .await;
    let c = client(&server);
    assert_eq!(c.refresh_if_expiring(chrono::Duration::seconds(60)).await.unwrap(), None);

    c.restore_session(persisted("fresh", Some(Utc::now() + chrono::Duration::hours(1))));
    assert_eq!(c.refresh_if_expiring(chrono::Duration::seconds(60)).await.unwrap(), None);
    assert_eq!(c.session().unwrap().access_token, "fresh");
  }
}
