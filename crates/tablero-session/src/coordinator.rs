//! Bridges the auth collaborator's event stream to
//! the published [`AuthState`].

use std::{
  fmt,
  sync::{Arc, Mutex, PoisonError},
};

use tablero_core::{
  backend::{AuthBackend, ProfileSource},
  session::{Session, SessionChange, SessionEvent},
  user::{AuthState, User},
};
use tokio::{
  sync::{broadcast, watch},
  task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
  AuthStateStore, Error, Generation, IdentityResolver, Resolved, Result, SessionConfig,
};

// ─── Credentials ─────────────────────────────────────────────────────────────

/// Email/password pair for [`SessionCoordinator::login`].
#[derive(Clone)]
pub struct Credentials {
  pub email:    String,
  pub password: String,
}

impl Credentials {
  pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
    Self {
      email:    email.into(),
      password: password.into(),
    }
  }

  fn check(&self) -> Result<()> {
    if self.email.trim().is_empty() || self.password.is_empty() {
      return Err(Error::MissingCredentials);
    }
    Ok(())
  }
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials")
      .field("email", &self.email)
      .field("password", &"<redacted>")
      .finish()
  }
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

/// Keeps an [`AuthStateStore`] in step with the collaborator's sessions.
///
/// Dropping the coordinator (or calling [`shutdown`](Self::shutdown)) stops
/// the event listener and closes the store.
pub struct SessionCoordinator<B, P>
where
  B: AuthBackend + 'static,
  P: ProfileSource + 'static,
{
  inner:    Arc<Inner<B, P>>,
  listener: Mutex<Option<JoinHandle<()>>>,
}

struct Inner<B, P> {
  backend:  Arc<B>,
  resolver: IdentityResolver<P>,
  store:    Arc<AuthStateStore>,
  config:   SessionConfig,
  /// The session most recently established by `login`.
  adopted:  Mutex<Option<Session>>,
}

impl<B, P> SessionCoordinator<B, P>
where
  B: AuthBackend + 'static,
  P: ProfileSource + 'static,
{
  /// Subscribe to `backend` and start restoring any existing session.
  ///
  /// Must be called from within a tokio runtime.
  pub fn start(
    backend: Arc<B>,
    profiles: Arc<P>,
    store: Arc<AuthStateStore>,
    config: SessionConfig,
  ) -> Self {
    // Subscribe before reading the session so no change slips in between.
    let events = backend.subscribe();

    let inner = Arc::new(Inner {
      backend,
      resolver: IdentityResolver::new(profiles),
      store,
      config,
      adopted: Mutex::new(None),
    });

    inner.restore();
    let listener = tokio::spawn(Arc::clone(&inner).listen(events));

    Self {
      inner,
      listener: Mutex::new(Some(listener)),
    }
  }

  /// A snapshot of the published state.
  pub fn state(&self) -> AuthState { self.inner.store.current() }

  /// Receive every subsequent state change.
  pub fn subscribe(&self) -> watch::Receiver<AuthState> { self.inner.store.subscribe() }

  pub fn store(&self) -> &Arc<AuthStateStore> { &self.inner.store }

  /// Sign in with `credentials` and publish the resolved user before
  /// returning it.
  ///
  /// On failure the error message is published, the current user is kept
  /// and the error is returned.
  pub async fn login(&self, credentials: &Credentials) -> Result<User> {
    let inner = &self.inner;
    inner.store.update(|s| s.error = None);

    if let Err(e) = credentials.check() {
      inner.report(&e);
      return Err(e);
    }

    let session = match inner
      .backend
      .sign_in_with_password(&credentials.email, &credentials.password)
      .await
    {
      Ok(session) => session,
      Err(e) => {
        let e = Error::SignIn(Box::new(e));
        warn!(email = %credentials.email, error = %e, "sign-in rejected");
        inner.report(&e);
        return Err(e);
      }
    };

    inner.adopt(&session);
    let generation = inner.store.begin();

    let resolved = inner
      .resolver
      .resolve_session(&session, inner.config.restore_timeout())
      .await;

    match resolved {
      Ok(Resolved { user, .. }) => {
        let published = inner.store.publish(generation, |s| {
          s.user = Some(user.clone());
          s.error = None;
        });
        if !published {
          debug!(generation = generation.get(), "login result superseded by a newer event");
        }
        info!(user_id = %user.id, is_manager = user.is_manager, "signed in");
        Ok(user)
      }
      Err(e) => {
        inner.store.publish(generation, |s| s.error = Some(e.to_string()));
        Err(e)
      }
    }
  }

  /// Sign out. The local user is cleared only once the collaborator has
  /// confirmed; on failure it is kept and the error is published.
  pub async fn logout(&self) -> Result<()> {
    let inner = &self.inner;
    inner.store.update(|s| s.error = None);

    if let Err(e) = inner.backend.sign_out().await {
      let e = Error::SignOut(Box::new(e));
      warn!(error = %e, "sign-out failed; keeping local session");
      inner.report(&e);
      return Err(e);
    }

    inner.forget_adopted();
    let generation = inner.store.begin();
    inner.store.publish(generation, |s| s.user = None);
    info!("signed out");
    Ok(())
  }

  /// Stop listening and close the store. Idempotent.
  pub fn shutdown(&self) {
    let listener = self
      .listener
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
    if let Some(listener) = listener {
      listener.abort();
      debug!("session listener stopped");
    }
    self.inner.store.close();
  }
}

impl<B, P> Drop for SessionCoordinator<B, P>
where
  B: AuthBackend + 'static,
  P: ProfileSource + 'static,
{
  fn drop(&mut self) { self.shutdown(); }
}

// ─── Event handling ──────────────────────────────────────────────────────────

impl<B, P> Inner<B, P>
where
  B: AuthBackend + 'static,
  P: ProfileSource + 'static,
{
  async fn listen(self: Arc<Self>, mut events: broadcast::Receiver<SessionChange>) {
    loop {
      match events.recv().await {
        Ok(change) => self.dispatch(change),
        Err(broadcast::error::RecvError::Lagged(missed)) => {
          warn!(missed, "session events dropped; re-reading current session");
          self.restore();
        }
        Err(broadcast::error::RecvError::Closed) => {
          debug!("session event source closed");
          break;
        }
      }
    }
  }

  /// Register `change` and resolve it in the background.
  fn dispatch(self: &Arc<Self>, change: SessionChange) {
    if change.event == SessionEvent::SignedIn && self.is_adopted(change.session.as_ref()) {
      debug!("sign-in event for the session established by login; ignoring");
      return;
    }

    let generation = self.store.begin();
    debug!(event = ?change.event, generation = generation.get(), "session change");

    let inner = Arc::clone(self);
    tokio::spawn(async move { inner.settle(generation, change).await });
  }

  /// Run the initial-restore path under a fresh generation.
  fn restore(self: &Arc<Self>) {
    let generation = self.store.begin();
    let inner = Arc::clone(self);
    tokio::spawn(async move {
      match inner.backend.get_session().await {
        Ok(session) => {
          let change = SessionChange::new(SessionEvent::InitialSession, session);
          inner.settle(generation, change).await;
        }
        Err(e) => {
          warn!(error = %e, "could not read current session");
          inner.store.publish(generation, |s| s.user = None);
        }
      }
    });
  }

  async fn settle(&self, generation: Generation, change: SessionChange) {
    let SessionChange { event, session } = change;
    let session = match event {
      SessionEvent::SignedOut => None,
      _ => session,
    };

    let timeout = self.config.timeout_for(event);
    let resolved = self.resolver.resolve_detailed(session.as_ref(), timeout).await;

    match resolved {
      Ok(None) => {
        self.publish_user(generation, None);
      }
      Ok(Some(Resolved { user, lookup }))
        if event == SessionEvent::SignedIn && lookup.is_unavailable() =>
      {
        debug!(
          generation = generation.get(),
          "holding degraded sign-in identity for a follow-up event"
        );
        tokio::time::sleep(self.config.sign_in_grace()).await;
        if self.publish_user(generation, Some(user)) {
          info!("no follow-up session event; published degraded identity");
        }
      }
      Ok(Some(Resolved { user, .. })) => {
        self.publish_user(generation, Some(user));
      }
      Err(e) => {
        warn!(event = ?event, error = %e, "malformed session; keeping previous user");
        self.store.publish(generation, |s| s.error = Some(e.to_string()));
      }
    }
  }

  fn publish_user(&self, generation: Generation, user: Option<User>) -> bool {
    let published = self.store.publish(generation, |s| {
      s.user = user;
      s.error = None;
    });
    if !published {
      debug!(generation = generation.get(), "discarding stale resolution");
    }
    published
  }

  fn report(&self, e: &Error) { self.store.update(|s| s.error = Some(e.to_string())); }

  fn adopt(&self, session: &Session) {
    *self.adopted.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
  }

  fn forget_adopted(&self) { *self.adopted.lock().unwrap_or_else(PoisonError::into_inner) = None; }

  fn is_adopted(&self, session: Option<&Session>) -> bool {
    let adopted = self.adopted.lock().unwrap_or_else(PoisonError::into_inner);
    match (adopted.as_ref(), session) {
      (Some(adopted), Some(session)) => adopted.same_issue(session),
      _ => false,
    }
  }
}
