//! Timing budgets for session resolution.

use std::time::Duration;

use serde::Deserialize;
use tablero_core::session::SessionEvent;

/// Tunable timeouts, deserialised from the `[session]` config table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
  /// Profile lookup budget for `SIGNED_IN` events. Kept short because a
  /// follow-up event usually corrects a degraded result.
  pub sign_in_timeout_ms: u64,
  /// Profile lookup budget for every other event and for `login`.
  pub restore_timeout_ms: u64,
  /// How long a degraded `SIGNED_IN` identity is withheld waiting for a
  /// follow-up event before it is published anyway.
  pub sign_in_grace_ms:   u64,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      sign_in_timeout_ms: 2_000,
      restore_timeout_ms: 5_000,
      sign_in_grace_ms:   3_000,
    }
  }
}

impl SessionConfig {
  pub fn restore_timeout(&self) -> Duration { Duration::from_millis(self.restore_timeout_ms) }

  pub fn sign_in_grace(&self) -> Duration { Duration::from_millis(self.sign_in_grace_ms) }

  /// The lookup budget for a resolution triggered by `event`.
  pub fn timeout_for(&self, event: SessionEvent) -> Duration {
    match event {
      SessionEvent::SignedIn => Duration::from_millis(self.sign_in_timeout_ms),
      _ => self.restore_timeout(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sign_in_uses_short_budget() {
    let config = SessionConfig::default();
    assert_eq!(config.timeout_for(SessionEvent::SignedIn), Duration::from_secs(2));
    for event in [
      SessionEvent::InitialSession,
      SessionEvent::TokenRefreshed,
      SessionEvent::SignedOut,
      SessionEvent::UserUpdated,
    ] {
      assert_eq!(config.timeout_for(event), Duration::from_secs(5));
    }
  }
}
