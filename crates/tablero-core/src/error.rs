//! Error types for `tablero-core`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  /// The session payload lacks a field every [`User`](crate::user::User)
  /// must mirror.
  #[error("invalid session: missing {0}")]
  InvalidSession(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
