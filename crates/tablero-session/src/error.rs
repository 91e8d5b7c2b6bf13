//! Error type for `tablero-session`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Session(#[from] tablero_core::Error),

  #[error("email and password are required")]
  MissingCredentials,

  /// The collaborator rejected the credentials or could not be reached.
  #[error("{0}")]
  SignIn(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("{0}")]
  SignOut(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
