//! Error type for `tablero-supabase`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// GoTrue rejected the request; `message` is the server's explanation.
  #[error("{message}")]
  Auth { status: u16, message: String },

  #[error("rest error ({status}): {message}")]
  Rest { status: u16, message: String },

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("no active session")]
  NoSession,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
