//! The session file that carries a sign-in across `tablero` invocations.

use std::{io::ErrorKind, path::Path};

use anyhow::{Context as _, Result};
use tablero_core::session::Session;

/// Read the persisted session. A missing file means signed out.
pub async fn load(path: &Path) -> Result<Option<Session>> {
  let bytes = match tokio::fs::read(path).await {
    Ok(bytes) => bytes,
    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
  };
  let session = serde_json::from_slice(&bytes)
    .with_context(|| format!("failed to parse session file {}", path.display()))?;
  Ok(Some(session))
}

/// Write `session` to `path`, or remove the file when there is none.
pub async fn save(path: &Path, session: Option<&Session>) -> Result<()> {
  match session {
    Some(session) => {
      let json = serde_json::to_vec_pretty(session).context("serialising session")?;
      tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
    }
    None => match tokio::fs::remove_file(path).await {
      Err(e) if e.kind() != ErrorKind::NotFound => {
        Err(e).with_context(|| format!("failed to remove {}", path.display()))
      }
      _ => Ok(()),
    },
  }
}
