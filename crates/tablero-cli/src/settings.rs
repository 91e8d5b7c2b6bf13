//! Runtime settings, read from `tablero.toml` and `TABLERO_*` variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use config::Environment;
use serde::Deserialize;
use tablero_session::SessionConfig;
use tablero_supabase::SupabaseConfig;

/// Everything the session commands need to reach the backend.
#[derive(Debug, Deserialize)]
pub struct Settings {
  pub supabase:     SupabaseConfig,
  #[serde(default)]
  pub session:      SessionConfig,
  /// Where the signed-in session is kept between runs.
  #[serde(default = "default_session_file")]
  pub session_file: PathBuf,
}

fn default_session_file() -> PathBuf { PathBuf::from(".tablero-session.json") }

/// Layer the optional config file under the environment, e.g.
/// `TABLERO_SUPABASE__URL` overrides `[supabase] url`.
pub fn load(path: &Path) -> anyhow::Result<Settings> { load_from(path, environment()) }

fn environment() -> Environment {
  Environment::with_prefix("TABLERO")
    .prefix_separator("_")
    .separator("__")
    .try_parsing(true)
}

fn load_from(path: &Path, env: Environment) -> anyhow::Result<Settings> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(env)
    .build()
    .context("failed to read config file")?;

  settings
    .try_deserialize()
    .context("failed to deserialise settings (is [supabase] url/anon_key set?)")
}
