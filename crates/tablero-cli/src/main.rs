//! `tablero`: command-line front end for the Tablero session core.
//!
//! # Usage
//!
//! ```text
//! tablero login --email sam@co.com --password secret
//! tablero whoami
//! tablero --config ~/.config/tablero.toml login --email sam@co.com --logout
//! tablero status 2
//! ```

mod persist;
mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use settings::Settings;
use tablero_core::review::status_for;
use tablero_session::{AuthStateStore, Credentials, SessionCoordinator};
use tablero_supabase::SupabaseClient;
use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

/// A persisted session this close to expiry is refreshed on start.
const REFRESH_MARGIN_SECS: i64 = 60;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tablero", version, about = "Tablero session tools")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "tablero.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Sign in and print the resulting auth state as JSON.
  Login {
    #[arg(long, env = "TABLERO_EMAIL")]
    email: String,

    /// Password (plaintext).
    #[arg(long, env = "TABLERO_PASSWORD", hide_env_values = true)]
    password: String,

    /// Sign out again before exiting.
    #[arg(long)]
    logout: bool,
  },

  /// Restore the saved session and print the resulting auth state as JSON.
  Whoami,

  /// Print the display status for a review status code (omit for none).
  Status {
    #[arg(allow_negative_numbers = true)]
    code: Option<i64>,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  match cli.command {
    Command::Login {
      email,
      password,
      logout,
    } => {
      let settings = settings::load(&cli.config)?;
      login(&settings, Credentials::new(email, password), logout).await
    }
    Command::Whoami => whoami(&settings::load(&cli.config)?).await,
    Command::Status { code } => {
      let status = status_for(code);
      println!(
        "{} [{}] {}",
        status.name,
        status.color.as_str(),
        status.description
      );
      Ok(())
    }
  }
}

/// Build the client and seed it with the session saved by a previous run,
/// refreshing it first when the access token is about to expire.
async fn connect(settings: &Settings) -> Result<Arc<SupabaseClient>> {
  let client = SupabaseClient::new(settings.supabase.clone())
    .context("failed to build Supabase client")?;

  if let Some(session) = persist::load(&settings.session_file).await? {
    client.restore_session(session);
    let margin = chrono::Duration::seconds(REFRESH_MARGIN_SECS);
    if let Err(e) = client.refresh_if_expiring(margin).await {
      warn!(error = %e, "could not refresh saved session");
    }
  }

  Ok(Arc::new(client))
}

fn start(
  settings: &Settings,
  client: &Arc<SupabaseClient>,
) -> SessionCoordinator<SupabaseClient, SupabaseClient> {
  SessionCoordinator::start(
    Arc::clone(client),
    Arc::clone(client),
    Arc::new(AuthStateStore::new()),
    settings.session.clone(),
  )
}

fn print_state(coordinator: &SessionCoordinator<SupabaseClient, SupabaseClient>) -> Result<()> {
  println!(
    "{}",
    serde_json::to_string_pretty(&coordinator.state()).context("serialising auth state")?
  );
  Ok(())
}

async fn login(settings: &Settings, credentials: Credentials, logout: bool) -> Result<()> {
  let client = connect(settings).await?;
  let coordinator = start(settings, &client);

  let user = coordinator
    .login(&credentials)
    .await
    .context("sign-in failed")?;
  tracing::info!(name = %user.name, is_manager = user.is_manager, "resolved identity");
  print_state(&coordinator)?;

  if logout {
    coordinator.logout().await.context("sign-out failed")?;
  }

  coordinator.shutdown();
  persist::save(&settings.session_file, client.session().as_ref()).await
}

async fn whoami(settings: &Settings) -> Result<()> {
  let client = connect(settings).await?;
  let coordinator = start(settings, &client);

  coordinator
    .subscribe()
    .wait_for(|state| !state.loading)
    .await
    .context("session coordinator stopped")?;
  print_state(&coordinator)?;

  coordinator.shutdown();
  persist::save(&settings.session_file, client.session().as_ref()).await
}
