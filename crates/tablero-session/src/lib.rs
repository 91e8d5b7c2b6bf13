//! Session and identity resolution for Tablero.
//!
//! [`SessionCoordinator`] listens to the auth collaborator's session-change
//! events, resolves each session into a [`User`](tablero_core::user::User)
//! through the [`IdentityResolver`], and publishes the result into an
//! [`AuthStateStore`]. Results for superseded events are discarded.

mod config;
mod coordinator;
mod resolver;
mod state;

pub mod error;

pub use config::SessionConfig;
pub use coordinator::{Credentials, SessionCoordinator};
pub use error::{Error, Result};
pub use resolver::{IdentityResolver, LookupOutcome, Resolved};
pub use state::{AuthStateStore, Generation};
