//! Supabase adapter for Tablero.
//!
//! [`SupabaseClient`] talks to the GoTrue auth API and the PostgREST data API
//! of a Supabase project and implements the collaborator traits of
//! `tablero-core`. It keeps the current session in memory and announces every
//! change on a broadcast channel.

mod client;
mod wire;

pub mod error;

pub use client::{SupabaseClient, SupabaseConfig};
pub use error::{Error, Result};
