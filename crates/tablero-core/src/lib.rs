//! Core types and trait definitions for the Tablero dashboard.
//!
//! This crate holds the identity data model, the interfaces of the external
//! authentication-and-storage collaborator, and the review-status table. It
//! performs no I/O; `tablero-session` drives it and `tablero-supabase`
//! implements its collaborator traits.

pub mod backend;
pub mod error;
pub mod profile;
pub mod review;
pub mod session;
pub mod user;

pub use error::{Error, Result};
