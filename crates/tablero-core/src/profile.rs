//! Profile records: the `employees` row that enriches a session.

use serde::{Deserialize, Serialize};

/// The secondary application data kept for an authenticated subject.
///
/// Both columns are nullable in the backing table, so neither is assumed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
  #[serde(default)]
  pub name:       Option<String>,
  #[serde(default)]
  pub is_manager: Option<bool>,
}

impl ProfileRecord {
  pub fn new(name: impl Into<String>, is_manager: bool) -> Self {
    Self {
      name:       Some(name.into()),
      is_manager: Some(is_manager),
    }
  }

  /// The stored display name, if it is non-empty.
  pub fn display_name(&self) -> Option<&str> {
    self.name.as_deref().filter(|n| !n.trim().is_empty())
  }
}
