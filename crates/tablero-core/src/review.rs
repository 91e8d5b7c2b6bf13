//! Review status lookup.
//!
//! Reviews carry a nullable `id_status` column. A missing code means the
//! review has not been held yet; a code the table does not know is shown as
//! unknown. Both render gray but with different labels.

use serde::Serialize;

/// Badge colour for a review status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
  Green,
  Red,
  Amber,
  Gray,
}

impl StatusColor {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Green => "green",
      Self::Red => "red",
      Self::Amber => "amber",
      Self::Gray => "gray",
    }
  }
}

/// Display data for a review status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewStatus {
  pub name:        &'static str,
  pub color:       StatusColor,
  pub description: &'static str,
}

/// Status of a review with no code yet.
pub static PENDING: ReviewStatus = ReviewStatus {
  name:        "En Espera",
  color:       StatusColor::Gray,
  description: "La revisión aún no tiene un resultado registrado",
};

/// Status of a review whose code is not in [`STATUSES`].
pub static UNKNOWN: ReviewStatus = ReviewStatus {
  name:        "Desconocido",
  color:       StatusColor::Gray,
  description: "El código de estado no corresponde a ningún estado conocido",
};

/// Known statuses; entry `i` is code `i + 1`.
pub static STATUSES: [ReviewStatus; 5] = [
  ReviewStatus {
    name:        "Aprobada",
    color:       StatusColor::Green,
    description: "El producto fue aceptado sin cambios",
  },
  ReviewStatus {
    name:        "Rechazada",
    color:       StatusColor::Red,
    description: "El producto debe rehacerse y revisarse de nuevo",
  },
  ReviewStatus {
    name:        "Aprobada con observaciones",
    color:       StatusColor::Amber,
    description: "El producto se acepta tras corregir los defectos menores",
  },
  ReviewStatus {
    name:        "Pospuesta",
    color:       StatusColor::Amber,
    description: "La revisión se reprogramó para otra fecha",
  },
  ReviewStatus {
    name:        "Cancelada",
    color:       StatusColor::Gray,
    description: "La revisión no se llevará a cabo",
  },
];

/// Look up the display status for a review's `id_status`. Never panics.
pub fn status_for(code: Option<i64>) -> &'static ReviewStatus {
  let Some(code) = code else {
    return &PENDING;
  };
  usize::try_from(code)
    .ok()
    .and_then(|c| c.checked_sub(1))
    .and_then(|i| STATUSES.get(i))
    .unwrap_or(&UNKNOWN)
}

impl ReviewStatus {
  /// Whether this is the status shown for a missing code.
  pub fn is_pending(&self) -> bool { std::ptr::eq(self, &PENDING) }

  /// Whether this is the status shown for an unmapped code.
  pub fn is_unknown(&self) -> bool { std::ptr::eq(self, &UNKNOWN) }
}
