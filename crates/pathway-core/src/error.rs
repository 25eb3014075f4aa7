//! Error types for `pathway-core`.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("student not found: {0}")]
  StudentNotFound(Uuid),

  #[error("student {0} has no enrollment date")]
  MissingEnrollmentDate(Uuid),

  #[error("pause interval for student {student_id} ends before it starts ({start} > {end})")]
  InvalidPauseInterval {
    student_id: Uuid,
    start:      DateTime<Utc>,
    end:        DateTime<Utc>,
  },

  #[error("invalid override type {given:?} for student {student_id}; expected ADD, SET or MIN")]
  InvalidOverrideType { student_id: Uuid, given: String },

  #[error("override value {value} for student {student_id} is outside 1..=15")]
  InvalidOverrideValue { student_id: Uuid, value: i64 },

  #[error("override for student {0} has no reason")]
  MissingReason(Uuid),

  #[error("override not found: {0}")]
  OverrideNotFound(Uuid),

  #[error("invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("store error: {source}")]
  Store {
    /// The student being read or written, when the call concerned one.
    student_id: Option<Uuid>,
    #[source]
    source:     Box<dyn std::error::Error + Send + Sync>,
  },
}

impl Error {
  /// Wrap a backend failure that concerns no particular student.
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store { student_id: None, source: Box::new(e) }
  }

  /// Wrap a backend failure while working on `student_id`; for `map_err`.
  pub fn store_for<E>(student_id: Uuid) -> impl FnOnce(E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    move |e| Self::Store { student_id: Some(student_id), source: Box::new(e) }
  }

  /// The student the failure concerns, when the variant carries one.
  pub fn student_id(&self) -> Option<Uuid> {
    match self {
      Self::StudentNotFound(id)
      | Self::MissingEnrollmentDate(id)
      | Self::MissingReason(id) => Some(*id),
      Self::InvalidPauseInterval { student_id, .. }
      | Self::InvalidOverrideType { student_id, .. }
      | Self::InvalidOverrideValue { student_id, .. } => Some(*student_id),
      Self::Store { student_id, .. } => *student_id,
      Self::OverrideNotFound(_) | Self::InvalidConfig(_) => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Error)]
  #[error("disk on fire")]
  struct Backend;

  #[test]
  fn store_failure_keeps_student_id() {
    let id = Uuid::new_v4();
    let err = Error::store_for(id)(Backend);
    assert_eq!(err.student_id(), Some(id));
    assert_eq!(err.to_string(), "store error: disk on fire");
    assert!(std::error::Error::source(&err).is_some());
  }

  #[test]
  fn store_failure_without_student() {
    assert_eq!(Error::store(Backend).student_id(), None);
  }
}
