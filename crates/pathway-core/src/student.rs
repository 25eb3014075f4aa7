//! The read contract for data owned by external collaborators.
//!
//! Students, pause intervals and practice events are written by the student
//! directory, the subscription flow and the practice recorder respectively.
//! The engine only ever reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Student ─────────────────────────────────────────────────────────────────

/// Billing state of a student's subscription.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubscriptionState {
  #[default]
  Active,
  Paused,
  Cancelled,
}

/// A learner as seen by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
  pub student_id:         Uuid,
  pub email:              String,
  /// `None` only when the directory holds a corrupt record; computation
  /// refuses to run without it.
  pub enrollment_at:      Option<DateTime<Utc>>,
  pub subscription_state: SubscriptionState,
}

impl Student {
  /// The enrollment instant, or [`Error::MissingEnrollmentDate`].
  pub fn enrollment(&self) -> Result<DateTime<Utc>> {
    self
      .enrollment_at
      .ok_or(Error::MissingEnrollmentDate(self.student_id))
  }
}

// ─── Pauses ──────────────────────────────────────────────────────────────────

/// A span during which progress is frozen. `end == None` means the pause is
/// still running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseInterval {
  pub pause_id:   Uuid,
  pub student_id: Uuid,
  pub start:      DateTime<Utc>,
  pub end:        Option<DateTime<Utc>>,
}

impl PauseInterval {
  /// Reject `end < start`. Corrupt rows are never repaired.
  pub fn validate(&self) -> Result<()> {
    match self.end {
      Some(end) if end < self.start => Err(Error::InvalidPauseInterval {
        student_id: self.student_id,
        start:      self.start,
        end,
      }),
      _ => Ok(()),
    }
  }
}

// ─── Practice ────────────────────────────────────────────────────────────────

/// One recorded practice. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeEvent {
  pub event_id:    Uuid,
  pub student_id:  Uuid,
  pub occurred_at: DateTime<Utc>,
  /// Free-form payload from the recorder (technique, duration, ...).
  #[serde(default)]
  pub metadata:    serde_json::Value,
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn at(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, d, 12, 0, 0).unwrap()
  }

  #[test]
  fn reversed_pause_is_rejected() {
    let p = PauseInterval {
      pause_id:   Uuid::new_v4(),
      student_id: Uuid::new_v4(),
      start:      at(10),
      end:        Some(at(5)),
    };
    assert!(matches!(p.validate(), Err(Error::InvalidPauseInterval { .. })));
  }

  #[test]
  fn open_and_zero_length_pauses_are_valid() {
    let mut p = PauseInterval {
      pause_id:   Uuid::new_v4(),
      student_id: Uuid::new_v4(),
      start:      at(10),
      end:        None,
    };
    assert!(p.validate().is_ok());
    p.end = Some(at(10));
    assert!(p.validate().is_ok());
  }

  #[test]
  fn missing_enrollment_carries_student_id() {
    let s = Student {
      student_id:         Uuid::new_v4(),
      email:              "ana@example.com".into(),
      enrollment_at:      None,
      subscription_state: SubscriptionState::Active,
    };
    let err = s.enrollment().unwrap_err();
    assert_eq!(err.student_id(), Some(s.student_id));
  }

  #[test]
  fn subscription_state_text_form() {
    assert_eq!(SubscriptionState::Paused.to_string(), "paused");
    assert_eq!(
      "cancelled".parse::<SubscriptionState>().unwrap(),
      SubscriptionState::Cancelled
    );
  }
}
