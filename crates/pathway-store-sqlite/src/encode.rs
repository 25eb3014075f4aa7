//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with microsecond precision
//! and a `Z` suffix. UUIDs are stored as hyphenated lowercase strings. Enum
//! columns use the `strum` textual form.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use pathway_core::{
  overrides::{LevelOverride, OverrideKind},
  progress::ProgressSnapshot,
  student::{PauseInterval, PracticeEvent, Student, SubscriptionState},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// `dt` reduced to the microsecond precision the columns keep.
pub fn stored(dt: DateTime<Utc>) -> DateTime<Utc> { dt.trunc_subsecs(6) }

/// The current instant at the precision the columns keep.
pub fn now() -> DateTime<Utc> { stored(Utc::now()) }

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_subscription_state(s: &str) -> Result<SubscriptionState> {
  s.parse().map_err(|_| Error::UnknownValue {
    column: "subscription_state",
    value:  s.to_owned(),
  })
}

pub fn decode_override_kind(s: &str) -> Result<OverrideKind> {
  s.parse()
    .map_err(|_| Error::UnknownValue { column: "kind", value: s.to_owned() })
}

// ─── Integers ────────────────────────────────────────────────────────────────

fn decode_int<T: TryFrom<i64>>(column: &'static str, value: i64) -> Result<T> {
  T::try_from(value).map_err(|_| Error::OutOfRange { column, value })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `students` row.
pub struct RawStudent {
  pub student_id:         String,
  pub email:              String,
  pub enrollment_at:      Option<String>,
  pub subscription_state: String,
}

impl RawStudent {
  pub const COLUMNS: &'static str =
    "student_id, email, enrollment_at, subscription_state";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      student_id:         row.get(0)?,
      email:              row.get(1)?,
      enrollment_at:      row.get(2)?,
      subscription_state: row.get(3)?,
    })
  }

  pub fn into_student(self) -> Result<Student> {
    Ok(Student {
      student_id:         decode_uuid(&self.student_id)?,
      email:              self.email,
      enrollment_at:      self.enrollment_at.as_deref().map(decode_dt).transpose()?,
      subscription_state: decode_subscription_state(&self.subscription_state)?,
    })
  }
}

pub struct RawPause {
  pub pause_id:   String,
  pub student_id: String,
  pub started_at: String,
  pub ended_at:   Option<String>,
}

impl RawPause {
  pub const COLUMNS: &'static str = "pause_id, student_id, started_at, ended_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      pause_id:   row.get(0)?,
      student_id: row.get(1)?,
      started_at: row.get(2)?,
      ended_at:   row.get(3)?,
    })
  }

  pub fn into_pause(self) -> Result<PauseInterval> {
    Ok(PauseInterval {
      pause_id:   decode_uuid(&self.pause_id)?,
      student_id: decode_uuid(&self.student_id)?,
      start:      decode_dt(&self.started_at)?,
      end:        self.ended_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

pub struct RawPractice {
  pub event_id:    String,
  pub student_id:  String,
  pub occurred_at: String,
  pub metadata:    String,
}

impl RawPractice {
  pub const COLUMNS: &'static str = "event_id, student_id, occurred_at, metadata";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event_id:    row.get(0)?,
      student_id:  row.get(1)?,
      occurred_at: row.get(2)?,
      metadata:    row.get(3)?,
    })
  }

  pub fn into_practice(self) -> Result<PracticeEvent> {
    Ok(PracticeEvent {
      event_id:    decode_uuid(&self.event_id)?,
      student_id:  decode_uuid(&self.student_id)?,
      occurred_at: decode_dt(&self.occurred_at)?,
      metadata:    serde_json::from_str(&self.metadata)?,
    })
  }
}

/// Raw values read directly from a `level_overrides` row.
pub struct RawOverride {
  pub override_id: String,
  pub student_id:  String,
  pub kind:        String,
  pub value:       i64,
  pub reason:      String,
  pub created_at:  String,
  pub created_by:  String,
  pub revoked_at:  Option<String>,
  pub revoked_by:  Option<String>,
}

impl RawOverride {
  pub const COLUMNS: &'static str = "override_id, student_id, kind, value, reason, \
                                     created_at, created_by, revoked_at, revoked_by";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      override_id: row.get(0)?,
      student_id:  row.get(1)?,
      kind:        row.get(2)?,
      value:       row.get(3)?,
      reason:      row.get(4)?,
      created_at:  row.get(5)?,
      created_by:  row.get(6)?,
      revoked_at:  row.get(7)?,
      revoked_by:  row.get(8)?,
    })
  }

  pub fn into_override(self) -> Result<LevelOverride> {
    Ok(LevelOverride {
      override_id: decode_uuid(&self.override_id)?,
      student_id:  decode_uuid(&self.student_id)?,
      kind:        decode_override_kind(&self.kind)?,
      value:       decode_int("value", self.value)?,
      reason:      self.reason,
      created_at:  decode_dt(&self.created_at)?,
      created_by:  self.created_by,
      revoked_at:  self.revoked_at.as_deref().map(decode_dt).transpose()?,
      revoked_by:  self.revoked_by,
    })
  }
}

pub struct RawSnapshot {
  pub snapshot_id:     String,
  pub student_id:      String,
  pub snapshot_at:     String,
  pub base_level:      i64,
  pub effective_level: i64,
  pub phase_id:        String,
  pub active_days:     i64,
  pub paused_days:     i64,
}

impl RawSnapshot {
  pub const COLUMNS: &'static str = "snapshot_id, student_id, snapshot_at, base_level, \
                                     effective_level, phase_id, active_days, paused_days";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      snapshot_id:     row.get(0)?,
      student_id:      row.get(1)?,
      snapshot_at:     row.get(2)?,
      base_level:      row.get(3)?,
      effective_level: row.get(4)?,
      phase_id:        row.get(5)?,
      active_days:     row.get(6)?,
      paused_days:     row.get(7)?,
    })
  }

  pub fn into_snapshot(self) -> Result<ProgressSnapshot> {
    Ok(ProgressSnapshot {
      snapshot_id:     decode_uuid(&self.snapshot_id)?,
      student_id:      decode_uuid(&self.student_id)?,
      snapshot_at:     decode_dt(&self.snapshot_at)?,
      base_level:      decode_int("base_level", self.base_level)?,
      effective_level: decode_int("effective_level", self.effective_level)?,
      phase_id:        self.phase_id,
      active_days:     decode_int("active_days", self.active_days)?,
      paused_days:     decode_int("paused_days", self.paused_days)?,
    })
  }
}
