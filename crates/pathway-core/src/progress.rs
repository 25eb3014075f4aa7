//! Computed progress: the live read model and its frozen audit counterpart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  active_days::DayCount,
  config::Curriculum,
  overrides::{LevelOverride, LevelResolution},
  phase::Phase,
  streak::StreakStatus,
};

// ─── Live read model ─────────────────────────────────────────────────────────

/// Everything a presentation layer needs about a student as of `as_of`.
/// Never stored; see [`ProgressSnapshot`] for the persisted form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
  pub student_id:        Uuid,
  pub as_of:             DateTime<Utc>,
  pub base_level:        u8,
  pub effective_level:   u8,
  pub level_name:        String,
  pub phase:             Phase,
  pub active_days:       u32,
  pub paused_days:       u32,
  pub current_streak:    u32,
  pub streak:            StreakStatus,
  /// Active overrides that shaped `effective_level`.
  pub applied_overrides: Vec<LevelOverride>,
}

/// Level and phase without the streak; shared by reports and snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LevelState {
  pub days:       DayCount,
  pub resolution: LevelResolution,
  pub phase:      Phase,
}

impl LevelState {
  pub(crate) fn compute(
    curriculum: &Curriculum,
    days: DayCount,
    overrides: &[LevelOverride],
  ) -> Self {
    let resolution =
      crate::overrides::resolve_level(&curriculum.thresholds, days.active_days, overrides);
    let phase = curriculum.phases.resolve(resolution.effective_level);
    Self { days, resolution, phase }
  }
}

// ─── Snapshots ───────────────────────────────────────────────────────────────

/// An immutable audit row. Written once, never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
  pub snapshot_id:     Uuid,
  pub student_id:      Uuid,
  pub snapshot_at:     DateTime<Utc>,
  pub base_level:      u8,
  pub effective_level: u8,
  pub phase_id:        String,
  pub active_days:     u32,
  pub paused_days:     u32,
}

/// Outcome of snapshotting every student in one pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
  pub total:    usize,
  pub written:  usize,
  pub failures: Vec<BatchFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
  pub student_id: Uuid,
  pub error:      String,
}

impl BatchSummary {
  pub fn failed(&self) -> usize { self.failures.len() }
}
