//! Engine configuration.
//!
//! [`EngineConfig`] is the raw, deserialisable shape (TOML file, env vars);
//! [`Curriculum`] is the validated form the engine runs on.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  phase::{PhaseRange, PhaseTable, default_phases},
  streak::DEFAULT_MILESTONES,
  thresholds::{Threshold, ThresholdTable, default_thresholds},
};

/// One hour east of UTC (Madrid standard time).
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 60;

const DEFAULT_TIMEZONE: FixedOffset =
  match FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60) {
    Some(tz) => tz,
    None => panic!("default offset out of range"),
  };

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub thresholds:         Vec<Threshold>,
  pub phases:             Vec<PhaseRange>,
  /// Offset used to cut practice days for streaks.
  pub utc_offset_minutes: i32,
  pub milestones:         Vec<u32>,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      thresholds:         default_thresholds(),
      phases:             default_phases(),
      utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
      milestones:         DEFAULT_MILESTONES.to_vec(),
    }
  }
}

impl EngineConfig {
  pub fn validate(self) -> Result<Curriculum> {
    let timezone = FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
      .ok_or_else(|| {
        Error::InvalidConfig(format!(
          "utc_offset_minutes {} is out of range",
          self.utc_offset_minutes
        ))
      })?;

    let mut milestones = self.milestones;
    milestones.sort_unstable();
    milestones.dedup();

    Ok(Curriculum {
      thresholds: ThresholdTable::new(self.thresholds)?,
      phases: PhaseTable::new(self.phases)?,
      timezone,
      milestones,
    })
  }
}

/// Validated tables plus the streak day boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Curriculum {
  pub thresholds: ThresholdTable,
  pub phases:     PhaseTable,
  pub timezone:   FixedOffset,
  pub milestones: Vec<u32>,
}

impl Default for Curriculum {
  fn default() -> Self {
    Self {
      thresholds: ThresholdTable::default(),
      phases:     PhaseTable::default(),
      timezone:   DEFAULT_TIMEZONE,
      milestones: DEFAULT_MILESTONES.to_vec(),
    }
  }
}
