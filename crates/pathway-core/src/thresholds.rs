//! The active-days → level threshold table.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 15;

/// One row of the table: reaching `days_min` active days unlocks `level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
  pub level:    u8,
  pub days_min: u32,
  #[serde(default)]
  pub name:     String,
  #[serde(default)]
  pub category: String,
}

/// A validated 15-entry table: levels 1..=15 in order, level 1 at zero days,
/// `days_min` strictly increasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThresholdTable {
  entries: Vec<Threshold>,
}

impl ThresholdTable {
  pub fn new(entries: Vec<Threshold>) -> Result<Self> {
    if entries.len() != usize::from(MAX_LEVEL) {
      return Err(Error::InvalidConfig(format!(
        "threshold table needs {MAX_LEVEL} entries, got {}",
        entries.len()
      )));
    }
    for (i, t) in entries.iter().enumerate() {
      let expected = i as u8 + MIN_LEVEL;
      if t.level != expected {
        return Err(Error::InvalidConfig(format!(
          "threshold entry {i} has level {}, expected {expected}",
          t.level
        )));
      }
    }
    if entries[0].days_min != 0 {
      return Err(Error::InvalidConfig(
        "level 1 must start at 0 active days".into(),
      ));
    }
    if let Some(w) = entries.windows(2).find(|w| w[1].days_min <= w[0].days_min) {
      return Err(Error::InvalidConfig(format!(
        "days_min must increase with level (level {} = {}, level {} = {})",
        w[0].level, w[0].days_min, w[1].level, w[1].days_min
      )));
    }
    Ok(Self { entries })
  }

  /// Highest level whose `days_min` is reached.
  pub fn base_level(&self, active_days: u32) -> u8 {
    self
      .entries
      .iter()
      .rev()
      .find(|t| t.days_min <= active_days)
      .map_or(MIN_LEVEL, |t| t.level)
  }

  pub fn get(&self, level: u8) -> Option<&Threshold> {
    self.entries.iter().find(|t| t.level == level)
  }

  /// Display name for a level; empty when the config left it blank.
  pub fn level_name(&self, level: u8) -> &str {
    self.get(level).map_or("", |t| t.name.as_str())
  }
}

impl Default for ThresholdTable {
  fn default() -> Self {
    Self { entries: default_thresholds() }
  }
}

/// The default fifteen-level curriculum.
pub fn default_thresholds() -> Vec<Threshold> {
  const ROWS: [(u8, u32, &str); 15] = [
    (1, 0, "Sanación"),
    (2, 40, "Sanación"),
    (3, 60, "Sanación"),
    (4, 90, "Sanación"),
    (5, 120, "Sanación"),
    (6, 150, "Sanación"),
    (7, 180, "Sanación Avanzada"),
    (8, 230, "Sanación Avanzada"),
    (9, 260, "Sanación Avanzada"),
    (10, 290, "Canalización"),
    (11, 320, "Canalización"),
    (12, 350, "Canalización"),
    (13, 380, "Canalización"),
    (14, 410, "Canalización"),
    (15, 440, "Canalización"),
  ];

  ROWS
    .iter()
    .map(|&(level, days_min, category)| {
      let stem = if level >= 10 { "Canalización" } else { "Sanación" };
      let name = if level == 1 {
        format!("{stem} - Inicial")
      } else {
        format!("{stem} - Nivel {level}")
      };
      Threshold { level, days_min, name, category: category.to_owned() }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;

  #[test]
  fn default_table_is_valid() {
    let table = ThresholdTable::new(default_thresholds()).unwrap();
    assert_eq!(table, ThresholdTable::default());
    assert_eq!(table.level_name(1), "Sanación - Inicial");
    assert_eq!(table.level_name(12), "Canalización - Nivel 12");
  }

  #[test]
  fn base_level_boundaries() {
    let t = ThresholdTable::default();
    assert_eq!(t.base_level(0), 1);
    assert_eq!(t.base_level(39), 1);
    assert_eq!(t.base_level(40), 2);
    assert_eq!(t.base_level(149), 5);
    assert_eq!(t.base_level(150), 6);
    assert_eq!(t.base_level(200), 7);
    assert_eq!(t.base_level(440), 15);
    assert_eq!(t.base_level(u32::MAX), 15);
  }

  #[test]
  fn rejects_wrong_length() {
    let mut rows = default_thresholds();
    rows.pop();
    assert!(matches!(ThresholdTable::new(rows), Err(Error::InvalidConfig(_))));
  }

  #[test]
  fn rejects_non_zero_first_level() {
    let mut rows = default_thresholds();
    rows[0].days_min = 1;
    assert!(ThresholdTable::new(rows).is_err());
  }

  #[test]
  fn rejects_non_increasing_days() {
    let mut rows = default_thresholds();
    rows[5].days_min = rows[4].days_min;
    assert!(ThresholdTable::new(rows).is_err());
  }

  #[test]
  fn rejects_out_of_order_levels() {
    let mut rows = default_thresholds();
    rows.swap(2, 3);
    assert!(ThresholdTable::new(rows).is_err());
  }

  proptest! {
    #[test]
    fn base_level_is_monotonic(a in 0u32..2000, b in 0u32..2000) {
      let t = ThresholdTable::default();
      let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
      prop_assert!(t.base_level(lo) <= t.base_level(hi));
    }
  }
}
