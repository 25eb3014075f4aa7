//! Level → phase mapping.

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  thresholds::{MAX_LEVEL, MIN_LEVEL},
};

/// A configured phase covering `level_min..=level_max`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRange {
  pub id:        String,
  pub name:      String,
  pub level_min: u8,
  pub level_max: u8,
}

/// The phase a level belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
  pub id:   String,
  pub name: String,
}

/// Contiguous, non-overlapping ranges that together cover every level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseTable {
  ranges: Vec<PhaseRange>,
}

impl PhaseTable {
  pub fn new(mut ranges: Vec<PhaseRange>) -> Result<Self> {
    if ranges.is_empty() {
      return Err(Error::InvalidConfig("phase table is empty".into()));
    }
    ranges.sort_by_key(|r| r.level_min);

    let mut next = MIN_LEVEL;
    for r in &ranges {
      if r.id.trim().is_empty() {
        return Err(Error::InvalidConfig("phase id must not be empty".into()));
      }
      if r.level_max < r.level_min {
        return Err(Error::InvalidConfig(format!(
          "phase {:?} has level_max {} below level_min {}",
          r.id, r.level_max, r.level_min
        )));
      }
      if r.level_min != next {
        return Err(Error::InvalidConfig(format!(
          "phase {:?} starts at level {}, expected {next} (gap or overlap)",
          r.id, r.level_min
        )));
      }
      next = r.level_max.saturating_add(1);
    }
    if next != MAX_LEVEL + 1 {
      return Err(Error::InvalidConfig(format!(
        "phases must end at level {MAX_LEVEL}, last ends at {}",
        next - 1
      )));
    }

    Ok(Self { ranges })
  }

  /// The phase covering `level`. Levels outside 1..=15 are clamped first.
  pub fn resolve(&self, level: u8) -> Phase {
    let level = level.clamp(MIN_LEVEL, MAX_LEVEL);
    // Validation guarantees coverage, so the fallback is unreachable.
    let r = self
      .ranges
      .iter()
      .find(|r| (r.level_min..=r.level_max).contains(&level))
      .unwrap_or(&self.ranges[0]);
    Phase { id: r.id.clone(), name: r.name.clone() }
  }
}

impl Default for PhaseTable {
  fn default() -> Self {
    Self { ranges: default_phases() }
  }
}

pub fn default_phases() -> Vec<PhaseRange> {
  let range = |id: &str, name: &str, level_min, level_max| PhaseRange {
    id: id.to_owned(),
    name: name.to_owned(),
    level_min,
    level_max,
  };
  vec![
    range("sanacion", "Sanación", 1, 6),
    range("sanacion_avanzada", "Sanación Avanzada", 7, 9),
    range("canalizacion", "Canalización", 10, 15),
  ]
}

#[cfg(test)]
mod tests {
  use super::*;

  fn five_phases() -> Vec<PhaseRange> {
    [("a", 1, 3), ("b", 4, 6), ("c", 7, 9), ("d", 10, 12), ("e", 13, 15)]
      .into_iter()
      .map(|(id, level_min, level_max)| PhaseRange {
        id: id.into(),
        name: id.to_uppercase(),
        level_min,
        level_max,
      })
      .collect()
  }

  #[test]
  fn default_phase_boundaries() {
    let t = PhaseTable::default();
    assert_eq!(t.resolve(1).id, "sanacion");
    assert_eq!(t.resolve(6).id, "sanacion");
    assert_eq!(t.resolve(7).id, "sanacion_avanzada");
    assert_eq!(t.resolve(9).id, "sanacion_avanzada");
    assert_eq!(t.resolve(10).id, "canalizacion");
    assert_eq!(t.resolve(15).name, "Canalización");
  }

  #[test]
  fn five_phase_scheme_from_config() {
    let t = PhaseTable::new(five_phases()).unwrap();
    assert_eq!(t.resolve(5).id, "b");
    assert_eq!(t.resolve(13).id, "e");
  }

  #[test]
  fn unsorted_input_is_accepted() {
    let mut rows = five_phases();
    rows.reverse();
    let t = PhaseTable::new(rows).unwrap();
    assert_eq!(t.resolve(1).id, "a");
  }

  #[test]
  fn out_of_range_levels_clamp() {
    let t = PhaseTable::default();
    assert_eq!(t.resolve(0).id, "sanacion");
    assert_eq!(t.resolve(200).id, "canalizacion");
  }

  #[test]
  fn rejects_gap() {
    let mut rows = five_phases();
    rows[1].level_min = 5;
    assert!(PhaseTable::new(rows).is_err());
  }

  #[test]
  fn rejects_overlap() {
    let mut rows = five_phases();
    rows[1].level_min = 3;
    assert!(PhaseTable::new(rows).is_err());
  }

  #[test]
  fn rejects_short_coverage() {
    let mut rows = five_phases();
    rows[4].level_max = 14;
    assert!(PhaseTable::new(rows).is_err());
  }

  #[test]
  fn resolve_is_stable() {
    let t = PhaseTable::default();
    for level in MIN_LEVEL..=MAX_LEVEL {
      assert_eq!(t.resolve(level), t.resolve(level));
    }
  }
}
