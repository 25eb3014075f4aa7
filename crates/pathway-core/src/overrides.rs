//! Administrator level overrides and the level resolver that composes them.
//!
//! Overrides are soft-deleted: revocation stamps `revoked_at` and the row is
//! kept for audit. Only rows with `revoked_at == None` take part in
//! resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result,
  thresholds::{MAX_LEVEL, MIN_LEVEL, ThresholdTable},
};

/// Who the store records when the caller does not name an actor.
pub const SYSTEM_ACTOR: &str = "system";

// ─── Types ───────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum OverrideKind {
  /// Shift the base level by `value`.
  Add,
  /// Pin the level to `value`, ignoring everything else.
  Set,
  /// Raise the level to at least `value`.
  Min,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelOverride {
  /// Time-ordered (UUIDv7), so id order follows creation order.
  pub override_id: Uuid,
  pub student_id:  Uuid,
  pub kind:        OverrideKind,
  pub value:       u8,
  pub reason:      String,
  pub created_at:  DateTime<Utc>,
  pub created_by:  String,
  pub revoked_at:  Option<DateTime<Utc>>,
  pub revoked_by:  Option<String>,
}

impl LevelOverride {
  pub fn is_active(&self) -> bool { self.revoked_at.is_none() }
}

/// Validated input to [`crate::store::ProgressStore::insert_override`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOverride {
  pub student_id: Uuid,
  pub kind:       OverrideKind,
  pub value:      u8,
  pub reason:     String,
  pub created_by: String,
}

impl NewOverride {
  /// Parse untrusted admin input. `kind` is matched case-insensitively.
  pub fn parse(
    student_id: Uuid,
    kind: &str,
    value: i64,
    reason: &str,
    created_by: &str,
  ) -> Result<Self> {
    let kind = kind.trim().parse::<OverrideKind>().map_err(|_| {
      Error::InvalidOverrideType { student_id, given: kind.to_owned() }
    })?;

    let value = u8::try_from(value)
      .ok()
      .filter(|v| (MIN_LEVEL..=MAX_LEVEL).contains(v))
      .ok_or(Error::InvalidOverrideValue { student_id, value })?;

    let reason = reason.trim();
    if reason.is_empty() {
      return Err(Error::MissingReason(student_id));
    }

    let created_by = match created_by.trim() {
      "" => SYSTEM_ACTOR,
      actor => actor,
    };

    Ok(Self {
      student_id,
      kind,
      value,
      reason: reason.to_owned(),
      created_by: created_by.to_owned(),
    })
  }
}

// ─── Resolution ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelResolution {
  pub base_level:      u8,
  pub effective_level: u8,
  /// Ids of the overrides that shaped `effective_level`. When a SET is
  /// present this is just that SET.
  pub applied:         Vec<Uuid>,
}

/// Base level from the table, then ADD, MIN, SET in that fixed order, then
/// clamp to 1..=15. Revoked overrides in `overrides` are ignored.
pub fn resolve_level(
  table: &ThresholdTable,
  active_days: u32,
  overrides: &[LevelOverride],
) -> LevelResolution {
  let base_level = table.base_level(active_days);
  let active = || overrides.iter().filter(|o| o.is_active());

  let pin = active()
    .filter(|o| o.kind == OverrideKind::Set)
    .max_by_key(|o| (o.created_at, o.override_id));

  if let Some(set) = pin {
    return LevelResolution {
      base_level,
      effective_level: clamp_level(i64::from(set.value)),
      applied: vec![set.override_id],
    };
  }

  let mut applied = Vec::new();
  let mut effective = i64::from(base_level);

  for o in active().filter(|o| o.kind == OverrideKind::Add) {
    effective += i64::from(o.value);
    applied.push(o.override_id);
  }
  for o in active().filter(|o| o.kind == OverrideKind::Min) {
    effective = effective.max(i64::from(o.value));
    applied.push(o.override_id);
  }

  LevelResolution { base_level, effective_level: clamp_level(effective), applied }
}

fn clamp_level(level: i64) -> u8 {
  // Clamped into 1..=15 first, so the narrowing cannot truncate.
  level.clamp(i64::from(MIN_LEVEL), i64::from(MAX_LEVEL)) as u8
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};
  use proptest::prelude::*;

  use super::*;

  fn table() -> ThresholdTable { ThresholdTable::default() }

  fn ov(kind: OverrideKind, value: u8, minutes: i64) -> LevelOverride {
    LevelOverride {
      override_id: Uuid::now_v7(),
      student_id: Uuid::nil(),
      kind,
      value,
      reason: "test".into(),
      created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        + Duration::minutes(minutes),
      created_by: SYSTEM_ACTOR.into(),
      revoked_at: None,
      revoked_by: None,
    }
  }

  // Active-day counts landing on a given base level with the default table.
  const BASE_4: u32 = 100;
  const BASE_5: u32 = 130;

  #[test]
  fn no_overrides_yields_base() {
    let r = resolve_level(&table(), BASE_5, &[]);
    assert_eq!(r.base_level, 5);
    assert_eq!(r.effective_level, 5);
    assert!(r.applied.is_empty());
  }

  #[test]
  fn min_raises_but_never_lowers() {
    let r = resolve_level(&table(), BASE_5, &[ov(OverrideKind::Min, 8, 0)]);
    assert_eq!(r.effective_level, 8);
    let r = resolve_level(&table(), BASE_5, &[ov(OverrideKind::Min, 2, 0)]);
    assert_eq!(r.effective_level, 5);
  }

  #[test]
  fn adds_are_summed() {
    let r = resolve_level(
      &table(),
      BASE_4,
      &[ov(OverrideKind::Add, 2, 0), ov(OverrideKind::Add, 3, 1)],
    );
    assert_eq!(r.effective_level, 9);
    assert_eq!(r.applied.len(), 2);
  }

  #[test]
  fn add_applies_before_min() {
    // 4 + 2 = 6, then max(6, 5) = 6.
    let r = resolve_level(
      &table(),
      BASE_4,
      &[ov(OverrideKind::Min, 5, 0), ov(OverrideKind::Add, 2, 1)],
    );
    assert_eq!(r.effective_level, 6);
  }

  #[test]
  fn set_wins_over_add() {
    let r = resolve_level(
      &table(),
      BASE_4,
      &[ov(OverrideKind::Add, 2, 0), ov(OverrideKind::Set, 10, 1)],
    );
    assert_eq!(r.base_level, 4);
    assert_eq!(r.effective_level, 10);
  }

  #[test]
  fn newest_set_wins() {
    let older = ov(OverrideKind::Set, 3, 0);
    let newer = ov(OverrideKind::Set, 12, 5);
    let r = resolve_level(&table(), BASE_4, &[newer.clone(), older]);
    assert_eq!(r.effective_level, 12);
    assert_eq!(r.applied, vec![newer.override_id]);
  }

  #[test]
  fn set_tie_broken_by_id() {
    let a = ov(OverrideKind::Set, 3, 0);
    let b = ov(OverrideKind::Set, 11, 0);
    let winner = if a.override_id > b.override_id { &a } else { &b };
    let r = resolve_level(&table(), BASE_4, &[a.clone(), b.clone()]);
    assert_eq!(r.effective_level, winner.value);
  }

  #[test]
  fn add_is_clamped_to_max() {
    let r = resolve_level(&table(), 440, &[ov(OverrideKind::Add, 10, 0)]);
    assert_eq!(r.effective_level, MAX_LEVEL);
  }

  #[test]
  fn revoked_overrides_are_ignored() {
    let mut set = ov(OverrideKind::Set, 12, 0);
    set.revoked_at = Some(set.created_at + Duration::hours(1));
    let r = resolve_level(&table(), BASE_5, &[set]);
    assert_eq!(r.effective_level, 5);
  }

  #[test]
  fn parse_accepts_any_case() {
    let n = NewOverride::parse(Uuid::nil(), "min", 8, " promoted ", "").unwrap();
    assert_eq!(n.kind, OverrideKind::Min);
    assert_eq!(n.reason, "promoted");
    assert_eq!(n.created_by, SYSTEM_ACTOR);
  }

  #[test]
  fn parse_rejects_bad_input() {
    let id = Uuid::new_v4();
    assert!(matches!(
      NewOverride::parse(id, "MAX", 3, "r", "a"),
      Err(Error::InvalidOverrideType { student_id, .. }) if student_id == id
    ));
    assert!(matches!(
      NewOverride::parse(id, "SET", 0, "r", "a"),
      Err(Error::InvalidOverrideValue { value: 0, .. })
    ));
    assert!(matches!(
      NewOverride::parse(id, "SET", 16, "r", "a"),
      Err(Error::InvalidOverrideValue { value: 16, .. })
    ));
    assert!(matches!(
      NewOverride::parse(id, "SET", 300, "r", "a"),
      Err(Error::InvalidOverrideValue { .. })
    ));
    assert!(matches!(
      NewOverride::parse(id, "ADD", 2, "   ", "a"),
      Err(Error::MissingReason(_))
    ));
  }

  #[test]
  fn kind_text_form() {
    assert_eq!(OverrideKind::Add.to_string(), "ADD");
    assert_eq!(
      serde_json::to_string(&OverrideKind::Min).unwrap(),
      "\"MIN\""
    );
  }

  fn kind_strategy() -> impl Strategy<Value = OverrideKind> {
    prop_oneof![
      Just(OverrideKind::Add),
      Just(OverrideKind::Set),
      Just(OverrideKind::Min),
    ]
  }

  proptest! {
    #[test]
    fn set_always_wins(
      days in 0u32..1000,
      set in 1u8..=15,
      others in prop::collection::vec((kind_strategy(), 1u8..=15), 0..6),
    ) {
      let mut all: Vec<_> = others
        .into_iter()
        .filter(|(k, _)| *k != OverrideKind::Set)
        .enumerate()
        .map(|(i, (k, v))| ov(k, v, i as i64))
        .collect();
      all.push(ov(OverrideKind::Set, set, -1));
      prop_assert_eq!(resolve_level(&table(), days, &all).effective_level, set);
    }

    #[test]
    fn revoking_equals_never_existing(
      days in 0u32..1000,
      overrides in prop::collection::vec((kind_strategy(), 1u8..=15), 1..6),
      victim in 0usize..6,
    ) {
      let mut all: Vec<_> = overrides
        .into_iter()
        .enumerate()
        .map(|(i, (k, v))| ov(k, v, i as i64))
        .collect();
      let victim = victim % all.len();

      let mut without = all.clone();
      without.remove(victim);
      all[victim].revoked_at = Some(Utc::now());

      prop_assert_eq!(
        resolve_level(&table(), days, &all).effective_level,
        resolve_level(&table(), days, &without).effective_level
      );
    }

    #[test]
    fn effective_level_is_in_range(
      days in 0u32..1000,
      overrides in prop::collection::vec((kind_strategy(), 1u8..=15), 0..6),
    ) {
      let all: Vec<_> = overrides
        .into_iter()
        .enumerate()
        .map(|(i, (k, v))| ov(k, v, i as i64))
        .collect();
      let level = resolve_level(&table(), days, &all).effective_level;
      prop_assert!((MIN_LEVEL..=MAX_LEVEL).contains(&level));
    }
  }
}
