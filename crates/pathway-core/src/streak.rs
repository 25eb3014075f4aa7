//! Daily-practice streaks.
//!
//! Days are local calendar days in the configured timezone. Walking back
//! from the day of `as_of`, a practiced day extends the streak, a day fully
//! covered by a pause is skipped, and any other day ends the walk. The
//! current day is never required: until it is practiced the streak is
//! "awaiting today".

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  active_days::{PausedSpan, merge_pauses},
  student::{PauseInterval, PracticeEvent},
};

pub const DEFAULT_MILESTONES: [u32; 9] = [25, 50, 75, 100, 150, 200, 250, 300, 365];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreakState {
  /// Nothing recorded yet for the current day; the run is still alive.
  #[default]
  AwaitingToday,
  PracticedToday,
  /// A non-paused day was missed and nothing has been practiced since.
  Broken,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreakStatus {
  pub current:           u32,
  pub state:             StreakState,
  pub practiced_today:   bool,
  /// Most recent local day with a practice, up to and including today.
  pub last_practice_day: Option<NaiveDate>,
  /// The run is being held open by pause days between its last practice and
  /// now.
  pub frozen_by_pause:   bool,
}

/// Full streak state as of `as_of`, with days cut in `tz`.
pub fn streak_status<Tz: TimeZone>(
  enrollment_at: DateTime<Utc>,
  events: &[PracticeEvent],
  pauses: &[PauseInterval],
  as_of: DateTime<Utc>,
  tz: &Tz,
) -> Result<StreakStatus> {
  let spans = merge_pauses(enrollment_at, pauses, as_of)?;
  if as_of < enrollment_at {
    return Ok(StreakStatus::default());
  }

  let local_day = |t: &DateTime<Utc>| t.with_timezone(tz).date_naive();
  let today = local_day(&as_of);
  let first_day = local_day(&enrollment_at);

  let practiced: BTreeSet<NaiveDate> = events
    .iter()
    .filter(|e| e.occurred_at <= as_of)
    .map(|e| local_day(&e.occurred_at))
    .collect();

  let covered = |day: NaiveDate| -> bool {
    match day_bounds(tz, day) {
      Some((from, to)) => spans.iter().any(|s| s.covers(from, to)),
      None => false,
    }
  };

  let practiced_today = practiced.contains(&today);
  let mut current = u32::from(practiced_today);
  // Pause days seen before the first counted practice, today included when
  // a pause is running right now.
  let mut leading_pause = !practiced_today && paused_at(&spans, as_of);
  let mut hit_gap = false;

  let mut cursor = today.pred_opt();
  while let Some(day) = cursor {
    if day < first_day {
      break;
    }
    if practiced.contains(&day) {
      current += 1;
    } else if covered(day) {
      if current == 0 {
        leading_pause = true;
      }
    } else {
      hit_gap = true;
      break;
    }
    cursor = day.pred_opt();
  }

  let state = if practiced_today {
    StreakState::PracticedToday
  } else if hit_gap && current == 0 {
    StreakState::Broken
  } else {
    StreakState::AwaitingToday
  };

  Ok(StreakStatus {
    current,
    state,
    practiced_today,
    last_practice_day: practiced.iter().next_back().copied(),
    frozen_by_pause: leading_pause && current > 0,
  })
}

/// Number of consecutive practiced days as of `as_of`.
pub fn current_streak<Tz: TimeZone>(
  enrollment_at: DateTime<Utc>,
  events: &[PracticeEvent],
  pauses: &[PauseInterval],
  as_of: DateTime<Utc>,
  tz: &Tz,
) -> Result<u32> {
  streak_status(enrollment_at, events, pauses, as_of, tz).map(|s| s.current)
}

pub fn is_milestone(streak: u32, milestones: &[u32]) -> bool {
  milestones.contains(&streak)
}

/// UTC instants of local midnight at the start and end of `day`. `None` when
/// the local midnight does not exist in `tz`.
fn day_bounds<Tz: TimeZone>(
  tz: &Tz,
  day: NaiveDate,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
  let midnight = |d: NaiveDate| {
    tz.from_local_datetime(&d.and_hms_opt(0, 0, 0)?)
      .earliest()
      .map(|t| t.with_timezone(&Utc))
  };
  Some((midnight(day)?, midnight(day.succ_opt()?)?))
}

fn paused_at(spans: &[PausedSpan], at: DateTime<Utc>) -> bool {
  spans.iter().any(|s| s.start <= at && at <= s.end)
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, FixedOffset};
  use proptest::prelude::*;
  use uuid::Uuid;

  use super::*;
  use crate::Error;

  fn madrid() -> FixedOffset { FixedOffset::east_opt(3600).unwrap() }

  /// Noon UTC on day `n` after 2025-01-01.
  fn noon(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap() + Duration::days(n)
  }

  /// Local (+01:00) midnight at the start of day `n`.
  fn midnight(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 31, 23, 0, 0).unwrap() + Duration::days(n)
  }

  fn practice(at: DateTime<Utc>) -> PracticeEvent {
    PracticeEvent {
      event_id: Uuid::new_v4(),
      student_id: Uuid::nil(),
      occurred_at: at,
      metadata: serde_json::Value::Null,
    }
  }

  fn practices(days: impl IntoIterator<Item = i64>) -> Vec<PracticeEvent> {
    days.into_iter().map(|d| practice(noon(d))).collect()
  }

  fn pause(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> PauseInterval {
    PauseInterval { pause_id: Uuid::new_v4(), student_id: Uuid::nil(), start, end }
  }

  fn status(
    events: &[PracticeEvent],
    pauses: &[PauseInterval],
    as_of: DateTime<Utc>,
  ) -> StreakStatus {
    streak_status(noon(0), events, pauses, as_of, &madrid()).unwrap()
  }

  #[test]
  fn consecutive_days_ending_today() {
    let s = status(&practices(0..5), &[], noon(4));
    assert_eq!(s.current, 5);
    assert_eq!(s.state, StreakState::PracticedToday);
    assert!(s.practiced_today);
  }

  #[test]
  fn today_not_required() {
    let s = status(&practices(0..5), &[], noon(5));
    assert_eq!(s.current, 5);
    assert_eq!(s.state, StreakState::AwaitingToday);
    assert!(!s.practiced_today);
  }

  #[test]
  fn missed_day_breaks() {
    let s = status(&practices([0, 1, 2, 4, 5]), &[], noon(5));
    assert_eq!(s.current, 2);

    let s = status(&practices(0..3), &[], noon(5));
    assert_eq!(s.current, 0);
    assert_eq!(s.state, StreakState::Broken);
    assert_eq!(s.last_practice_day, Some(noon(2).date_naive()));
  }

  #[test]
  fn several_events_on_one_day_count_once() {
    let mut events = practices(0..3);
    events.push(practice(noon(2) + Duration::hours(2)));
    events.push(practice(noon(2) - Duration::hours(3)));
    assert_eq!(status(&events, &[], noon(2)).current, 3);
  }

  #[test]
  fn pause_bridges_gap() {
    // Practice on day 1, pause covering days 2..=5, practice on day 6.
    let events = practices([1, 6]);
    let pauses = [pause(midnight(2), Some(midnight(6)))];
    let s = status(&events, &pauses, noon(6));
    assert_eq!(s.current, 2);
    assert!(!s.frozen_by_pause);

    // Without the pause only day 6 counts.
    assert_eq!(status(&events, &[], noon(6)).current, 1);
  }

  #[test]
  fn partially_paused_day_does_not_bridge() {
    let events = practices([1, 3]);
    let pauses = [pause(midnight(2) + Duration::hours(6), Some(midnight(3)))];
    assert_eq!(status(&events, &pauses, noon(3)).current, 1);
  }

  #[test]
  fn running_pause_freezes_streak() {
    let events = practices(0..4);
    let pauses = [pause(midnight(4), None)];
    let s = status(&events, &pauses, noon(9));
    assert_eq!(s.current, 4);
    assert!(s.frozen_by_pause);
    assert_eq!(s.state, StreakState::AwaitingToday);
  }

  #[test]
  fn day_boundary_follows_timezone() {
    // 23:30 UTC on day 1 is 00:30 local on day 2.
    let events = vec![
      practice(noon(0)),
      practice(midnight(2) + Duration::minutes(30)),
    ];
    let as_of = noon(2);
    assert_eq!(status(&events, &[], as_of).current, 1);
    let utc = streak_status(noon(0), &events, &[], as_of, &Utc).unwrap();
    assert_eq!(utc.current, 2);
  }

  #[test]
  fn future_events_and_pre_enrollment_days_are_ignored() {
    let events = practices([-3, -2, -1, 0, 1, 8]);
    let s = status(&events, &[], noon(1));
    assert_eq!(s.current, 2);
    assert_eq!(s.last_practice_day, Some(noon(1).date_naive()));
  }

  #[test]
  fn as_of_before_enrollment_is_zero() {
    let s = status(&practices(0..3), &[], noon(-1));
    assert_eq!(s, StreakStatus::default());
  }

  #[test]
  fn invalid_pause_is_fatal() {
    let pauses = [pause(noon(3), Some(noon(1)))];
    let err = streak_status(noon(0), &[], &pauses, noon(5), &madrid()).unwrap_err();
    assert!(matches!(err, Error::InvalidPauseInterval { .. }));
  }

  #[test]
  fn milestones() {
    assert!(is_milestone(25, &DEFAULT_MILESTONES));
    assert!(!is_milestone(26, &DEFAULT_MILESTONES));
  }

  proptest! {
    #[test]
    fn streak_bounded_by_calendar_days(
      days in prop::collection::vec(-5i64..60, 0..80),
      as_of in 0i64..60,
      hour in 0i64..24,
    ) {
      let events: Vec<_> = days
        .iter()
        .map(|d| practice(midnight(*d) + Duration::hours(hour)))
        .collect();
      let as_of = noon(as_of);
      let s = status(&events, &[], as_of);

      let tz = madrid();
      let span = (as_of.with_timezone(&tz).date_naive()
        - noon(0).with_timezone(&tz).date_naive())
        .num_days() as u32
        + 1;
      prop_assert!(s.current <= span);

      let distinct: BTreeSet<_> = events
        .iter()
        .filter(|e| e.occurred_at <= as_of)
        .map(|e| e.occurred_at.with_timezone(&tz).date_naive())
        .collect();
      prop_assert!(s.current as usize <= distinct.len());
    }
  }
}
