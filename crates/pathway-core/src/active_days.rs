//! Active-day arithmetic: elapsed enrollment time minus merged pause time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, student::PauseInterval};

/// A paused range after clipping and merging. Ranges returned together are
/// disjoint, non-adjacent and sorted by `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PausedSpan {
  pub start: DateTime<Utc>,
  pub end:   DateTime<Utc>,
}

impl PausedSpan {
  pub fn duration(&self) -> Duration { self.end - self.start }

  pub fn covers(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    self.start <= from && to <= self.end
  }
}

/// Breakdown of a student's enrollment time as of some instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DayCount {
  /// Whole days between enrollment and `as_of`.
  pub elapsed_days: u32,
  /// Whole days covered by merged pauses inside that window.
  pub paused_days:  u32,
  pub active_days:  u32,
}

/// Clip every pause to `[enrollment_at, as_of]` and merge overlapping or
/// touching ranges.
///
/// Every interval is validated first; a single reversed interval fails the
/// whole call even if it would have been clipped away.
pub fn merge_pauses(
  enrollment_at: DateTime<Utc>,
  pauses: &[PauseInterval],
  as_of: DateTime<Utc>,
) -> Result<Vec<PausedSpan>> {
  for p in pauses {
    p.validate()?;
  }

  let mut clipped: Vec<PausedSpan> = pauses
    .iter()
    .filter_map(|p| {
      let end = p.end.map_or(as_of, |e| e.min(as_of));
      let start = p.start.max(enrollment_at);
      (start < end).then_some(PausedSpan { start, end })
    })
    .collect();
  clipped.sort_by_key(|s| (s.start, s.end));

  let mut merged: Vec<PausedSpan> = Vec::with_capacity(clipped.len());
  for span in clipped {
    match merged.last_mut() {
      Some(last) if span.start <= last.end => {
        last.end = last.end.max(span.end);
      }
      _ => merged.push(span),
    }
  }
  Ok(merged)
}

/// Elapsed, paused and active whole days as of `as_of`.
///
/// Paused time is summed across merged spans before flooring to days.
pub fn count_days(
  enrollment_at: DateTime<Utc>,
  pauses: &[PauseInterval],
  as_of: DateTime<Utc>,
) -> Result<DayCount> {
  let spans = merge_pauses(enrollment_at, pauses, as_of)?;
  if as_of <= enrollment_at {
    return Ok(DayCount::default());
  }

  let elapsed_days = whole_days(as_of - enrollment_at);
  let paused: Duration = spans.iter().map(PausedSpan::duration).sum();
  let paused_days = whole_days(paused);

  Ok(DayCount {
    elapsed_days,
    paused_days,
    active_days: elapsed_days.saturating_sub(paused_days),
  })
}

/// Active (non-paused) days since enrollment.
pub fn active_days(
  enrollment_at: DateTime<Utc>,
  pauses: &[PauseInterval],
  as_of: DateTime<Utc>,
) -> Result<u32> {
  count_days(enrollment_at, pauses, as_of).map(|c| c.active_days)
}

fn whole_days(d: Duration) -> u32 {
  u32::try_from(d.num_days().max(0)).unwrap_or(u32::MAX)
}
