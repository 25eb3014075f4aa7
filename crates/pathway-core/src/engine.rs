//! [`ProgressEngine`] — the operations collaborators call.
//!
//! Every read fetches the student's data once, then runs the pure
//! calculators over it. The only writes are override mutations and snapshot
//! appends, both delegated to the [`ProgressStore`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  active_days::count_days,
  config::Curriculum,
  overrides::{LevelOverride, NewOverride},
  progress::{BatchFailure, BatchSummary, LevelState, ProgressReport, ProgressSnapshot},
  store::ProgressStore,
  streak::{StreakStatus, streak_status},
  student::Student,
};

/// Cloning is cheap; the store and curriculum are reference-counted.
pub struct ProgressEngine<S> {
  store:      Arc<S>,
  curriculum: Arc<Curriculum>,
}

impl<S> Clone for ProgressEngine<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), curriculum: Arc::clone(&self.curriculum) }
  }
}

impl<S: ProgressStore> ProgressEngine<S> {
  pub fn new(store: Arc<S>, curriculum: Curriculum) -> Self {
    Self { store, curriculum: Arc::new(curriculum) }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn curriculum(&self) -> &Curriculum { &self.curriculum }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Levels, phase, day counts and streak as of `as_of`.
  #[tracing::instrument(skip(self))]
  pub async fn get_progress(
    &self,
    student_id: Uuid,
    as_of: DateTime<Utc>,
  ) -> Result<ProgressReport> {
    let student = self.student(student_id).await?;
    let enrollment_at = student.enrollment()?;

    let pauses = self
      .store
      .list_pauses(student_id)
      .await
      .map_err(Error::store_for(student_id))?;
    let practices = self
      .store
      .list_practices(student_id, as_of)
      .await
      .map_err(Error::store_for(student_id))?;
    let overrides = self
      .store
      .list_active_overrides(student_id)
      .await
      .map_err(Error::store_for(student_id))?;

    let days = count_days(enrollment_at, &pauses, as_of)?;
    let level = LevelState::compute(&self.curriculum, days, &overrides);
    let streak = streak_status(
      enrollment_at,
      &practices,
      &pauses,
      as_of,
      &self.curriculum.timezone,
    )?;

    let applied_overrides = overrides
      .into_iter()
      .filter(|o| level.resolution.applied.contains(&o.override_id))
      .collect();

    debug!(
      base_level = level.resolution.base_level,
      effective_level = level.resolution.effective_level,
      phase = %level.phase.id,
      active_days = level.days.active_days,
      streak = streak.current,
      "progress computed"
    );

    Ok(ProgressReport {
      student_id,
      as_of,
      base_level: level.resolution.base_level,
      effective_level: level.resolution.effective_level,
      level_name: self
        .curriculum
        .thresholds
        .level_name(level.resolution.effective_level)
        .to_owned(),
      phase: level.phase,
      active_days: level.days.active_days,
      paused_days: level.days.paused_days,
      current_streak: streak.current,
      streak,
      applied_overrides,
    })
  }

  /// Streak state alone, without the level computation.
  #[tracing::instrument(skip(self))]
  pub async fn streak(
    &self,
    student_id: Uuid,
    as_of: DateTime<Utc>,
  ) -> Result<StreakStatus> {
    let student = self.student(student_id).await?;
    let enrollment_at = student.enrollment()?;
    let pauses = self
      .store
      .list_pauses(student_id)
      .await
      .map_err(Error::store_for(student_id))?;
    let practices = self
      .store
      .list_practices(student_id, as_of)
      .await
      .map_err(Error::store_for(student_id))?;

    streak_status(enrollment_at, &practices, &pauses, as_of, &self.curriculum.timezone)
  }

  pub fn is_milestone(&self, streak: u32) -> bool {
    crate::streak::is_milestone(streak, &self.curriculum.milestones)
  }

  // ── Overrides ─────────────────────────────────────────────────────────

  /// Validate and append a new active override. Earlier overrides stay
  /// active.
  #[tracing::instrument(skip(self, reason, created_by))]
  pub async fn create_override(
    &self,
    student_id: Uuid,
    kind: &str,
    value: i64,
    reason: &str,
    created_by: &str,
  ) -> Result<LevelOverride> {
    let input = NewOverride::parse(student_id, kind, value, reason, created_by)?;
    self.student(student_id).await?;

    let created = self
      .store
      .insert_override(input)
      .await
      .map_err(Error::store_for(student_id))?;
    debug!(override_id = %created.override_id, "override created");
    Ok(created)
  }

  /// Soft-delete an override. Revoking twice returns the already-revoked
  /// row unchanged.
  #[tracing::instrument(skip(self, revoked_by))]
  pub async fn revoke_override(
    &self,
    override_id: Uuid,
    revoked_by: &str,
  ) -> Result<LevelOverride> {
    self
      .store
      .revoke_override(override_id, actor(revoked_by))
      .await
      .map_err(Error::store)?
      .ok_or(Error::OverrideNotFound(override_id))
  }

  #[tracing::instrument(skip(self, revoked_by))]
  pub async fn revoke_all_overrides(
    &self,
    student_id: Uuid,
    revoked_by: &str,
  ) -> Result<usize> {
    self.student(student_id).await?;
    self
      .store
      .revoke_all_overrides(student_id, actor(revoked_by))
      .await
      .map_err(Error::store_for(student_id))
  }

  pub async fn active_overrides(&self, student_id: Uuid) -> Result<Vec<LevelOverride>> {
    self.student(student_id).await?;
    self
      .store
      .list_active_overrides(student_id)
      .await
      .map_err(Error::store_for(student_id))
  }

  pub async fn override_history(&self, student_id: Uuid) -> Result<Vec<LevelOverride>> {
    self.student(student_id).await?;
    self
      .store
      .list_override_history(student_id)
      .await
      .map_err(Error::store_for(student_id))
  }

  // ── Snapshots ─────────────────────────────────────────────────────────

  /// Compute and append one immutable snapshot. Nothing is written if the
  /// computation fails.
  #[tracing::instrument(skip(self))]
  pub async fn generate_snapshot(
    &self,
    student_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<ProgressSnapshot> {
    let student = self.student(student_id).await?;
    self.snapshot_for(&student, now).await
  }

  pub async fn latest_snapshot(&self, student_id: Uuid) -> Result<Option<ProgressSnapshot>> {
    self
      .store
      .latest_snapshot(student_id)
      .await
      .map_err(Error::store_for(student_id))
  }

  pub async fn list_snapshots(&self, student_id: Uuid) -> Result<Vec<ProgressSnapshot>> {
    self
      .store
      .list_snapshots(student_id)
      .await
      .map_err(Error::store_for(student_id))
  }

  /// Snapshot every student. A failing student is recorded in the summary
  /// and does not stop the batch.
  #[tracing::instrument(skip(self))]
  pub async fn snapshot_all(&self, now: DateTime<Utc>) -> Result<BatchSummary> {
    let students = self.store.list_students().await.map_err(Error::store)?;
    let mut summary = BatchSummary { total: students.len(), ..Default::default() };

    for student in &students {
      match self.snapshot_for(student, now).await {
        Ok(_) => summary.written += 1,
        Err(e) => summary.failures.push(BatchFailure {
          student_id: student.student_id,
          error:      e.to_string(),
        }),
      }
    }

    debug!(
      total = summary.total,
      written = summary.written,
      failed = summary.failed(),
      "snapshot batch finished"
    );
    Ok(summary)
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  async fn student(&self, student_id: Uuid) -> Result<Student> {
    self
      .store
      .get_student(student_id)
      .await
      .map_err(Error::store_for(student_id))?
      .ok_or(Error::StudentNotFound(student_id))
  }

  async fn snapshot_for(
    &self,
    student: &Student,
    now: DateTime<Utc>,
  ) -> Result<ProgressSnapshot> {
    let student_id = student.student_id;
    let enrollment_at = student.enrollment()?;
    let pauses = self
      .store
      .list_pauses(student_id)
      .await
      .map_err(Error::store_for(student_id))?;
    let overrides = self
      .store
      .list_active_overrides(student_id)
      .await
      .map_err(Error::store_for(student_id))?;

    let days = count_days(enrollment_at, &pauses, now)?;
    let level = LevelState::compute(&self.curriculum, days, &overrides);

    let snapshot = ProgressSnapshot {
      snapshot_id:     Uuid::now_v7(),
      student_id,
      snapshot_at:     now,
      base_level:      level.resolution.base_level,
      effective_level: level.resolution.effective_level,
      phase_id:        level.phase.id,
      active_days:     level.days.active_days,
      paused_days:     level.days.paused_days,
    };

    self
      .store
      .insert_snapshot(snapshot)
      .await
      .map_err(Error::store_for(student_id))
  }
}

fn actor(name: &str) -> String {
  match name.trim() {
    "" => crate::overrides::SYSTEM_ACTOR.to_owned(),
    n => n.to_owned(),
  }
}
