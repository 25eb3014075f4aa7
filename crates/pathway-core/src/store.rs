//! The `ProgressStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `pathway-store-sqlite`). [`crate::engine::ProgressEngine`] depends on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  overrides::{LevelOverride, NewOverride},
  progress::ProgressSnapshot,
  student::{PauseInterval, PracticeEvent, Student},
};

/// Everything the engine reads, plus the two things it writes: overrides and
/// snapshots.
///
/// Student, pause and practice data are owned by external collaborators;
/// the trait only exposes reads for them. Lookups return `None` for missing
/// rows so the engine can raise its own typed errors; `Self::Error` is for
/// backend failures only.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait ProgressStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Collaborator data (read-only) ─────────────────────────────────────

  fn get_student(
    &self,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Option<Student>, Self::Error>> + Send + '_;

  fn list_students(
    &self,
  ) -> impl Future<Output = Result<Vec<Student>, Self::Error>> + Send + '_;

  /// All pause intervals for a student, open ones included, in any order.
  fn list_pauses(
    &self,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Vec<PauseInterval>, Self::Error>> + Send + '_;

  /// Practice events with `occurred_at <= until`.
  fn list_practices(
    &self,
    student_id: Uuid,
    until: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<PracticeEvent>, Self::Error>> + Send + '_;

  // ── Overrides ─────────────────────────────────────────────────────────

  /// Append a new active override. Mutations for one student must be
  /// serialised by the backend.
  fn insert_override(
    &self,
    input: NewOverride,
  ) -> impl Future<Output = Result<LevelOverride, Self::Error>> + Send + '_;

  /// Stamp `revoked_at`/`revoked_by` unless already revoked. Returns the row
  /// as it stands afterwards, or `None` if the id is unknown.
  fn revoke_override(
    &self,
    override_id: Uuid,
    revoked_by: String,
  ) -> impl Future<Output = Result<Option<LevelOverride>, Self::Error>> + Send + '_;

  /// Revoke every active override of a student; returns how many changed.
  fn revoke_all_overrides(
    &self,
    student_id: Uuid,
    revoked_by: String,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Non-revoked overrides ordered by `created_at`, then id.
  fn list_active_overrides(
    &self,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Vec<LevelOverride>, Self::Error>> + Send + '_;

  /// Every override ever issued for a student, revoked ones included.
  fn list_override_history(
    &self,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Vec<LevelOverride>, Self::Error>> + Send + '_;

  // ── Snapshots (append-only) ───────────────────────────────────────────

  /// Append a snapshot and return it exactly as stored, e.g. with
  /// `snapshot_at` reduced to the backend's timestamp precision.
  fn insert_snapshot(
    &self,
    snapshot: ProgressSnapshot,
  ) -> impl Future<Output = Result<ProgressSnapshot, Self::Error>> + Send + '_;

  /// The snapshot with the greatest `snapshot_at`.
  fn latest_snapshot(
    &self,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Option<ProgressSnapshot>, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_snapshots(
    &self,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ProgressSnapshot>, Self::Error>> + Send + '_;
}
