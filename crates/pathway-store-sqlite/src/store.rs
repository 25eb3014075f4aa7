//! [`SqliteStore`] — the SQLite implementation of [`ProgressStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use pathway_core::{
  overrides::{LevelOverride, NewOverride},
  progress::ProgressSnapshot,
  store::ProgressStore,
  student::{PauseInterval, PracticeEvent, Student, SubscriptionState},
};

use crate::{
  Result,
  encode::{
    RawOverride, RawPause, RawPractice, RawSnapshot, RawStudent, encode_dt,
    encode_uuid, now, stored,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Pathway store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    debug!(path = %path.display(), "opening sqlite store");
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn fetch_overrides(
    &self,
    student_id: Uuid,
    active_only: bool,
  ) -> Result<Vec<LevelOverride>> {
    let id_str = encode_uuid(student_id);

    let raws: Vec<RawOverride> = self
      .conn
      .call(move |conn| {
        let filter = if active_only { "AND revoked_at IS NULL" } else { "" };
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM level_overrides
           WHERE student_id = ?1 {filter}
           ORDER BY created_at, override_id",
          RawOverride::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawOverride::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawOverride::into_override).collect()
  }

  // ── Collaborator-side writes ──────────────────────────────────────────────
  //
  // The engine never calls these. They stand in for the student directory,
  // subscription flow and practice recorder.

  pub async fn add_student(
    &self,
    email: impl Into<String>,
    enrollment_at: Option<DateTime<Utc>>,
  ) -> Result<Student> {
    let enrollment_at = enrollment_at.map(stored);
    let student = Student {
      student_id: Uuid::new_v4(),
      email: email.into(),
      enrollment_at,
      subscription_state: SubscriptionState::Active,
    };

    let id_str = encode_uuid(student.student_id);
    let email = student.email.clone();
    let enrolled_str = enrollment_at.map(encode_dt);
    let state_str = student.subscription_state.to_string();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO students (student_id, email, enrollment_at, subscription_state)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, email, enrolled_str, state_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(student)
  }

  /// Returns `false` if the student does not exist.
  pub async fn set_subscription_state(
    &self,
    student_id: Uuid,
    state: SubscriptionState,
  ) -> Result<bool> {
    let id_str = encode_uuid(student_id);
    let state_str = state.to_string();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE students SET subscription_state = ?2 WHERE student_id = ?1",
          rusqlite::params![id_str, state_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  /// Record a pause as given. No validation happens here; a corrupt interval
  /// is stored and later rejected by the engine.
  pub async fn record_pause(
    &self,
    student_id: Uuid,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
  ) -> Result<PauseInterval> {
    let (start, end) = (stored(start), end.map(stored));
    let pause = PauseInterval { pause_id: Uuid::new_v4(), student_id, start, end };

    let pause_str = encode_uuid(pause.pause_id);
    let student_str = encode_uuid(student_id);
    let start_str = encode_dt(start);
    let end_str = end.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO pauses (pause_id, student_id, started_at, ended_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![pause_str, student_str, start_str, end_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(pause)
  }

  /// Close an open pause. Returns `None` if the pause is unknown; closing an
  /// already closed pause leaves it untouched.
  pub async fn close_pause(
    &self,
    pause_id: Uuid,
    end: DateTime<Utc>,
  ) -> Result<Option<PauseInterval>> {
    let id_str = encode_uuid(pause_id);
    let end_str = encode_dt(end);

    let raw: Option<RawPause> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "UPDATE pauses SET ended_at = ?2 WHERE pause_id = ?1 AND ended_at IS NULL",
          rusqlite::params![id_str, end_str],
        )?;
        let row = tx
          .query_row(
            &format!("SELECT {} FROM pauses WHERE pause_id = ?1", RawPause::COLUMNS),
            rusqlite::params![id_str],
            RawPause::from_row,
          )
          .optional()?;
        tx.commit()?;
        Ok(row)
      })
      .await?;

    raw.map(RawPause::into_pause).transpose()
  }

  pub async fn record_practice(
    &self,
    student_id: Uuid,
    occurred_at: DateTime<Utc>,
    metadata: serde_json::Value,
  ) -> Result<PracticeEvent> {
    let occurred_at = stored(occurred_at);
    let event = PracticeEvent { event_id: Uuid::new_v4(), student_id, occurred_at, metadata };

    let event_str = encode_uuid(event.event_id);
    let student_str = encode_uuid(student_id);
    let at_str = encode_dt(occurred_at);
    let metadata_str = serde_json::to_string(&event.metadata)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO practices (event_id, student_id, occurred_at, metadata)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![event_str, student_str, at_str, metadata_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(event)
  }
}

// ─── ProgressStore impl ──────────────────────────────────────────────────────

impl ProgressStore for SqliteStore {
  type Error = crate::Error;

  // ── Collaborator data ─────────────────────────────────────────────────────

  async fn get_student(&self, student_id: Uuid) -> Result<Option<Student>> {
    let id_str = encode_uuid(student_id);

    let raw: Option<RawStudent> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {} FROM students WHERE student_id = ?1",
              RawStudent::COLUMNS
            ),
            rusqlite::params![id_str],
            RawStudent::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawStudent::into_student).transpose()
  }

  async fn list_students(&self) -> Result<Vec<Student>> {
    let raws: Vec<RawStudent> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM students ORDER BY student_id",
          RawStudent::COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawStudent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStudent::into_student).collect()
  }

  async fn list_pauses(&self, student_id: Uuid) -> Result<Vec<PauseInterval>> {
    let id_str = encode_uuid(student_id);

    let raws: Vec<RawPause> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM pauses WHERE student_id = ?1 ORDER BY started_at",
          RawPause::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawPause::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPause::into_pause).collect()
  }

  async fn list_practices(
    &self,
    student_id: Uuid,
    until: DateTime<Utc>,
  ) -> Result<Vec<PracticeEvent>> {
    let id_str = encode_uuid(student_id);
    let until_str = encode_dt(until);

    let raws: Vec<RawPractice> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM practices
           WHERE student_id = ?1 AND occurred_at <= ?2
           ORDER BY occurred_at",
          RawPractice::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str, until_str], RawPractice::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPractice::into_practice).collect()
  }

  // ── Overrides ─────────────────────────────────────────────────────────────

  async fn insert_override(&self, input: NewOverride) -> Result<LevelOverride> {
    let created = LevelOverride {
      override_id: Uuid::now_v7(),
      student_id:  input.student_id,
      kind:        input.kind,
      value:       input.value,
      reason:      input.reason,
      created_at:  now(),
      created_by:  input.created_by,
      revoked_at:  None,
      revoked_by:  None,
    };

    let id_str      = encode_uuid(created.override_id);
    let student_str = encode_uuid(created.student_id);
    let kind_str    = created.kind.to_string();
    let value       = i64::from(created.value);
    let reason      = created.reason.clone();
    let at_str      = encode_dt(created.created_at);
    let by          = created.created_by.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO level_overrides (
             override_id, student_id, kind, value, reason, created_at, created_by
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![id_str, student_str, kind_str, value, reason, at_str, by],
        )?;
        Ok(())
      })
      .await?;

    Ok(created)
  }

  async fn revoke_override(
    &self,
    override_id: Uuid,
    revoked_by: String,
  ) -> Result<Option<LevelOverride>> {
    let id_str = encode_uuid(override_id);
    let at_str = encode_dt(now());

    let raw: Option<RawOverride> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "UPDATE level_overrides SET revoked_at = ?2, revoked_by = ?3
           WHERE override_id = ?1 AND revoked_at IS NULL",
          rusqlite::params![id_str, at_str, revoked_by],
        )?;
        let row = tx
          .query_row(
            &format!(
              "SELECT {} FROM level_overrides WHERE override_id = ?1",
              RawOverride::COLUMNS
            ),
            rusqlite::params![id_str],
            RawOverride::from_row,
          )
          .optional()?;
        tx.commit()?;
        Ok(row)
      })
      .await?;

    raw.map(RawOverride::into_override).transpose()
  }

  async fn revoke_all_overrides(
    &self,
    student_id: Uuid,
    revoked_by: String,
  ) -> Result<usize> {
    let id_str = encode_uuid(student_id);
    let at_str = encode_dt(now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE level_overrides SET revoked_at = ?2, revoked_by = ?3
           WHERE student_id = ?1 AND revoked_at IS NULL",
          rusqlite::params![id_str, at_str, revoked_by],
        )?)
      })
      .await?;

    Ok(changed)
  }

  async fn list_active_overrides(&self, student_id: Uuid) -> Result<Vec<LevelOverride>> {
    self.fetch_overrides(student_id, true).await
  }

  async fn list_override_history(&self, student_id: Uuid) -> Result<Vec<LevelOverride>> {
    self.fetch_overrides(student_id, false).await
  }

  // ── Snapshots ─────────────────────────────────────────────────────────────

  async fn insert_snapshot(&self, snapshot: ProgressSnapshot) -> Result<ProgressSnapshot> {
    let snapshot =
      ProgressSnapshot { snapshot_at: stored(snapshot.snapshot_at), ..snapshot };

    let id_str      = encode_uuid(snapshot.snapshot_id);
    let student_str = encode_uuid(snapshot.student_id);
    let at_str      = encode_dt(snapshot.snapshot_at);
    let base        = i64::from(snapshot.base_level);
    let effective   = i64::from(snapshot.effective_level);
    let phase_id    = snapshot.phase_id.clone();
    let active      = i64::from(snapshot.active_days);
    let paused      = i64::from(snapshot.paused_days);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO progress_snapshots (
             snapshot_id, student_id, snapshot_at, base_level, effective_level,
             phase_id, active_days, paused_days
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str,
            student_str,
            at_str,
            base,
            effective,
            phase_id,
            active,
            paused,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(snapshot)
  }

  async fn latest_snapshot(&self, student_id: Uuid) -> Result<Option<ProgressSnapshot>> {
    let id_str = encode_uuid(student_id);

    let raw: Option<RawSnapshot> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {} FROM progress_snapshots
               WHERE student_id = ?1
               ORDER BY snapshot_at DESC, snapshot_id DESC
               LIMIT 1",
              RawSnapshot::COLUMNS
            ),
            rusqlite::params![id_str],
            RawSnapshot::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSnapshot::into_snapshot).transpose()
  }

  async fn list_snapshots(&self, student_id: Uuid) -> Result<Vec<ProgressSnapshot>> {
    let id_str = encode_uuid(student_id);

    let raws: Vec<RawSnapshot> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM progress_snapshots
           WHERE student_id = ?1
           ORDER BY snapshot_at DESC, snapshot_id DESC",
          RawSnapshot::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawSnapshot::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSnapshot::into_snapshot).collect()
  }
}
