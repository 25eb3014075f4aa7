//! SQL schema for the Pathway SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Timestamps are fixed-width RFC 3339 UTC strings, so text comparison
/// matches chronological order.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Written by the student directory.
CREATE TABLE IF NOT EXISTS students (
    student_id         TEXT PRIMARY KEY,
    email              TEXT NOT NULL,
    enrollment_at      TEXT,            -- NULL only for corrupt records
    subscription_state TEXT NOT NULL DEFAULT 'active'
);

-- Written by the subscription flow. No CHECK on end >= start: corrupt
-- intervals must reach the engine so it can reject them.
CREATE TABLE IF NOT EXISTS pauses (
    pause_id    TEXT PRIMARY KEY,
    student_id  TEXT NOT NULL REFERENCES students(student_id),
    started_at  TEXT NOT NULL,
    ended_at    TEXT                    -- NULL while the pause is open
);

-- Append-only practice log.
CREATE TABLE IF NOT EXISTS practices (
    event_id     TEXT PRIMARY KEY,
    student_id   TEXT NOT NULL REFERENCES students(student_id),
    occurred_at  TEXT NOT NULL,
    metadata     TEXT NOT NULL DEFAULT 'null'
);

-- Soft-deleted: revocation stamps revoked_at/revoked_by; rows are never
-- removed.
CREATE TABLE IF NOT EXISTS level_overrides (
    override_id  TEXT PRIMARY KEY,
    student_id   TEXT NOT NULL REFERENCES students(student_id),
    kind         TEXT NOT NULL,        -- 'ADD' | 'SET' | 'MIN'
    value        INTEGER NOT NULL CHECK (value BETWEEN 1 AND 15),
    reason       TEXT NOT NULL CHECK (length(trim(reason)) > 0),
    created_at   TEXT NOT NULL,
    created_by   TEXT NOT NULL,
    revoked_at   TEXT,
    revoked_by   TEXT
);

-- Strictly append-only. No UPDATE or DELETE is ever issued.
CREATE TABLE IF NOT EXISTS progress_snapshots (
    snapshot_id      TEXT PRIMARY KEY,
    student_id       TEXT NOT NULL REFERENCES students(student_id),
    snapshot_at      TEXT NOT NULL,
    base_level       INTEGER NOT NULL,
    effective_level  INTEGER NOT NULL,
    phase_id         TEXT NOT NULL,
    active_days      INTEGER NOT NULL,
    paused_days      INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS pauses_student_idx     ON pauses(student_id);
CREATE INDEX IF NOT EXISTS practices_student_idx  ON practices(student_id, occurred_at);
CREATE INDEX IF NOT EXISTS overrides_student_idx  ON level_overrides(student_id, created_at);
CREATE INDEX IF NOT EXISTS snapshots_student_idx  ON progress_snapshots(student_id, snapshot_at);

PRAGMA user_version = 1;
";
