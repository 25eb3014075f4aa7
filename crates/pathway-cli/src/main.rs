//! `pathway` — command-line front end for the Pathway progress engine.
//!
//! Each invocation opens the SQLite store, runs one operation and prints the
//! result as JSON on stdout.
//!
//! # Usage
//!
//! ```
//! pathway student add ana@example.com --enrolled-at 2025-01-01T09:00:00Z
//! pathway progress 0190f1c2-...
//! pathway override create 0190f1c2-... --kind MIN --value 8 --reason "placement"
//! pathway snapshot-all
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use pathway_core::engine::ProgressEngine;
use pathway_store_sqlite::SqliteStore;
use serde::Serialize;
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Learner progress and level computation")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "pathway.toml", env = "PATHWAY_CONFIG")]
  config: PathBuf,

  /// SQLite database file; overrides `store_path` from the configuration.
  #[arg(short, long, value_name = "PATH")]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Levels, phase, active days and streak for one student.
  Progress {
    student_id: Uuid,
    /// Evaluate at this instant instead of now (RFC 3339).
    #[arg(long)]
    as_of:      Option<DateTime<Utc>>,
  },
  /// Current practice streak for one student.
  Streak {
    student_id: Uuid,
    #[arg(long)]
    as_of:      Option<DateTime<Utc>>,
  },
  /// Manage administrator level overrides.
  #[command(subcommand)]
  Override(OverrideCommand),
  /// Compute and store a progress snapshot for one student.
  Snapshot { student_id: Uuid },
  /// Snapshot every student; failures are reported, not fatal.
  SnapshotAll,
  /// The most recent stored snapshot for one student.
  Latest { student_id: Uuid },
  /// Every stored snapshot for one student, newest first.
  Snapshots { student_id: Uuid },
  /// Student directory records.
  #[command(subcommand)]
  Student(StudentCommand),
  /// Subscription pauses.
  #[command(subcommand)]
  Pause(PauseCommand),
  /// Record one practice.
  Practice {
    student_id: Uuid,
    #[arg(long)]
    at:         Option<DateTime<Utc>>,
    /// Free-form JSON payload.
    #[arg(long, default_value = "null")]
    metadata:   String,
  },
}

#[derive(Subcommand)]
enum OverrideCommand {
  /// Issue a new override; existing ones stay active.
  Create {
    student_id: Uuid,
    /// ADD, SET or MIN (case-insensitive).
    #[arg(long)]
    kind:       String,
    #[arg(long, allow_negative_numbers = true)]
    value:      i64,
    #[arg(long)]
    reason:     String,
    #[arg(long, default_value = "")]
    by:         String,
  },
  /// Revoke one override. Revoking twice is harmless.
  Revoke {
    override_id: Uuid,
    #[arg(long, default_value = "")]
    by:          String,
  },
  /// Revoke every active override of a student.
  RevokeAll {
    student_id: Uuid,
    #[arg(long, default_value = "")]
    by:         String,
  },
  /// Active overrides, or the full history with `--all`.
  List {
    student_id: Uuid,
    #[arg(long)]
    all:        bool,
  },
}

#[derive(Subcommand)]
enum StudentCommand {
  Add {
    email:       String,
    /// Defaults to now.
    #[arg(long)]
    enrolled_at: Option<DateTime<Utc>>,
  },
}

#[derive(Subcommand)]
enum PauseCommand {
  /// Open a pause; it runs until closed.
  Start {
    student_id: Uuid,
    #[arg(long)]
    at:         Option<DateTime<Utc>>,
  },
  /// Close an open pause.
  End {
    pause_id: Uuid,
    #[arg(long)]
    at:       Option<DateTime<Utc>>,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr so stdout stays machine-readable.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = Settings::load(&cli.config)?;
  let curriculum = settings
    .engine
    .validate()
    .context("invalid engine configuration")?;
  let store_path = cli.store.unwrap_or(settings.store_path);

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let engine = ProgressEngine::new(Arc::new(store), curriculum);

  run(&engine, cli.command).await
}

async fn run(engine: &ProgressEngine<SqliteStore>, command: Command) -> anyhow::Result<()> {
  let now = Utc::now();

  match command {
    Command::Progress { student_id, as_of } => {
      print(&engine.get_progress(student_id, as_of.unwrap_or(now)).await?)
    }
    Command::Streak { student_id, as_of } => {
      let streak = engine.streak(student_id, as_of.unwrap_or(now)).await?;
      print(&serde_json::json!({
        "milestone": engine.is_milestone(streak.current),
        "streak": streak,
      }))
    }
    Command::Override(cmd) => run_override(engine, cmd).await,
    Command::Snapshot { student_id } => {
      print(&engine.generate_snapshot(student_id, now).await?)
    }
    Command::SnapshotAll => {
      let summary = engine.snapshot_all(now).await?;
      if summary.failed() > 0 {
        tracing::warn!(failed = summary.failed(), "some snapshots were not written");
      }
      print(&summary)
    }
    Command::Latest { student_id } => print(&engine.latest_snapshot(student_id).await?),
    Command::Snapshots { student_id } => print(&engine.list_snapshots(student_id).await?),
    Command::Student(StudentCommand::Add { email, enrolled_at }) => {
      let student = engine
        .store()
        .add_student(email, Some(enrolled_at.unwrap_or(now)))
        .await
        .context("failed to add student")?;
      print(&student)
    }
    Command::Pause(PauseCommand::Start { student_id, at }) => {
      let pause = engine
        .store()
        .record_pause(student_id, at.unwrap_or(now), None)
        .await
        .context("failed to record pause")?;
      print(&pause)
    }
    Command::Pause(PauseCommand::End { pause_id, at }) => {
      let pause = engine
        .store()
        .close_pause(pause_id, at.unwrap_or(now))
        .await
        .context("failed to close pause")?
        .with_context(|| format!("pause not found: {pause_id}"))?;
      print(&pause)
    }
    Command::Practice { student_id, at, metadata } => {
      let metadata: serde_json::Value =
        serde_json::from_str(&metadata).context("metadata is not valid JSON")?;
      let event = engine
        .store()
        .record_practice(student_id, at.unwrap_or(now), metadata)
        .await
        .context("failed to record practice")?;
      print(&event)
    }
  }
}

async fn run_override(
  engine: &ProgressEngine<SqliteStore>,
  command: OverrideCommand,
) -> anyhow::Result<()> {
  match command {
    OverrideCommand::Create { student_id, kind, value, reason, by } => {
      print(&engine.create_override(student_id, &kind, value, &reason, &by).await?)
    }
    OverrideCommand::Revoke { override_id, by } => {
      print(&engine.revoke_override(override_id, &by).await?)
    }
    OverrideCommand::RevokeAll { student_id, by } => {
      let revoked = engine.revoke_all_overrides(student_id, &by).await?;
      print(&serde_json::json!({ "revoked": revoked }))
    }
    OverrideCommand::List { student_id, all } => {
      let overrides = if all {
        engine.override_history(student_id).await?
      } else {
        engine.active_overrides(student_id).await?
      };
      print(&overrides)
    }
  }
}

fn print(value: &impl Serialize) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("failed to encode output")?;
  println!("{json}");
  Ok(())
}
