//! Durable per-session checkpoints.
//!
//! A checkpoint is the latest snapshot of one session: its [`StateRecord`],
//! the cursor of the next stage to run, and whether the session is waiting
//! at the approval gate. Each save overwrites the previous snapshot.
//!
//! Backends:
//! - [`FileStore`]: one JSON file per session, atomic write-then-rename
//! - [`SqliteStore`]: one row per session in a SQLite table
//! - [`MemoryStore`]: process-local map for tests and interactive chat

mod file;
mod memory;
mod sqlite;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::errors::{PipelineError, StorageError};
use crate::pipeline::{STAGE_COUNT, StageKind, StateRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

const MAX_THREAD_ID_LEN: usize = 128;

/// Snapshot of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub record: StateRecord,
    /// Index of the next stage to execute; `STAGE_COUNT` once complete.
    pub cursor: usize,
    pub awaiting_approval: bool,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// A session that has not run any stage yet.
    pub fn fresh(thread_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            record: StateRecord::new(question),
            cursor: 0,
            awaiting_approval: false,
            updated_at: Utc::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= STAGE_COUNT
    }

    pub fn next_stage(&self) -> Option<StageKind> {
        StageKind::at(self.cursor)
    }

    pub fn phase(&self) -> SessionPhase {
        match self.next_stage() {
            None => SessionPhase::Completed,
            Some(_) if self.awaiting_approval => SessionPhase::AwaitingApproval,
            Some(next) => SessionPhase::Running { next },
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Where a stored session sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Interrupted between stages; `next` runs on resume.
    Running { next: StageKind },
    /// Paused at the gate before the query executes.
    AwaitingApproval,
    Completed,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Running { next } => write!(f, "interrupted before {}", next),
            SessionPhase::AwaitingApproval => write!(f, "awaiting approval"),
            SessionPhase::Completed => write!(f, "completed"),
        }
    }
}

/// Listing entry for a stored session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub thread_id: String,
    pub question: String,
    pub phase: SessionPhase,
    pub updated_at: DateTime<Utc>,
}

impl From<&Checkpoint> for SessionSummary {
    fn from(checkpoint: &Checkpoint) -> Self {
        Self {
            thread_id: checkpoint.thread_id.clone(),
            question: checkpoint.record.question.clone(),
            phase: checkpoint.phase(),
            updated_at: checkpoint.updated_at,
        }
    }
}

/// Durable key-value store of session checkpoints, keyed by thread id.
///
/// `save` must be atomic for a single writer: a reader sees either the
/// previous snapshot or the new one, never a mix. Concurrent writers to the
/// same thread id are a caller error.
pub trait CheckpointStore: Send + Sync {
    /// Overwrite the snapshot for `checkpoint.thread_id`.
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), StorageError>;

    /// Most recent snapshot, or `None` if the session does not exist.
    fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, StorageError>;

    /// Remove a session. Returns whether it existed.
    fn delete(&self, thread_id: &str) -> Result<bool, StorageError>;

    /// All stored sessions, most recently updated first.
    fn list(&self) -> Result<Vec<SessionSummary>, StorageError>;
}

/// Which checkpoint backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    #[default]
    File,
    Sqlite,
    Memory,
}

impl std::fmt::Display for CheckpointBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointBackend::File => write!(f, "file"),
            CheckpointBackend::Sqlite => write!(f, "sqlite"),
            CheckpointBackend::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for CheckpointBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(CheckpointBackend::File),
            "sqlite" => Ok(CheckpointBackend::Sqlite),
            "memory" => Ok(CheckpointBackend::Memory),
            _ => anyhow::bail!(
                "Invalid checkpoint backend '{}'. Valid values: file, sqlite, memory",
                s
            ),
        }
    }
}

/// Open the configured backend. `sessions_dir` is used by the file backend,
/// `db_path` by the sqlite backend.
pub fn open_store(
    backend: CheckpointBackend,
    sessions_dir: &Path,
    db_path: &Path,
) -> Result<Arc<dyn CheckpointStore>, StorageError> {
    let store: Arc<dyn CheckpointStore> = match backend {
        CheckpointBackend::File => Arc::new(FileStore::new(sessions_dir)?),
        CheckpointBackend::Sqlite => Arc::new(SqliteStore::open(db_path)?),
        CheckpointBackend::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}

/// Reject thread ids that cannot be used as a storage key on every backend.
pub fn validate_thread_id(thread_id: &str) -> Result<(), PipelineError> {
    let invalid = |reason: &str| PipelineError::InvalidThreadId {
        thread_id: thread_id.to_string(),
        reason: reason.to_string(),
    };

    if thread_id.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if thread_id.len() > MAX_THREAD_ID_LEN {
        return Err(invalid("must be at most 128 characters"));
    }
    if thread_id.starts_with('.') {
        return Err(invalid("must not start with '.'"));
    }
    if !thread_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(invalid("only letters, digits, '-', '_' and '.' are allowed"));
    }
    Ok(())
}

/// Generate a fresh opaque thread id.
pub fn new_thread_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn sort_newest_first(sessions: &mut [SessionSummary]) {
    sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}
