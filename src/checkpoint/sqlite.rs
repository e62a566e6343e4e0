use super::{Checkpoint, CheckpointStore, SessionSummary};
use crate::errors::StorageError;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Checkpoints as rows of a single SQLite table.
///
/// The full checkpoint is stored as JSON alongside a few indexed columns used
/// for listing. Every save is one `INSERT .. ON CONFLICT DO UPDATE`, which
/// SQLite applies atomically.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the checkpoint database at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::io("creating checkpoint database directory", e))?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::init(conn)
    }

    /// In-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id TEXT PRIMARY KEY,
                question TEXT NOT NULL,
                cursor INTEGER NOT NULL,
                awaiting_approval INTEGER NOT NULL DEFAULT 0,
                checkpoint TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_checkpoints_updated ON checkpoints(updated_at);
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl CheckpointStore for SqliteStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        let json = serde_json::to_string(checkpoint)
            .map_err(|e| StorageError::serialization("serializing checkpoint", e))?;

        self.lock()?.execute(
            "INSERT INTO checkpoints (thread_id, question, cursor, awaiting_approval, checkpoint, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(thread_id) DO UPDATE SET
                question = excluded.question,
                cursor = excluded.cursor,
                awaiting_approval = excluded.awaiting_approval,
                checkpoint = excluded.checkpoint,
                updated_at = excluded.updated_at",
            params![
                checkpoint.thread_id,
                checkpoint.record.question,
                checkpoint.cursor as i64,
                checkpoint.awaiting_approval,
                json,
                checkpoint.updated_at.to_rfc3339(),
            ],
        )?;

        debug!(thread_id = %checkpoint.thread_id, cursor = checkpoint.cursor, "Checkpoint saved");
        Ok(())
    }

    fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, StorageError> {
        let json: Option<String> = self
            .lock()?
            .query_row(
                "SELECT checkpoint FROM checkpoints WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| StorageError::serialization("parsing checkpoint", e))
        })
        .transpose()
    }

    fn delete(&self, thread_id: &str) -> Result<bool, StorageError> {
        let removed = self.lock()?.execute(
            "DELETE FROM checkpoints WHERE thread_id = ?1",
            params![thread_id],
        )?;
        Ok(removed > 0)
    }

    fn list(&self) -> Result<Vec<SessionSummary>, StorageError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT thread_id, checkpoint FROM checkpoints ORDER BY updated_at DESC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (thread_id, json) = row?;
            match serde_json::from_str::<Checkpoint>(&json) {
                Ok(checkpoint) => sessions.push(SessionSummary::from(&checkpoint)),
                Err(e) => warn!(%thread_id, error = %e, "Skipping unreadable checkpoint"),
            }
        }
        // RFC 3339 strings sort lexically only within one offset; re-sort on parsed values.
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Slot, StageKind};
    use tempfile::tempdir;

    #[test]
    fn test_sqlite_roundtrip_in_memory() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut cp = Checkpoint::fresh("t1", "list customers");
        cp.record.apply(StageKind::GenerateQuery, Slot::Value("SELECT * FROM customers".into()));
        cp.record.apply(StageKind::ExecuteQuery, Slot::Failed);
        cp.cursor = 2;

        store.save(&cp).unwrap();
        assert_eq!(store.load("t1").unwrap(), Some(cp));
        assert!(store.load("missing").unwrap().is_none());
    }

    #[test]
    fn test_sqlite_save_overwrites_single_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut cp = Checkpoint::fresh("t1", "Q");
        store.save(&cp).unwrap();
        cp.cursor = 1;
        cp.awaiting_approval = true;
        store.save(&cp).unwrap();

        let sessions = store.list().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(store.load("t1").unwrap().unwrap().cursor, 1);
    }

    #[test]
    fn test_sqlite_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save(&Checkpoint::fresh("t1", "Q")).unwrap();
        assert!(store.delete("t1").unwrap());
        assert!(!store.delete("t1").unwrap());
    }

    #[test]
    fn test_sqlite_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("checkpoints.db");
        let cp = Checkpoint::fresh("t1", "Q");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save(&cp).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load("t1").unwrap(), Some(cp));
    }
}
