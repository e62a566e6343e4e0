use super::{Checkpoint, CheckpointStore, SessionSummary, sort_newest_first};
use crate::errors::StorageError;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const EXTENSION: &str = "json";

/// One pretty-printed JSON document per session in a directory.
///
/// Saves go to `<thread_id>.json.tmp` first and are renamed over the live
/// file, so a crash mid-write leaves the previous checkpoint intact.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(dir)
            .map_err(|e| StorageError::io("creating checkpoint directory", e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, thread_id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", thread_id, EXTENSION))
    }

    fn read(path: &Path) -> Result<Option<Checkpoint>, StorageError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io("opening checkpoint", e)),
        };
        let checkpoint = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| StorageError::serialization("parsing checkpoint", e))?;
        Ok(Some(checkpoint))
    }
}

impl CheckpointStore for FileStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        let path = self.path_for(&checkpoint.thread_id);
        let temp_path = path.with_extension("json.tmp");

        let file = File::create(&temp_path)
            .map_err(|e| StorageError::io("creating temp checkpoint", e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, checkpoint)
            .map_err(|e| StorageError::serialization("serializing checkpoint", e))?;
        writer
            .flush()
            .map_err(|e| StorageError::io("flushing temp checkpoint", e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| StorageError::io("syncing temp checkpoint", e))?;

        fs::rename(&temp_path, &path).map_err(|e| StorageError::io("renaming checkpoint", e))?;

        debug!(
            thread_id = %checkpoint.thread_id,
            cursor = checkpoint.cursor,
            path = %path.display(),
            "Checkpoint saved"
        );
        Ok(())
    }

    fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, StorageError> {
        Self::read(&self.path_for(thread_id))
    }

    fn delete(&self, thread_id: &str) -> Result<bool, StorageError> {
        match fs::remove_file(self.path_for(thread_id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io("removing checkpoint", e)),
        }
    }

    fn list(&self) -> Result<Vec<SessionSummary>, StorageError> {
        let entries =
            fs::read_dir(&self.dir).map_err(|e| StorageError::io("listing checkpoints", e))?;

        let mut sessions = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| StorageError::io("listing checkpoints", e))?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            match Self::read(&path) {
                Ok(Some(checkpoint)) => sessions.push(SessionSummary::from(&checkpoint)),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable checkpoint"),
            }
        }
        sort_newest_first(&mut sessions);
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Slot, StageKind};
    use chrono::Duration;
    use tempfile::tempdir;

    fn make_store() -> (FileStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = FileStore::new(&dir.path().join("sessions")).unwrap();
        (store, dir)
    }

    #[test]
    fn test_load_missing_returns_none() {
        let (store, _dir) = make_store();
        assert!(store.load("nope").unwrap().is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let (store, _dir) = make_store();
        let mut cp = Checkpoint::fresh("t1", "how many customers?");
        cp.record.apply(StageKind::GenerateQuery, Slot::Value("SELECT COUNT(*) FROM customers".into()));
        cp.cursor = 1;
        cp.awaiting_approval = true;

        store.save(&cp).unwrap();
        assert_eq!(store.load("t1").unwrap(), Some(cp));
    }

    #[test]
    fn test_failed_slot_roundtrips_as_failed() {
        let (store, _dir) = make_store();
        let mut cp = Checkpoint::fresh("t1", "Q");
        cp.record.apply(StageKind::GenerateQuery, Slot::Failed);
        cp.cursor = 1;
        store.save(&cp).unwrap();

        let loaded = store.load("t1").unwrap().unwrap();
        assert!(loaded.record.query.is_failed());
        assert!(loaded.record.result.is_pending());
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_temp_file() {
        let (store, _dir) = make_store();
        let mut cp = Checkpoint::fresh("t1", "Q");
        store.save(&cp).unwrap();
        cp.cursor = 2;
        store.save(&cp).unwrap();

        assert_eq!(store.load("t1").unwrap().unwrap().cursor, 2);
        let names: Vec<_> = fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["t1.json".to_string()]);
    }

    #[test]
    fn test_delete() {
        let (store, _dir) = make_store();
        store.save(&Checkpoint::fresh("t1", "Q")).unwrap();
        assert!(store.delete("t1").unwrap());
        assert!(!store.delete("t1").unwrap());
        assert!(store.load("t1").unwrap().is_none());
    }

    #[test]
    fn test_list_sorted_newest_first_and_skips_garbage() {
        let (store, _dir) = make_store();
        let mut older = Checkpoint::fresh("older", "Q1");
        older.updated_at = older.updated_at - Duration::minutes(5);
        store.save(&older).unwrap();
        store.save(&Checkpoint::fresh("newer", "Q2")).unwrap();
        fs::write(store.dir().join("broken.json"), "{not json").unwrap();
        fs::write(store.dir().join("notes.txt"), "ignored").unwrap();

        let sessions = store.list().unwrap();
        let ids: Vec<_> = sessions.iter().map(|s| s.thread_id.as_str()).collect();
        assert_eq!(ids, vec!["newer", "older"]);
    }

    #[test]
    fn test_recovery_after_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions");
        let mut cp = Checkpoint::fresh("t1", "Q");
        cp.cursor = 1;
        cp.awaiting_approval = true;

        {
            let store = FileStore::new(&path).unwrap();
            store.save(&cp).unwrap();
        }

        {
            let store = FileStore::new(&path).unwrap();
            assert_eq!(store.load("t1").unwrap(), Some(cp));
        }
    }
}
