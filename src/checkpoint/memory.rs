use super::{Checkpoint, CheckpointStore, SessionSummary, sort_newest_first};
use crate::errors::StorageError;
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local checkpoint store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Checkpoint>>, StorageError> {
        self.entries.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl CheckpointStore for MemoryStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        self.lock()?
            .insert(checkpoint.thread_id.clone(), checkpoint.clone());
        Ok(())
    }

    fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, StorageError> {
        Ok(self.lock()?.get(thread_id).cloned())
    }

    fn delete(&self, thread_id: &str) -> Result<bool, StorageError> {
        Ok(self.lock()?.remove(thread_id).is_some())
    }

    fn list(&self) -> Result<Vec<SessionSummary>, StorageError> {
        let mut sessions: Vec<_> = self.lock()?.values().map(SessionSummary::from).collect();
        sort_newest_first(&mut sessions);
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip_and_delete() {
        let store = MemoryStore::new();
        let mut cp = Checkpoint::fresh("t1", "Q");
        cp.cursor = 1;
        store.save(&cp).unwrap();
        assert_eq!(store.load("t1").unwrap(), Some(cp));
        assert_eq!(store.list().unwrap().len(), 1);
        assert!(store.delete("t1").unwrap());
        assert!(store.load("t1").unwrap().is_none());
    }

    #[test]
    fn test_memory_store_isolates_sessions() {
        let store = MemoryStore::new();
        store.save(&Checkpoint::fresh("a", "QA")).unwrap();
        store.save(&Checkpoint::fresh("b", "QB")).unwrap();
        assert_eq!(store.load("a").unwrap().unwrap().record.question, "QA");
        assert_eq!(store.load("b").unwrap().unwrap().record.question, "QB");
    }
}
