//! In-memory key-value storage for testing.
//!
//! Thread-safe implementation of [`KeyValueStore`] that can also be told
//! to reject writes, which stands in for a full or unavailable disk.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::{MentorError, Result};
use crate::storage::KeyValueStore;

/// In-memory key-value store.
///
/// Values are lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of keys in the store.
    pub fn len(&self) -> usize {
        self.values.read().unwrap().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.values.read().unwrap().is_empty()
    }

    /// Make every subsequent `set` and `remove` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self, key: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MentorError::storage(
                format!("memory://{}", key),
                io::Error::new(io::ErrorKind::StorageFull, "quota exceeded"),
            ));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.read().unwrap();
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_writable(key)?;
        let mut values = self.values.write().unwrap();
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.check_writable(key)?;
        let mut values = self.values.write().unwrap();
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::tests::test_key_value_store_crud;

    #[test]
    fn test_memory_store_crud() {
        let store = MemoryStore::new();
        test_key_value_store_crud(&store);
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_len_tracks_keys() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.set("a", "3").unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_failed_writes_are_reported() {
        let store = MemoryStore::new();
        store.set("kept", "yes").unwrap();

        store.set_fail_writes(true);
        let err = store.set("lost", "no").unwrap_err();
        assert!(matches!(err, MentorError::Storage { .. }));
        assert!(store.remove("kept").is_err());

        // Reads still work and nothing was changed
        assert_eq!(store.get("kept").unwrap().as_deref(), Some("yes"));
        assert!(store.get("lost").unwrap().is_none());

        store.set_fail_writes(false);
        store.set("lost", "now").unwrap();
        assert_eq!(store.get("lost").unwrap().as_deref(), Some("now"));
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(MemoryStore::new());
        let mut handles = vec![];

        for i in 0..10 {
            let store_clone = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                let key = format!("k{}", i);
                store_clone.set(&key, "v").unwrap();
                store_clone.get(&key).unwrap();
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 10);
    }
}
