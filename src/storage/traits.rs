//! Key-value storage traits for Mentor.
//!
//! The record store persists everything as string values under fixed,
//! versioned keys, the way a browser's local storage would. This trait is
//! the seam between the record store and the medium.

use std::sync::Arc;

use crate::error::Result;

/// Trait for key-value storage backends.
///
/// Implementations must surface write failures instead of dropping them.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key has never been written.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key.
    ///
    /// Returns `Ok(())` even if the key doesn't exist.
    fn remove(&self, key: &str) -> Result<()>;

    /// Check if a key exists.
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Lets tests keep a handle on a store that a `RecordStore` owns.
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// Test utilities for KeyValueStore implementations.
#[cfg(test)]
pub mod tests {
    use super::*;

    /// Conformance check shared by every backend.
    pub fn test_key_value_store_crud<S: KeyValueStore>(store: &S) {
        let key = "MENTOR_TEST_KEY_V1";

        assert!(!store.contains(key).unwrap());
        assert!(store.get(key).unwrap().is_none());

        store.set(key, "first").unwrap();
        assert!(store.contains(key).unwrap());
        assert_eq!(store.get(key).unwrap().as_deref(), Some("first"));

        store.set(key, "second").unwrap();
        assert_eq!(store.get(key).unwrap().as_deref(), Some("second"));

        store.remove(key).unwrap();
        assert!(!store.contains(key).unwrap());

        // Removing again should succeed
        store.remove(key).unwrap();
    }
}
