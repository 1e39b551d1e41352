//! File-based key-value storage for Mentor.
//!
//! Each key is stored as its own file in `~/.mentor/store/`.
//! Atomic writes are achieved via temp file + rename pattern.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::config::store_dir;
use crate::error::{MentorError, Result};
use crate::storage::KeyValueStore;

/// File-based key-value store.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Directory holding one file per key.
    dir: PathBuf,
}

impl FileStore {
    /// Create a file store in the default directory.
    ///
    /// Uses `~/.mentor/store/` or `$MENTOR_HOME/store/`.
    pub fn new() -> Result<Self> {
        let dir = store_dir().ok_or_else(|| {
            MentorError::config("Could not determine store directory (no home directory)")
        })?;
        Self::with_dir(dir)
    }

    /// Create a file store in a custom directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();

        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| MentorError::storage(&dir, e))?;
        }

        Ok(Self { dir })
    }

    /// Directory backing this store.
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Keys become file names, so only a conservative character set is allowed.
    fn key_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(MentorError::config(format!("invalid storage key '{}'", key)));
        }
        Ok(self.dir.join(key))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{}.tmp", key))
    }

    /// Write a value atomically using temp file + rename.
    fn atomic_write(&self, key: &str, value: &str) -> Result<()> {
        let final_path = self.key_path(key)?;
        let temp_path = self.temp_path(key);

        {
            let mut file =
                fs::File::create(&temp_path).map_err(|e| MentorError::storage(&temp_path, e))?;
            file.write_all(value.as_bytes())
                .map_err(|e| MentorError::storage(&temp_path, e))?;
            file.sync_all()
                .map_err(|e| MentorError::storage(&temp_path, e))?;
        }

        fs::rename(&temp_path, &final_path).map_err(|e| MentorError::storage(&final_path, e))?;

        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key)?;

        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| MentorError::storage(&path, e))?;
        Ok(Some(content))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.atomic_write(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;

        if path.exists() {
            fs::remove_file(&path).map_err(|e| MentorError::storage(&path, e))?;
        }

        let temp_path = self.temp_path(key);
        if temp_path.exists() {
            let _ = fs::remove_file(&temp_path);
        }

        Ok(())
    }
}
