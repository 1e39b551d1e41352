//! Persistent storage for Mentor.
//!
//! This module provides the key-value medium (file-based and in-memory
//! backends) and the record store of user accounts and device moderation
//! state built on top of it.

pub mod file;
pub mod memory;
pub mod records;
pub mod traits;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use records::{allocate_id, RecordStore};
pub use traits::KeyValueStore;
