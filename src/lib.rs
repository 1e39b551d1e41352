//! Mentor - personal language-learning companion
//!
//! Mentor interviews a new learner, generates an AI teacher persona and a
//! four-week roadmap, then offers a tutor chat and a vocabulary game.
//! Learner text is screened by a two-strike moderation gate, and all
//! records live in a local key-value store.

pub mod cli;
pub mod config;
pub mod core;
pub mod driver;
pub mod error;
pub mod provider;
pub mod storage;

pub use config::Config;
pub use core::{Effect, Event, ModerationGate, Session, User, View};
pub use driver::App;
pub use error::{MentorError, Result};
pub use provider::{facade_from_config, ContentFacade, ContentProvider};
pub use storage::{FileStore, KeyValueStore, MemoryStore, RecordStore};
