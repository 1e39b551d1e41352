//! Unified error types for Mentor.
//!
//! Two classes of failure exist: transient external-service failures
//! (the content provider) which callers recover from locally, and local
//! faults (storage, config, illegal transitions) which are always
//! surfaced. Fail-open handling is opt-in through [`FailOpen`] and is
//! only used where it is the product decision, such as the safety
//! classifier.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Mentor operations.
#[derive(Error, Debug)]
pub enum MentorError {
    /// I/O errors from the record store.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON or TOML parsing/serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },

    /// The content provider could not be reached or returned an error.
    #[error("provider error: {message}")]
    Provider { message: String },

    /// The content provider answered with data that violates its contract.
    #[error("malformed provider response: {message}")]
    MalformedResponse { message: String },

    /// An event that is not legal in the current session state.
    #[error("invalid transition: {message}")]
    InvalidTransition { message: String },

    /// A request from the same session is still outstanding.
    #[error("a request is already in progress")]
    Busy,

    /// No stored user carries this id.
    #[error("user not found: {user_id}")]
    UserNotFound { user_id: String },

    /// The account is banned and its record is read-only.
    #[error("account suspended: {user_id}")]
    AccountSuspended { user_id: String },

    /// Every account code in the configured space is taken.
    #[error("account id space exhausted ({capacity} codes allocated)")]
    IdSpaceExhausted { capacity: u32 },
}

/// A specialized Result type for Mentor operations.
pub type Result<T> = std::result::Result<T, MentorError>;

impl MentorError {
    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a provider error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Create a malformed response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Create an invalid transition error.
    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::InvalidTransition {
            message: message.into(),
        }
    }

    /// Create a user not found error.
    pub fn user_not_found(user_id: impl Into<String>) -> Self {
        Self::UserNotFound {
            user_id: user_id.into(),
        }
    }

    /// Create an account suspended error.
    pub fn account_suspended(user_id: impl Into<String>) -> Self {
        Self::AccountSuspended {
            user_id: user_id.into(),
        }
    }

    /// Check if this error came from the external content provider.
    ///
    /// Transient errors leave persisted state untouched and are retried by
    /// the user re-triggering the action.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::MalformedResponse { .. })
    }
}

impl From<io::Error> for MentorError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for MentorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Trait for fail-open error handling.
///
/// Logs the error and substitutes a value instead of propagating.
pub trait FailOpen<T> {
    /// Handle an error by logging a warning and returning the default value.
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default;

    /// Handle an error by logging a warning and returning the provided fallback.
    fn fail_open_with(self, context: &str, fallback: T) -> T;
}

impl<T> FailOpen<T> for Result<T> {
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using default)", context, err);
                T::default()
            }
        }
    }

    fn fail_open_with(self, context: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using fallback)", context, err);
                fallback
            }
        }
    }
}

/// Process exit codes for the `mentor` binary.
pub mod exit_codes {
    /// The command completed.
    pub const SUCCESS: i32 = 0;

    /// The command failed with a reported error.
    pub const ERROR: i32 = 1;

    /// The process panicked; details are in `crash.log`.
    pub const CRASH: i32 = 3;
}
