//! Content generation for Mentor.
//!
//! The [`ContentFacade`] is the only entry point the rest of the crate
//! uses; it validates whatever a [`ContentProvider`] returns.

pub mod facade;
pub mod gemini;
pub mod offline;
pub mod prompts;
pub mod traits;

pub use facade::{ContentFacade, FALLBACK_GOALS, FALLBACK_INTERESTS};
pub use gemini::GeminiProvider;
pub use offline::{OfflineProvider, Outage};
pub use traits::{
    ChatRequest, ContentProvider, GameItemRequest, OnboardingRequest, SafetyVerdict,
};

use crate::config::ProviderConfig;
use crate::error::{MentorError, Result};

/// Build the façade for the configured provider kind.
pub fn facade_from_config(config: &ProviderConfig, force_offline: bool) -> Result<ContentFacade> {
    if force_offline || config.kind == "offline" {
        return Ok(ContentFacade::new(OfflineProvider::new()));
    }

    match config.kind.as_str() {
        "gemini" => Ok(ContentFacade::new(GeminiProvider::from_config(config)?)),
        other => Err(MentorError::config(format!("unknown provider '{}'", other))),
    }
}
