//! Content provider trait for Mentor.
//!
//! A provider is the external generative service: it classifies text for
//! safety and produces personas, roadmaps, quiz items and chat replies.
//! Structured contracts are enforced one level up, by the façade.

use serde::{Deserialize, Serialize};

use crate::core::model::{GameContent, Message, Roadmap, TeacherPersona, UserPreferences};
use crate::error::Result;

/// Verdict of the safety classifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyVerdict {
    /// Whether the text may be used.
    pub is_safe: bool,
    /// Short explanation when the text is unsafe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SafetyVerdict {
    /// A passing verdict.
    pub fn safe() -> Self {
        Self {
            is_safe: true,
            reason: None,
        }
    }

    /// A failing verdict with a reason.
    pub fn flagged(reason: impl Into<String>) -> Self {
        Self {
            is_safe: false,
            reason: Some(reason.into()),
        }
    }
}

/// Request for one vocabulary quiz item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameItemRequest<'a> {
    pub target_language: &'a str,
    pub native_language: &'a str,
    pub level: &'a str,
    pub theme: &'a str,
    /// Concept to reinforce; `None` asks for a fresh concept.
    pub prior_concept: Option<&'a str>,
}

impl<'a> GameItemRequest<'a> {
    /// Build a request from a learner's preferences.
    pub fn for_learner(
        preferences: &'a UserPreferences,
        theme: &'a str,
        prior_concept: Option<&'a str>,
    ) -> Self {
        Self {
            target_language: &preferences.target_language,
            native_language: &preferences.native_language,
            level: &preferences.level,
            theme,
            prior_concept,
        }
    }
}

/// Request for one tutor chat turn.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    /// Conversation so far, not including `message`.
    pub history: &'a [Message],
    pub message: &'a str,
    pub persona: &'a TeacherPersona,
    pub target_language: &'a str,
    pub native_language: &'a str,
    pub level: &'a str,
    /// Topic of the previous session, if any.
    pub last_topic: Option<&'a str>,
}

/// Request for one onboarding chat turn.
#[derive(Debug, Clone, Copy)]
pub struct OnboardingRequest<'a> {
    /// Conversation so far, not including `message`.
    pub history: &'a [Message],
    pub message: &'a str,
    /// Interests collected on the welcome screen; empty when unknown.
    pub known_interests: &'a str,
}

/// External content generator.
///
/// Every call is a single blocking request. Implementations report
/// transport failures as [`MentorError::Provider`] and undecodable
/// payloads as [`MentorError::MalformedResponse`].
///
/// [`MentorError::Provider`]: crate::error::MentorError::Provider
/// [`MentorError::MalformedResponse`]: crate::error::MentorError::MalformedResponse
pub trait ContentProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Classify text against the prohibited-topic list.
    fn check_safety(&self, text: &str) -> Result<SafetyVerdict>;

    /// Reply to an onboarding turn. May be empty.
    fn onboarding_reply(&self, request: &OnboardingRequest<'_>) -> Result<String>;

    /// Create a teacher persona.
    fn generate_persona(&self, preferences: &UserPreferences) -> Result<TeacherPersona>;

    /// Create a four-week roadmap.
    fn generate_roadmap(&self, preferences: &UserPreferences) -> Result<Roadmap>;

    /// Create one multiple-choice item.
    fn generate_game_item(&self, request: &GameItemRequest<'_>) -> Result<GameContent>;

    /// Reply to a tutor turn. May contain the feedback marker.
    fn chat(&self, request: &ChatRequest<'_>) -> Result<String>;
}

impl<T: ContentProvider + ?Sized> ContentProvider for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn check_safety(&self, text: &str) -> Result<SafetyVerdict> {
        (**self).check_safety(text)
    }

    fn onboarding_reply(&self, request: &OnboardingRequest<'_>) -> Result<String> {
        (**self).onboarding_reply(request)
    }

    fn generate_persona(&self, preferences: &UserPreferences) -> Result<TeacherPersona> {
        (**self).generate_persona(preferences)
    }

    fn generate_roadmap(&self, preferences: &UserPreferences) -> Result<Roadmap> {
        (**self).generate_roadmap(preferences)
    }

    fn generate_game_item(&self, request: &GameItemRequest<'_>) -> Result<GameContent> {
        (**self).generate_game_item(request)
    }

    fn chat(&self, request: &ChatRequest<'_>) -> Result<String> {
        (**self).chat(request)
    }
}
