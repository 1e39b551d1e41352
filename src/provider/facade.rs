//! Content generation façade.
//!
//! Wraps a [`ContentProvider`] and enforces the structured contracts the
//! session relies on: a roadmap always has four numbered weeks, a quiz item
//! always has four options containing the answer, a persona always has a
//! name. Anything else is reported as a malformed response.

use tracing::{debug, warn};

use crate::core::model::{
    GameContent, Roadmap, TeacherPersona, UserPreferences, GAME_OPTIONS, ROADMAP_WEEKS,
};
use crate::error::{FailOpen, MentorError, Result};
use crate::provider::traits::{
    ChatRequest, ContentProvider, GameItemRequest, OnboardingRequest, SafetyVerdict,
};

/// Interests used when the learner's own are unusable.
pub const FALLBACK_INTERESTS: &str = "Travel, Culture";
/// Goals used when the learner's own are unusable.
pub const FALLBACK_GOALS: &str = "General conversation";

/// Typed, validated access to the content provider.
pub struct ContentFacade {
    provider: Box<dyn ContentProvider>,
}

impl ContentFacade {
    /// Wrap a provider.
    pub fn new(provider: impl ContentProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
        }
    }

    /// Name of the wrapped provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Raw classifier verdict. Errors are returned, not swallowed.
    pub fn check_safety(&self, text: &str) -> Result<SafetyVerdict> {
        self.provider.check_safety(text)
    }

    /// Onboarding reply text, possibly empty.
    pub fn onboarding_reply(&self, request: &OnboardingRequest<'_>) -> Result<String> {
        self.provider.onboarding_reply(request)
    }

    /// Generate a persona from sanitized preferences.
    pub fn generate_persona(&self, preferences: &UserPreferences) -> Result<TeacherPersona> {
        let preferences = self.sanitize(preferences);
        let persona = self.provider.generate_persona(&preferences)?;
        validate_persona(&persona)?;
        debug!("Persona generated: {}", persona.name);
        Ok(persona)
    }

    /// Generate a four-week roadmap from sanitized preferences.
    pub fn generate_roadmap(&self, preferences: &UserPreferences) -> Result<Roadmap> {
        let preferences = self.sanitize(preferences);
        let roadmap = self.provider.generate_roadmap(&preferences)?;
        normalize_roadmap(roadmap)
    }

    /// Generate one validated quiz item.
    pub fn generate_game_item(&self, request: &GameItemRequest<'_>) -> Result<GameContent> {
        let item = self.provider.generate_game_item(request)?;
        validate_game_item(&item)?;
        Ok(item)
    }

    /// Tutor reply text.
    pub fn chat(&self, request: &ChatRequest<'_>) -> Result<String> {
        self.provider.chat(request)
    }

    /// Replace unsafe free-text interests and goals with neutral defaults.
    ///
    /// The classifier fails open here as everywhere else.
    fn sanitize(&self, preferences: &UserPreferences) -> UserPreferences {
        let mut clean = preferences.clone();

        if !self.is_acceptable(&preferences.interests) {
            warn!("Interests flagged, using neutral defaults");
            clean.interests = FALLBACK_INTERESTS.to_string();
        }
        if !self.is_acceptable(&preferences.goals) {
            warn!("Goals flagged, using neutral defaults");
            clean.goals = FALLBACK_GOALS.to_string();
        }

        clean
    }

    fn is_acceptable(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return true;
        }
        self.check_safety(text)
            .fail_open_with("Sanitation safety check failed", SafetyVerdict::safe())
            .is_safe
    }
}

fn validate_persona(persona: &TeacherPersona) -> Result<()> {
    if persona.name.trim().is_empty() {
        return Err(MentorError::malformed("persona has no name"));
    }
    Ok(())
}

/// Check week numbering and put the weeks in order.
fn normalize_roadmap(mut roadmap: Roadmap) -> Result<Roadmap> {
    if roadmap.weeks.len() != ROADMAP_WEEKS {
        return Err(MentorError::malformed(format!(
            "roadmap has {} weeks, expected {}",
            roadmap.weeks.len(),
            ROADMAP_WEEKS
        )));
    }

    roadmap.weeks.sort_by_key(|goal| goal.week);
    for (index, goal) in roadmap.weeks.iter().enumerate() {
        if goal.week as usize != index + 1 {
            return Err(MentorError::malformed(format!(
                "roadmap weeks must be numbered 1 to {}",
                ROADMAP_WEEKS
            )));
        }
    }

    Ok(roadmap)
}

fn validate_game_item(item: &GameContent) -> Result<()> {
    if item.options.len() != GAME_OPTIONS {
        return Err(MentorError::malformed(format!(
            "game item has {} options, expected {}",
            item.options.len(),
            GAME_OPTIONS
        )));
    }
    if !item.options.iter().any(|o| o == &item.correct_answer) {
        return Err(MentorError::malformed(
            "correct answer is not among the options",
        ));
    }
    if item.question.trim().is_empty() {
        return Err(MentorError::malformed("game item has no question"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::WeeklyGoal;
    use crate::provider::offline::{OfflineProvider, Outage};

    fn prefs(interests: &str, goals: &str) -> UserPreferences {
        UserPreferences {
            native_language: "English".to_string(),
            target_language: "German".to_string(),
            level: "Beginner (A1)".to_string(),
            goals: goals.to_string(),
            interests: interests.to_string(),
            learning_style: String::new(),
        }
    }

    fn week(n: u32) -> WeeklyGoal {
        WeeklyGoal {
            week: n,
            theme: format!("Theme {}", n),
            focus: "Focus".to_string(),
            activity: "Activity".to_string(),
            completed: false,
        }
    }

    fn item(options: &[&str], answer: &str) -> GameContent {
        GameContent {
            question: "How do you say 'apple'?".to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answer: answer.to_string(),
            explanation: "Apfel means apple".to_string(),
            concept: "Apfel".to_string(),
            category: "Food".to_string(),
        }
    }

    #[test]
    fn test_roadmap_is_sorted_by_week() {
        let roadmap = Roadmap {
            weeks: vec![week(3), week(1), week(4), week(2)],
        };
        let roadmap = normalize_roadmap(roadmap).unwrap();
        let order: Vec<u32> = roadmap.weeks.iter().map(|w| w.week).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_roadmap_wrong_length_is_malformed() {
        let roadmap = Roadmap {
            weeks: vec![week(1), week(2), week(3)],
        };
        assert!(matches!(
            normalize_roadmap(roadmap),
            Err(MentorError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_roadmap_duplicate_week_is_malformed() {
        let roadmap = Roadmap {
            weeks: vec![week(1), week(2), week(2), week(4)],
        };
        assert!(normalize_roadmap(roadmap).is_err());
    }

    #[test]
    fn test_game_item_validation() {
        assert!(validate_game_item(&item(&["Apfel", "Birne", "Brot", "Haus"], "Apfel")).is_ok());
        assert!(validate_game_item(&item(&["Apfel", "Birne", "Brot"], "Apfel")).is_err());
        assert!(validate_game_item(&item(&["Birne", "Brot", "Haus", "Tisch"], "Apfel")).is_err());
    }

    #[test]
    fn test_persona_without_name_is_malformed() {
        let persona = TeacherPersona {
            name: "  ".to_string(),
            age: 30,
            personality: "Calm".to_string(),
            teaching_style: "Patient".to_string(),
            catchphrase: "Ok!".to_string(),
            avatar_seed: 1,
        };
        assert!(validate_persona(&persona).is_err());
    }

    #[test]
    fn test_sanitize_replaces_flagged_fields() {
        let facade = ContentFacade::new(OfflineProvider::new().with_flagged_word("politics"));
        let clean = facade.sanitize(&prefs("politics, Tech", "Talk about politics"));
        assert_eq!(clean.interests, FALLBACK_INTERESTS);
        assert_eq!(clean.goals, FALLBACK_GOALS);
        assert_eq!(clean.target_language, "German");
    }

    #[test]
    fn test_sanitize_keeps_clean_fields() {
        let facade = ContentFacade::new(OfflineProvider::new());
        let original = prefs("Travel, Tech", "user: I want to order food");
        assert_eq!(facade.sanitize(&original), original);
    }

    #[test]
    fn test_sanitize_fails_open_when_classifier_is_down() {
        let provider = OfflineProvider::new().with_flagged_word("politics");
        provider.set_outage(Outage::Classifier);
        let facade = ContentFacade::new(provider);

        let original = prefs("politics", "politics");
        assert_eq!(facade.sanitize(&original), original);
    }

    #[test]
    fn test_generation_outage_propagates() {
        let provider = OfflineProvider::new();
        provider.set_outage(Outage::Generation);
        let facade = ContentFacade::new(provider);

        let err = facade.generate_roadmap(&prefs("Travel", "Work")).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_malformed_provider_output_is_rejected() {
        let provider = OfflineProvider::new();
        provider.set_outage(Outage::Malformed);
        let facade = ContentFacade::new(provider);
        let preferences = prefs("Travel", "Work");

        assert!(matches!(
            facade.generate_roadmap(&preferences),
            Err(MentorError::MalformedResponse { .. })
        ));
        let request = GameItemRequest::for_learner(&preferences, "Common Phrases", None);
        assert!(matches!(
            facade.generate_game_item(&request),
            Err(MentorError::MalformedResponse { .. })
        ));
    }
}
