//! Deterministic offline provider.
//!
//! Produces canned personas, roadmaps, quiz items and replies without any
//! network access. Used by `mentor play --offline` and throughout the
//! tests, where outages can be switched on to exercise failure paths.

use std::sync::{Arc, Mutex};

use crate::core::model::{
    is_beginner_level, GameContent, Role, Roadmap, TeacherPersona, UserPreferences,
    WeeklyGoal, FEEDBACK_MARKER, GAME_OPTIONS, ROADMAP_WEEKS,
};
use crate::error::{MentorError, Result};
use crate::provider::traits::{
    ChatRequest, ContentProvider, GameItemRequest, OnboardingRequest, SafetyVerdict,
};

/// Words the offline classifier rejects out of the box.
const DEFAULT_FLAGGED: &[&str] = &[
    "politic", "religio", "drug", "alcohol", "dating", "violence", "terror", "racis",
];

const FEEDBACK_WORDS: &[&str] = &["feedback", "bug", "love the app", "the lessons are"];

/// (English, German, Spanish, French)
const VOCABULARY: &[Entry] = &[
    ("hello", "Hallo", "Hola", "Bonjour"),
    ("thank you", "Danke", "Gracias", "Merci"),
    ("please", "Bitte", "Por favor", "S'il vous plaît"),
    ("goodbye", "Tschüss", "Adiós", "Au revoir"),
    ("good morning", "Guten Morgen", "Buenos días", "Bonjour le matin"),
    ("excuse me", "Entschuldigung", "Perdón", "Excusez-moi"),
    ("water", "Wasser", "Agua", "Eau"),
    ("bread", "Brot", "Pan", "Pain"),
];

/// Failure mode injected into every matching call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outage {
    /// Safety classifier calls fail.
    Classifier,
    /// Every generation call fails with a provider error.
    Generation,
    /// Generation calls succeed but violate their contracts.
    Malformed,
}

#[derive(Debug, Default)]
struct OfflineState {
    outage: Option<Outage>,
    items_served: usize,
}

/// Offline content provider.
///
/// Clones share outage state, so a test can keep a handle after handing
/// the provider to a façade.
#[derive(Debug, Clone)]
pub struct OfflineProvider {
    flagged: Vec<String>,
    state: Arc<Mutex<OfflineState>>,
}

impl Default for OfflineProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflineProvider {
    pub fn new() -> Self {
        Self {
            flagged: DEFAULT_FLAGGED.iter().map(|w| w.to_string()).collect(),
            state: Arc::new(Mutex::new(OfflineState::default())),
        }
    }

    /// Also reject text containing `word` (case-insensitive).
    pub fn with_flagged_word(mut self, word: &str) -> Self {
        self.flagged.push(word.to_lowercase());
        self
    }

    /// Inject a failure mode until [`restore`](Self::restore) is called.
    pub fn set_outage(&self, outage: Outage) {
        self.lock().outage = Some(outage);
    }

    /// Clear any injected failure mode.
    pub fn restore(&self) {
        self.lock().outage = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, OfflineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn outage(&self) -> Option<Outage> {
        self.lock().outage
    }

    /// Fail generation calls during a generation outage.
    fn generation_guard(&self, what: &str) -> Result<bool> {
        match self.outage() {
            Some(Outage::Generation) => Err(MentorError::provider(format!(
                "offline provider unavailable ({})",
                what
            ))),
            Some(Outage::Malformed) => Ok(true),
            _ => Ok(false),
        }
    }
}

type Entry = (&'static str, &'static str, &'static str, &'static str);

fn word_for(entry: &Entry, language: &str) -> &'static str {
    match language.to_lowercase().as_str() {
        "spanish" => entry.2,
        "french" => entry.3,
        _ => entry.1,
    }
}

fn seed_from(text: &str) -> u32 {
    text.bytes()
        .fold(17u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32))
}

impl ContentProvider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    fn check_safety(&self, text: &str) -> Result<SafetyVerdict> {
        match self.outage() {
            Some(Outage::Classifier) => {
                return Err(MentorError::provider("offline classifier unavailable"))
            }
            Some(Outage::Malformed) => {
                return Err(MentorError::malformed("classifier returned no verdict"))
            }
            _ => {}
        }

        let lowered = text.to_lowercase();
        Ok(
            match self.flagged.iter().find(|word| lowered.contains(word.as_str())) {
                Some(word) => SafetyVerdict::flagged(format!("mentions '{}'", word)),
                None => SafetyVerdict::safe(),
            },
        )
    }

    fn onboarding_reply(&self, request: &OnboardingRequest<'_>) -> Result<String> {
        self.generation_guard("onboarding")?;

        let turn = request
            .history
            .iter()
            .filter(|m| m.role == Role::User)
            .count()
            + 1;

        Ok(match turn {
            1 => "Great goal! How many minutes a day can you practise?".to_string(),
            2 => "Perfect. Do you have anything else to add?".to_string(),
            _ => String::new(),
        })
    }

    fn generate_persona(&self, preferences: &UserPreferences) -> Result<TeacherPersona> {
        let malformed = self.generation_guard("persona")?;

        let (name, catchphrase) = match preferences.target_language.to_lowercase().as_str() {
            "german" => ("Lena", "Los geht's!"),
            "spanish" => ("Diego", "¡Vamos!"),
            "french" => ("Camille", "Allez, on y va !"),
            _ => ("Sam", "Let's go!"),
        };

        Ok(TeacherPersona {
            name: if malformed { String::new() } else { name.to_string() },
            age: 29 + seed_from(&preferences.interests) % 20,
            personality: "Patient and upbeat".to_string(),
            teaching_style: format!("Conversational, built around {}", preferences.interests),
            catchphrase: catchphrase.to_string(),
            avatar_seed: seed_from(&preferences.target_language) % 1000 + 1,
        })
    }

    fn generate_roadmap(&self, preferences: &UserPreferences) -> Result<Roadmap> {
        let malformed = self.generation_guard("roadmap")?;

        let interest = preferences
            .interests
            .split(',')
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or("Culture");
        let themes = [
            ("Greetings and introductions", "Saying hello and talking about yourself"),
            ("Everyday situations", "Shops, cafés and directions"),
            (interest, "Vocabulary around your interests"),
            ("Review and conversation", "Putting it all together"),
        ];

        let take = if malformed { ROADMAP_WEEKS - 1 } else { ROADMAP_WEEKS };
        let weeks = themes
            .iter()
            .take(take)
            .zip(1u32..)
            .map(|((theme, focus), week)| WeeklyGoal {
                week,
                theme: theme.to_string(),
                focus: focus.to_string(),
                activity: format!("Short dialogues in {}", preferences.target_language),
                completed: false,
            })
            .collect();

        Ok(Roadmap { weeks })
    }

    fn generate_game_item(&self, request: &GameItemRequest<'_>) -> Result<GameContent> {
        let malformed = self.generation_guard("game item")?;
        let target = request.target_language;

        let index = match request
            .prior_concept
            .and_then(|c| VOCABULARY.iter().position(|e| word_for(e, target) == c))
        {
            Some(index) => index,
            None => {
                let mut state = self.lock();
                state.items_served += 1;
                state.items_served % VOCABULARY.len()
            }
        };
        let entry = &VOCABULARY[index];
        let answer = word_for(entry, target);

        let mut options: Vec<String> = (0..GAME_OPTIONS)
            .map(|offset| word_for(&VOCABULARY[(index + offset) % VOCABULARY.len()], target))
            .map(str::to_string)
            .collect();
        // Deterministic shuffle so the answer is not always first
        options.rotate_left(index % GAME_OPTIONS);

        let correct_answer = if malformed {
            format!("{}?", answer)
        } else {
            answer.to_string()
        };

        let question = if is_beginner_level(request.level) {
            format!("How do you say '{}' in {}?", entry.0, target)
        } else {
            format!("Which {} word means '{}'?", target, entry.0)
        };

        Ok(GameContent {
            question,
            options,
            correct_answer,
            explanation: format!("'{}' means '{}'.", answer, entry.0),
            concept: answer.to_string(),
            category: request.theme.to_string(),
        })
    }

    fn chat(&self, request: &ChatRequest<'_>) -> Result<String> {
        if self.generation_guard("chat")? {
            return Err(MentorError::malformed("chat reply had no text"));
        }

        let lowered = request.message.to_lowercase();
        if FEEDBACK_WORDS.iter().any(|w| lowered.contains(w)) {
            return Ok(format!(
                "Thanks for telling me! I'll pass that on to the team. {}",
                FEEDBACK_MARKER
            ));
        }

        let turns = request.history.iter().filter(|m| m.role == Role::Model).count();
        Ok(format!(
            "{} here. Nice! Let's keep practising {}: try saying \"{}\" in {} (turn {}).",
            request.persona.name,
            request.target_language,
            request.message.trim(),
            request.target_language,
            turns + 1
        ))
    }
}

/// Transcript helper used by tests of the chat flows.
#[cfg(test)]
pub(crate) fn transcript(lines: &[(Role, &str)]) -> Vec<crate::core::model::Message> {
    lines
        .iter()
        .map(|(role, text)| crate::core::model::Message {
            role: *role,
            text: text.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs() -> UserPreferences {
        UserPreferences {
            native_language: "English".to_string(),
            target_language: "German".to_string(),
            level: "Beginner (A1)".to_string(),
            goals: "Travel".to_string(),
            interests: "Travel, Tech".to_string(),
            learning_style: String::new(),
        }
    }

    #[test]
    fn test_classifier_flags_default_words() {
        let provider = OfflineProvider::new();
        assert!(provider.check_safety("Hallo, ich heiße Alex").unwrap().is_safe);
        assert!(!provider.check_safety("Let's talk POLITICS").unwrap().is_safe);
    }

    #[test]
    fn test_outage_is_shared_between_clones() {
        let provider = OfflineProvider::new();
        let handle = provider.clone();
        handle.set_outage(Outage::Classifier);
        assert!(provider.check_safety("hi").is_err());

        handle.restore();
        assert!(provider.check_safety("hi").is_ok());
    }

    #[test]
    fn test_roadmap_has_four_weeks() {
        let roadmap = OfflineProvider::new().generate_roadmap(&prefs()).unwrap();
        assert_eq!(roadmap.weeks.len(), ROADMAP_WEEKS);
        assert_eq!(roadmap.weeks[2].theme, "Travel");
    }

    #[test]
    fn test_game_item_reinforces_prior_concept() {
        let provider = OfflineProvider::new();
        let preferences = prefs();
        let request = GameItemRequest::for_learner(&preferences, "Common Phrases", Some("Danke"));

        let item = provider.generate_game_item(&request).unwrap();
        assert_eq!(item.concept, "Danke");
        assert_eq!(item.correct_answer, "Danke");
        assert_eq!(item.options.len(), GAME_OPTIONS);
        assert!(item.options.contains(&item.correct_answer));
        assert!(item.question.starts_with("How do you say"));
    }

    #[test]
    fn test_fresh_items_rotate() {
        let provider = OfflineProvider::new();
        let preferences = prefs();
        let request = GameItemRequest::for_learner(&preferences, "Common Phrases", None);

        let first = provider.generate_game_item(&request).unwrap();
        let second = provider.generate_game_item(&request).unwrap();
        assert_ne!(first.concept, second.concept);
    }

    #[test]
    fn test_chat_feedback_reply_carries_marker() {
        let provider = OfflineProvider::new();
        let persona = provider.generate_persona(&prefs()).unwrap();
        let history = transcript(&[(Role::Model, "Hallo!")]);
        let request = ChatRequest {
            history: &history,
            message: "I found a bug in the games",
            persona: &persona,
            target_language: "German",
            native_language: "English",
            level: "Beginner (A1)",
            last_topic: None,
        };

        let reply = provider.chat(&request).unwrap();
        assert!(reply.ends_with(FEEDBACK_MARKER));
    }

    #[test]
    fn test_onboarding_third_reply_is_empty() {
        let provider = OfflineProvider::new();
        let history = transcript(&[
            (Role::Model, "Hi"),
            (Role::User, "Work"),
            (Role::Model, "Minutes?"),
            (Role::User, "20"),
        ]);
        let request = OnboardingRequest {
            history: &history,
            message: "no",
            known_interests: "",
        };
        assert_eq!(provider.onboarding_reply(&request).unwrap(), "");
    }
}
