//! Mini-game state.
//!
//! The vocabulary game repeats one concept a few times before moving on.
//! The round tracks which concept is being reinforced and tells the
//! session what to ask the façade for next; the façade only fulfils each
//! individual request.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::PracticeConfig;
use crate::core::model::GameContent;
use crate::error::{MentorError, Result};

/// Games listed in the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Vocab,
    Speak,
    Listen,
    Read,
}

impl GameKind {
    /// Every game, in hub order.
    pub const ALL: [GameKind; 4] = [
        GameKind::Vocab,
        GameKind::Speak,
        GameKind::Listen,
        GameKind::Read,
    ];

    /// Parse a game identifier.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "vocab" => Some(GameKind::Vocab),
            "speak" => Some(GameKind::Speak),
            "listen" => Some(GameKind::Listen),
            "read" => Some(GameKind::Read),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameKind::Vocab => "vocab",
            GameKind::Speak => "speak",
            GameKind::Listen => "listen",
            GameKind::Read => "read",
        }
    }

    /// Title shown in the hub.
    pub fn title(&self) -> &'static str {
        match self {
            GameKind::Vocab => "Vocab Master",
            GameKind::Speak => "Speak Up",
            GameKind::Listen => "Listening",
            GameKind::Read => "Story Time",
        }
    }

    /// Only the vocabulary game can be played; the rest are "coming soon".
    pub fn is_playable(&self) -> bool {
        matches!(self, GameKind::Vocab)
    }
}

/// How many times a concept is repeated before rotating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepetitionRange {
    pub min: u32,
    pub max: u32,
}

impl RepetitionRange {
    pub fn from_config(config: &PracticeConfig) -> Self {
        let min = config.min_repetitions.max(1);
        Self {
            min,
            max: config.max_repetitions.max(min),
        }
    }

    fn draw<R: Rng>(&self, rng: &mut R) -> u32 {
        rng.gen_range(self.min..=self.max)
    }
}

impl Default for RepetitionRange {
    fn default() -> Self {
        Self::from_config(&PracticeConfig::default())
    }
}

/// What happened when an option was picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub correct_answer: String,
    pub explanation: String,
    /// The streak just reached the feedback threshold.
    pub feedback_prompt: bool,
}

/// An in-progress vocabulary round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabRound {
    concept: Option<String>,
    reps: u32,
    max_reps: u32,
    correct_streak: u32,
    item: Option<GameContent>,
    selected: Option<String>,
    feedback_prompt: bool,
}

impl VocabRound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the next item should introduce a new concept.
    pub fn needs_new_concept(&self) -> bool {
        self.concept.is_none() || self.reps >= self.max_reps
    }

    /// Concept to reinforce with the next item, if any.
    pub fn prior_concept(&self) -> Option<&str> {
        if self.needs_new_concept() {
            None
        } else {
            self.concept.as_deref()
        }
    }

    /// Install a freshly fetched item.
    pub fn accept_item<R: Rng>(&mut self, item: GameContent, range: RepetitionRange, rng: &mut R) {
        if self.needs_new_concept() {
            self.reps = 1;
            self.max_reps = range.draw(rng);
        } else {
            self.reps += 1;
        }
        self.concept = Some(item.concept.clone());
        self.item = Some(item);
        self.selected = None;
    }

    /// Pick an option for the current item. Each item can be answered once.
    pub fn answer(&mut self, option: &str, feedback_streak: u32) -> Result<AnswerOutcome> {
        let item = self
            .item
            .as_ref()
            .ok_or_else(|| MentorError::invalid_transition("no question loaded"))?;
        if self.selected.is_some() {
            return Err(MentorError::invalid_transition(
                "this question was already answered",
            ));
        }
        if !item.options.iter().any(|o| o == option) {
            return Err(MentorError::invalid_transition(format!(
                "'{}' is not one of the options",
                option
            )));
        }

        let correct = item.is_correct(option);
        let mut feedback_prompt = false;
        if correct {
            self.correct_streak += 1;
            if self.correct_streak == feedback_streak {
                feedback_prompt = true;
                self.feedback_prompt = true;
            }
        } else {
            self.correct_streak = 0;
        }

        let outcome = AnswerOutcome {
            correct,
            correct_answer: item.correct_answer.clone(),
            explanation: item.explanation.clone(),
            feedback_prompt,
        };
        self.selected = Some(option.to_string());
        Ok(outcome)
    }

    /// Close the feedback prompt.
    pub fn dismiss_feedback(&mut self) {
        self.feedback_prompt = false;
    }

    pub fn item(&self) -> Option<&GameContent> {
        self.item.as_ref()
    }

    /// The option picked for the current item.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_answered(&self) -> bool {
        self.selected.is_some()
    }

    pub fn concept(&self) -> Option<&str> {
        self.concept.as_deref()
    }

    pub fn reps(&self) -> u32 {
        self.reps
    }

    pub fn max_reps(&self) -> u32 {
        self.max_reps
    }

    pub fn correct_streak(&self) -> u32 {
        self.correct_streak
    }

    pub fn shows_feedback_prompt(&self) -> bool {
        self.feedback_prompt
    }
}
