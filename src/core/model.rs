//! Data model for Mentor.
//!
//! These types are persisted as JSON inside the record store, so field
//! names are camelCase on disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of weekly goals in every roadmap.
pub const ROADMAP_WEEKS: usize = 4;

/// Number of answer options in every game item.
pub const GAME_OPTIONS: usize = 4;

/// Marker a tutor reply embeds to ask the UI for a feedback call-to-action.
pub const FEEDBACK_MARKER: &str = "[FEEDBACK_ACTION]";

/// Topic recorded for a freshly created account.
pub const INITIAL_TOPIC: &str = "Introduction";

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Written by the learner.
    User,
    /// Written by the model.
    Model,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Who wrote the message.
    pub role: Role,
    /// Message text.
    pub text: String,
}

impl Message {
    /// Create a learner message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// Create a model message.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }

    /// Whether this message carries the feedback marker.
    pub fn requests_feedback(&self) -> bool {
        self.role == Role::Model && self.text.contains(FEEDBACK_MARKER)
    }

    /// Message text with the feedback marker removed.
    pub fn display_text(&self) -> String {
        self.text.replace(FEEDBACK_MARKER, "").trim_end().to_string()
    }
}

/// Learner preferences gathered during sign-up and onboarding.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    /// Language the learner already speaks.
    pub native_language: String,
    /// Language being learned.
    pub target_language: String,
    /// Proficiency level label, e.g. "Beginner (A1)".
    pub level: String,
    /// Free-text goals, filled in when onboarding completes.
    pub goals: String,
    /// Free-text interests, comma separated.
    pub interests: String,
    /// Learning-style tag.
    pub learning_style: String,
}

impl UserPreferences {
    /// Whether the learner should be taught mostly in their native language.
    pub fn is_beginner(&self) -> bool {
        is_beginner_level(&self.level)
    }
}

/// Beginner levels are A1, A2 or anything labelled "beginner".
pub fn is_beginner_level(level: &str) -> bool {
    level.contains("A1") || level.contains("A2") || level.to_lowercase().contains("beginner")
}

/// AI teacher persona, generated once per account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TeacherPersona {
    /// Teacher name.
    pub name: String,
    /// Teacher age.
    pub age: u32,
    /// Personality descriptor.
    pub personality: String,
    /// Teaching-style descriptor.
    pub teaching_style: String,
    /// Short catchphrase shown on the home screen.
    pub catchphrase: String,
    /// Seed for avatar rendering.
    pub avatar_seed: u32,
}

/// One week of the learning roadmap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyGoal {
    /// Week index, 1 through 4.
    pub week: u32,
    /// Weekly theme.
    pub theme: String,
    /// What the week concentrates on.
    pub focus: String,
    /// Suggested activity.
    pub activity: String,
    /// Whether the learner has finished the week.
    pub completed: bool,
}

/// Four-week learning roadmap.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Roadmap {
    /// Weekly goals in order.
    pub weeks: Vec<WeeklyGoal>,
}

/// A multiple-choice vocabulary item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameContent {
    /// Question text.
    pub question: String,
    /// Exactly four options.
    pub options: Vec<String>,
    /// The option that is correct.
    pub correct_answer: String,
    /// Explanation in the learner's native language.
    pub explanation: String,
    /// The concept (word or phrase) being tested.
    pub concept: String,
    /// Broad topic name shown to the learner.
    pub category: String,
}

impl GameContent {
    /// Whether the chosen option is the correct answer.
    pub fn is_correct(&self, option: &str) -> bool {
        option == self.correct_answer
    }
}

/// Learner progress counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    /// When the learner last completed an interaction.
    pub last_session_date: DateTime<Utc>,
    /// Label of the last discussed topic.
    pub last_topic: String,
    /// Experience points.
    pub xp: u32,
    /// Consecutive-day streak.
    pub streak: u32,
}

impl UserProgress {
    /// Progress of a freshly created account.
    pub fn starting(now: DateTime<Utc>) -> Self {
        Self {
            last_session_date: now,
            last_topic: INITIAL_TOPIC.to_string(),
            xp: 0,
            streak: 1,
        }
    }

    /// Merge an update into this progress.
    ///
    /// Fields absent from the update are left unchanged;
    /// `last_session_date` is always set to `now`.
    pub fn merge(&mut self, update: &ProgressUpdate, now: DateTime<Utc>) {
        if let Some(topic) = &update.last_topic {
            self.last_topic = topic.clone();
        }
        if let Some(xp) = update.xp {
            self.xp = xp;
        }
        if let Some(streak) = update.streak {
            self.streak = streak;
        }
        self.last_session_date = now;
    }
}

/// Partial progress update; `None` fields are not touched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// New last-topic label.
    pub last_topic: Option<String>,
    /// New experience total.
    pub xp: Option<u32>,
    /// New streak count.
    pub streak: Option<u32>,
}

impl ProgressUpdate {
    /// Update only the last topic.
    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            last_topic: Some(topic.into()),
            ..Default::default()
        }
    }
}

/// A learner account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique numeric account code, at least three digits.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Learner preferences.
    pub preferences: UserPreferences,
    /// The generated teacher.
    #[serde(rename = "character")]
    pub persona: TeacherPersona,
    /// The generated roadmap.
    pub roadmap: Roadmap,
    /// Progress counters.
    pub progress: UserProgress,
    /// Tutor chat history, append-only.
    pub chat_history: Vec<Message>,
    /// Account-scope moderation warnings.
    pub warning_count: u32,
    /// Whether the account is permanently suspended.
    pub is_banned: bool,
}

impl User {
    /// Whether the name matches ignoring case and surrounding whitespace.
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}

/// Device-level moderation state, independent of any account.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceState {
    /// Whether the device is banned.
    pub banned: bool,
    /// Device-scope warnings recorded so far.
    pub warnings: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_user() -> User {
        User {
            id: "042".to_string(),
            name: "Alex".to_string(),
            preferences: UserPreferences::default(),
            persona: TeacherPersona {
                name: "Lena".to_string(),
                age: 34,
                personality: "Warm".to_string(),
                teaching_style: "Conversational".to_string(),
                catchphrase: "Los geht's!".to_string(),
                avatar_seed: 7,
            },
            roadmap: Roadmap::default(),
            progress: UserProgress::starting(Utc::now()),
            chat_history: Vec::new(),
            warning_count: 0,
            is_banned: false,
        }
    }

    #[test]
    fn test_user_serializes_camel_case() {
        let json = serde_json::to_value(sample_user()).unwrap();

        assert!(json.get("chatHistory").is_some());
        assert!(json.get("warningCount").is_some());
        assert!(json.get("isBanned").is_some());
        assert!(json.get("character").is_some());
        assert!(json["character"].get("avatarSeed").is_some());
        assert!(json["progress"].get("lastSessionDate").is_some());
    }

    #[test]
    fn test_role_wire_names() {
        let json = serde_json::to_string(&Message::model("hi")).unwrap();
        assert_eq!(json, r#"{"role":"model","text":"hi"}"#);
        assert_eq!(Role::User.as_str(), "user");
    }

    #[test]
    fn test_name_matches_is_case_and_whitespace_insensitive() {
        let user = sample_user();
        assert!(user.name_matches("  alex "));
        assert!(user.name_matches("ALEX"));
        assert!(!user.name_matches("alexa"));
    }

    #[test]
    fn test_is_beginner_level() {
        assert!(is_beginner_level("Beginner (A1)"));
        assert!(is_beginner_level("Elementary (A2)"));
        assert!(is_beginner_level("absolute beginner"));
        assert!(!is_beginner_level("Intermediate (B1)"));
        assert!(!is_beginner_level("Upper Int. (B2)"));
    }

    #[test]
    fn test_starting_progress() {
        let now = Utc::now();
        let progress = UserProgress::starting(now);
        assert_eq!(progress.xp, 0);
        assert_eq!(progress.streak, 1);
        assert_eq!(progress.last_topic, "Introduction");
        assert_eq!(progress.last_session_date, now);
    }

    #[test]
    fn test_progress_merge_keeps_unspecified_fields() {
        let start = Utc::now() - Duration::hours(3);
        let mut progress = UserProgress::starting(start);
        progress.xp = 40;

        let now = Utc::now();
        progress.merge(&ProgressUpdate::topic("Ordering food"), now);

        assert_eq!(progress.last_topic, "Ordering food");
        assert_eq!(progress.xp, 40);
        assert_eq!(progress.streak, 1);
        assert_eq!(progress.last_session_date, now);
    }

    #[test]
    fn test_feedback_marker_detection() {
        let reply = Message::model("Thanks for telling me! [FEEDBACK_ACTION]");
        assert!(reply.requests_feedback());
        assert_eq!(reply.display_text(), "Thanks for telling me!");

        let echoed = Message::user("what is [FEEDBACK_ACTION]?");
        assert!(!echoed.requests_feedback());
    }

    #[test]
    fn test_game_content_is_correct() {
        let item = GameContent {
            question: "How do you say 'apple'?".to_string(),
            options: vec!["Apfel".into(), "Birne".into(), "Brot".into(), "Haus".into()],
            correct_answer: "Apfel".to_string(),
            explanation: "Apfel means apple".to_string(),
            concept: "Apfel".to_string(),
            category: "Food".to_string(),
        };
        assert!(item.is_correct("Apfel"));
        assert!(!item.is_correct("apfel"));
    }
}
