//! Progress bookkeeping after learner interactions.

use chrono::{DateTime, Utc};

use crate::core::model::{ProgressUpdate, UserProgress};

/// Maximum length of a last-topic label, in characters.
pub const TOPIC_MAX_CHARS: usize = 60;

/// Streak after an interaction at `now`.
///
/// Same UTC day keeps the streak, the next day extends it, anything later
/// starts over at 1.
pub fn advance_streak(last_session: DateTime<Utc>, streak: u32, now: DateTime<Utc>) -> u32 {
    let days = (now.date_naive() - last_session.date_naive()).num_days();
    match days {
        d if d <= 0 => streak.max(1),
        1 => streak.saturating_add(1),
        _ => 1,
    }
}

/// Topic label for a learner message.
pub fn topic_from_message(message: &str) -> String {
    message.trim().chars().take(TOPIC_MAX_CHARS).collect()
}

/// Update after a successful tutor turn.
pub fn tutor_turn(
    progress: &UserProgress,
    message: &str,
    xp_award: u32,
    now: DateTime<Utc>,
) -> ProgressUpdate {
    ProgressUpdate {
        last_topic: Some(topic_from_message(message)),
        xp: Some(progress.xp.saturating_add(xp_award)),
        streak: Some(advance_streak(progress.last_session_date, progress.streak, now)),
    }
}

/// Update after a correct quiz answer.
pub fn correct_answer(progress: &UserProgress, xp_award: u32, now: DateTime<Utc>) -> ProgressUpdate {
    ProgressUpdate {
        last_topic: None,
        xp: Some(progress.xp.saturating_add(xp_award)),
        streak: Some(advance_streak(progress.last_session_date, progress.streak, now)),
    }
}
