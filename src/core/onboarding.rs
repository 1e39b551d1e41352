//! Onboarding transcript rules.
//!
//! The onboarding chat collects the learner's goals. After a fixed number
//! of learner turns the transcript is condensed into the goals field of
//! the pending preferences.

use crate::core::model::{Message, Role};

/// Shown when the assistant answers with nothing.
pub const EMPTY_REPLY: &str = "I didn't catch that.";

/// Shown when the assistant cannot be reached.
pub const CONNECTION_TROUBLE: &str = "Sorry, I'm having trouble connecting.";

/// Opening line from the assistant.
pub fn greeting(name: &str, interests: &str) -> Message {
    let text = if interests.trim().is_empty() {
        format!(
            "Hi {}! I'm your AI Coach. To build your perfect plan, I need to know a bit about you. \
             What is your main goal for learning this language?",
            name
        )
    } else {
        format!(
            "Hi {}! I see you're interested in {}. That helps me a lot! To finish your plan, \
             I just need to know: What is your main goal for learning this language? \
             (e.g. Work, Exam, Travel)",
            name, interests
        )
    };
    Message::model(text)
}

/// Number of learner-authored turns.
pub fn user_turns(transcript: &[Message]) -> usize {
    transcript.iter().filter(|m| m.role == Role::User).count()
}

/// Whether enough learner turns have been collected.
pub fn is_complete(transcript: &[Message], required_turns: u32) -> bool {
    user_turns(transcript) >= required_turns as usize
}

/// Assistant reply to show, substituting a placeholder for an empty one.
pub fn reply_or_placeholder(reply: &str) -> String {
    if reply.trim().is_empty() {
        EMPTY_REPLY.to_string()
    } else {
        reply.to_string()
    }
}

/// Condense the transcript into a goals string.
///
/// Lines are `role: text`, joined with newlines, cut to `max_chars`
/// characters.
pub fn goals_summary(transcript: &[Message], max_chars: usize) -> String {
    transcript
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.text))
        .collect::<Vec<_>>()
        .join("\n")
        .chars()
        .take(max_chars)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_mentions_interests() {
        let greeting = greeting("Alex", "Travel, Tech");
        assert_eq!(greeting.role, Role::Model);
        assert!(greeting.text.starts_with("Hi Alex! I see you're interested in Travel, Tech."));
    }

    #[test]
    fn test_greeting_without_interests() {
        let greeting = greeting("Alex", "  ");
        assert!(greeting.text.starts_with("Hi Alex! I'm your AI Coach."));
    }

    #[test]
    fn test_completion_after_three_user_turns() {
        let mut transcript = vec![greeting("Alex", "Travel, Tech")];
        for (i, text) in ["Work", "20 minutes", "No"].iter().enumerate() {
            assert!(!is_complete(&transcript, 3));
            transcript.push(Message::user(*text));
            if i < 2 {
                transcript.push(Message::model("Next?"));
            }
        }
        assert!(is_complete(&transcript, 3));
        assert_eq!(user_turns(&transcript), 3);
    }

    #[test]
    fn test_goals_summary_truncates_to_150_chars() {
        let transcript = vec![
            greeting("Alex", "Travel, Tech"),
            Message::user("I want to work in Berlin"),
            Message::model("How many minutes a day?"),
            Message::user("Twenty"),
        ];
        let full = transcript
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.text))
            .collect::<Vec<_>>()
            .join("\n");

        let summary = goals_summary(&transcript, 150);
        assert_eq!(summary.chars().count(), 150);
        assert!(full.starts_with(&summary));
        assert!(summary.starts_with("model: Hi Alex!"));
    }

    #[test]
    fn test_goals_summary_short_transcript_kept_whole() {
        let transcript = vec![Message::user("Work"), Message::model("Ok")];
        assert_eq!(goals_summary(&transcript, 150), "user: Work\nmodel: Ok");
    }

    #[test]
    fn test_goals_summary_is_char_safe() {
        let transcript = vec![Message::user("ééééé")];
        assert_eq!(goals_summary(&transcript, 8), "user: éé");
    }

    #[test]
    fn test_reply_placeholder() {
        assert_eq!(reply_or_placeholder(""), EMPTY_REPLY);
        assert_eq!(reply_or_placeholder("Great!"), "Great!");
    }
}
