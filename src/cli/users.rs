//! Users command for Mentor.
//!
//! Lists the accounts stored on this device, newest first.

use serde::{Deserialize, Serialize};

use crate::core::User;
use crate::storage::{KeyValueStore, RecordStore};

/// Options for the users command.
#[derive(Debug, Clone, Default)]
pub struct UsersOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Maximum number of accounts to show.
    pub limit: Option<usize>,
}

/// Output format for the users command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersOutput {
    pub success: bool,
    /// Total number of stored accounts.
    pub total: usize,
    pub users: Vec<UserInfo>,
}

/// Account summary for output. Chat history is not included.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub target_language: String,
    pub level: String,
    pub teacher: String,
    pub xp: u32,
    pub streak: u32,
    pub last_topic: String,
    pub last_session: String,
    pub warnings: u32,
    pub banned: bool,
}

impl UserInfo {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            target_language: user.preferences.target_language.clone(),
            level: user.preferences.level.clone(),
            teacher: user.persona.name.clone(),
            xp: user.progress.xp,
            streak: user.progress.streak,
            last_topic: user.progress.last_topic.clone(),
            last_session: user.progress.last_session_date.format("%Y-%m-%d").to_string(),
            warnings: user.warning_count,
            banned: user.is_banned,
        }
    }
}

impl UsersOutput {
    pub fn success(total: usize, users: Vec<UserInfo>) -> Self {
        Self {
            success: true,
            total,
            users,
        }
    }
}

/// The users command implementation.
pub struct UsersCommand<'a, S: KeyValueStore> {
    records: &'a RecordStore<S>,
}

impl<'a, S: KeyValueStore> UsersCommand<'a, S> {
    pub fn new(records: &'a RecordStore<S>) -> Self {
        Self { records }
    }

    pub fn run(&self, options: &UsersOptions) -> UsersOutput {
        let total = self.records.list_users().len();
        let users = self
            .records
            .recent_users(options.limit.unwrap_or(total))
            .into_iter()
            .map(UserInfo::from_user)
            .collect();
        UsersOutput::success(total, users)
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &UsersOutput, options: &UsersOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            format_human_readable(output)
        }
    }
}

fn format_human_readable(output: &UsersOutput) -> String {
    if output.users.is_empty() {
        return "No accounts on this device.\n".to_string();
    }

    let mut lines = vec![format!(
        "Showing {} of {} account(s):\n",
        output.users.len(),
        output.total
    )];
    for user in &output.users {
        let status = if user.banned { " [suspended]" } else { "" };
        lines.push(format!(
            "{} (ID: {}){}",
            user.name, user.id, status
        ));
        lines.push(format!(
            "   {} {} with {} | {} XP | {} day streak",
            user.target_language, user.level, user.teacher, user.xp, user.streak
        ));
        lines.push(format!(
            "   Last session: {} on \"{}\"",
            user.last_session, user.last_topic
        ));
        if user.warnings > 0 {
            lines.push(format!("   Warnings: {}", user.warnings));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}
