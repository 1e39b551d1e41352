//! Plain-text screens for the interactive `play` command.

use crate::core::model::{Message, Role};
use crate::core::moderation::Scope;
use crate::core::practice::GameKind;
use crate::core::session::{GenerationStep, Notice, Session, View};

pub const LANGUAGES: &[&str] = &["English", "German", "Spanish", "French", "Arabic", "Italian"];
pub const LEVELS: &[&str] = &[
    "Beginner (A1)",
    "Elementary (A2)",
    "Intermediate (B1)",
    "Upper Int. (B2)",
];
pub const COMMON_INTERESTS: &[&str] = &[
    "Travel", "Business", "Tech", "History", "Food", "Reading", "Sports",
];

const RULE: &str = "----------------------------------------";

/// Render the current view, any notice, and the available commands.
pub fn render(session: &Session) -> String {
    let mut out = match session.view() {
        View::Banned => banned(session),
        View::Welcome => welcome(),
        View::Onboarding => transcript("Building your plan", session.transcript()),
        View::Generating { step, failed } => generating(step, failed),
        View::Home => home(session),
        View::Roadmap => roadmap(session),
        View::Tutor => tutor(session),
        View::GamesHub => games_hub(),
        View::Game(kind) => game(session, kind),
    };

    if session.view() != View::Banned {
        if let Some(notice) = session.notice() {
            out.push('\n');
            out.push_str(&notice_text(notice));
            out.push('\n');
        }
        if session.shows_bottom_nav() {
            out.push_str(&format!("\n{}\n[/home] [/roadmap] [/games] [/tutor]\n", RULE));
        }
    }
    out
}

fn banned(session: &Session) -> String {
    let subject = session
        .user()
        .filter(|u| u.is_banned)
        .map(|u| u.id.clone())
        .unwrap_or_else(|| "Guest Device".to_string());
    format!(
        "BANNED\n\n\
         Your access has been permanently suspended due to repeated violations \
         of our community safety guidelines.\n\n\
         ID / Device: {}\nStatus: Permanently suspended\n",
        subject
    )
}

fn welcome() -> String {
    "Mentor\nYour personal language coach.\n\n  1) Start learning\n  2) Log in\n  q) Quit\n"
        .to_string()
}

fn transcript(title: &str, messages: &[Message]) -> String {
    let mut out = format!("{}\n{}\n", title, RULE);
    for message in messages {
        out.push_str(&format_message(message));
        out.push('\n');
    }
    out
}

fn format_message(message: &Message) -> String {
    match message.role {
        Role::User => format!("  you> {}", message.text),
        Role::Model => format!("coach> {}", message.display_text()),
    }
}

fn generating(step: GenerationStep, failed: bool) -> String {
    if failed {
        return "Building Your AI Coach\n\nSomething went wrong. Type /retry to try again.\n"
            .to_string();
    }
    let doing = match step {
        GenerationStep::Persona => "Designing your teacher...",
        GenerationStep::Roadmap => "Planning your first month...",
        GenerationStep::Account => "Saving your profile...",
    };
    format!("Building Your AI Coach\nThis takes just a moment...\n{}\n", doing)
}

fn home(session: &Session) -> String {
    let Some(user) = session.user() else {
        return String::new();
    };
    let mut out = format!(
        "Personal Mentor: {}\n\"{}\"\n\n{} day streak | {} XP | Last topic: {}\n",
        user.persona.name,
        user.persona.catchphrase,
        user.progress.streak,
        user.progress.xp,
        user.progress.last_topic
    );
    if let Some(week) = user.roadmap.weeks.iter().find(|w| !w.completed) {
        out.push_str(&format!(
            "\nThis week: {} ({})\n  {}\n",
            week.theme, week.focus, week.activity
        ));
    }
    out
}

fn roadmap(session: &Session) -> String {
    let Some(user) = session.user() else {
        return String::new();
    };
    let mut out = format!("Your {} roadmap\n{}\n", user.preferences.target_language, RULE);
    for week in &user.roadmap.weeks {
        let mark = if week.completed { "x" } else { " " };
        out.push_str(&format!(
            "[{}] Week {}: {}\n    Focus: {}\n    Activity: {}\n",
            mark, week.week, week.theme, week.focus, week.activity
        ));
    }
    out.push_str("\nRoadmap adapts weekly based on your progress.\n");
    out
}

fn tutor(session: &Session) -> String {
    let title = session
        .user()
        .map(|u| format!("Chat with {}", u.persona.name))
        .unwrap_or_else(|| "Chat".to_string());
    transcript(&title, session.chat())
}

fn games_hub() -> String {
    let mut out = format!("Games\n{}\n", RULE);
    for kind in GameKind::ALL {
        let status = if kind.is_playable() {
            format!("/play {}", kind.as_str())
        } else {
            "coming soon".to_string()
        };
        out.push_str(&format!("  {:<14} {}\n", kind.title(), status));
    }
    out
}

fn game(session: &Session, kind: GameKind) -> String {
    let mut out = format!("{}\n{}\n", kind.title(), RULE);
    let Some(round) = session.round() else {
        return out;
    };

    match round.item() {
        None if session.game_failed() => {
            out.push_str("Couldn't load a question. Type /retry or /exit.\n");
        }
        None => out.push_str("Loading...\n"),
        Some(item) => {
            out.push_str(&format!("[{}] {}\n", item.category, item.question));
            for (i, option) in item.options.iter().enumerate() {
                let mark = match round.selected() {
                    Some(_) if item.is_correct(option) => " (correct)",
                    Some(picked) if picked == option => " (your answer)",
                    _ => "",
                };
                out.push_str(&format!("  {}) {}{}\n", i + 1, option, mark));
            }
            if round.is_answered() {
                out.push_str(&format!("\n{}\nType /next for another question.\n", item.explanation));
            }
            out.push_str(&format!("\nStreak: {} | /exit to leave\n", round.correct_streak()));
        }
    }
    out
}

/// Text for a notice.
pub fn notice_text(notice: &Notice) -> String {
    match notice {
        Notice::Warning { scope, warnings } => {
            let what = match scope {
                Scope::Device => "Please rephrase to continue building your profile.",
                Scope::Account => "Let's keep our lessons on topic.",
            };
            format!(
                "Warning ({}): your message contained prohibited content. {} \
                 One more violation will result in an immediate ban. (/ok)",
                warnings, what
            )
        }
        Notice::SignupRejected => {
            "Focus Check: your text didn't pass our safety protocol. \
             Let's keep the study area professional!"
                .to_string()
        }
        Notice::UserNotFound => "User not found.".to_string(),
        Notice::AccountSuspended => "Account suspended.".to_string(),
        Notice::Trouble(message) => message.clone(),
        Notice::Credentials { name, id } => format!(
            "You're all set! Your personalized plan is ready.\n\
             Your login credentials: name \"{}\", ID {}. Keep them safe. (/ok)",
            name, id
        ),
        Notice::FeedbackRequested => {
            "Enjoying Mentor? We'd love your feedback. (/ok)".to_string()
        }
    }
}
