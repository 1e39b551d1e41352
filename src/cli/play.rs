//! Interactive `play` command.
//!
//! A line-oriented front end over [`App`]: each line becomes a session
//! event, then the current screen is redrawn. Input and output are
//! generic so whole sessions can be scripted in tests.

use std::io::{BufRead, Write};

use tracing::{debug, warn};

use crate::cli::render::{render, COMMON_INTERESTS, LANGUAGES, LEVELS};
use crate::core::practice::GameKind;
use crate::core::session::{Event, Session, SignupForm, Tab, View};
use crate::driver::App;
use crate::error::{MentorError, Result};
use crate::storage::KeyValueStore;

const HELP: &str = "Commands: /home /roadmap /games /tutor /play vocab /exit /next /retry /ok /quit\n\
                    In a chat, anything else is sent as a message. In a game, answer with 1-4.";

/// What a line of input asks for.
#[derive(Debug, Clone)]
pub enum Input {
    Event(Event),
    /// Start the sign-up form.
    SignUp,
    /// Start the log-in form.
    LogIn,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

/// Interpret one line in the context of the current view.
pub fn parse_input(line: &str, session: &Session) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let view = session.view();

    if let Some(command) = line.strip_prefix('/') {
        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default().to_lowercase();
        return match name.as_str() {
            "quit" => Input::Quit,
            "help" => Input::Help,
            "ok" => Input::Event(Event::DismissNotice),
            "retry" => Input::Event(Event::Retry),
            "next" => Input::Event(Event::NextItem),
            "exit" => Input::Event(Event::ExitGame),
            "home" => Input::Event(Event::Navigate(Tab::Home)),
            "roadmap" => Input::Event(Event::Navigate(Tab::Roadmap)),
            "games" => Input::Event(Event::Navigate(Tab::Games)),
            "tutor" => Input::Event(Event::Navigate(Tab::Tutor)),
            "play" => match parts.next().and_then(GameKind::from_name) {
                Some(kind) => Input::Event(Event::EnterGame(kind)),
                None => Input::Unknown(line.to_string()),
            },
            _ => Input::Unknown(line.to_string()),
        };
    }

    match view {
        View::Welcome => match line {
            "1" => Input::SignUp,
            "2" => Input::LogIn,
            "q" | "Q" => Input::Quit,
            _ => Input::Unknown(line.to_string()),
        },
        View::Onboarding | View::Tutor => Input::Event(Event::Send(line.to_string())),
        View::Game(_) => {
            let option = line.parse::<usize>().ok().and_then(|n| {
                session
                    .round()
                    .and_then(|r| r.item())
                    .and_then(|item| item.options.get(n.checked_sub(1)?).cloned())
            });
            match option {
                Some(option) => Input::Event(Event::Answer(option)),
                None => Input::Unknown(line.to_string()),
            }
        }
        _ => Input::Unknown(line.to_string()),
    }
}

/// The play command implementation.
pub struct PlayCommand<S: KeyValueStore> {
    app: App<S>,
}

impl<S: KeyValueStore> PlayCommand<S> {
    pub fn new(app: App<S>) -> Self {
        Self { app }
    }

    pub fn app(&self) -> &App<S> {
        &self.app
    }

    /// Run until the learner quits, input ends, or the session is banned.
    pub fn run<R: BufRead, W: Write>(&mut self, input: &mut R, output: &mut W) -> Result<()> {
        loop {
            writeln!(output, "\n{}", render(self.app.session()))?;
            if self.app.session().view() == View::Banned {
                return Ok(());
            }

            write!(output, "> ")?;
            output.flush()?;
            let Some(line) = read_line(input)? else {
                return Ok(());
            };

            let event = match parse_input(&line, self.app.session()) {
                Input::Event(event) => event,
                Input::SignUp => match self.read_signup(input, output)? {
                    Some(form) => Event::SignUp(form),
                    None => return Ok(()),
                },
                Input::LogIn => match self.read_login(input, output)? {
                    Some(event) => event,
                    None => return Ok(()),
                },
                Input::Help => {
                    writeln!(output, "{}", HELP)?;
                    continue;
                }
                Input::Quit => return Ok(()),
                Input::Empty => continue,
                Input::Unknown(text) => {
                    writeln!(output, "Unknown command '{}'. Type /help.", text)?;
                    continue;
                }
            };

            match self.app.dispatch(event) {
                Ok(()) => {}
                Err(MentorError::InvalidTransition { message }) => {
                    debug!("Rejected input: {}", message);
                    writeln!(output, "Can't do that here: {}", message)?;
                }
                Err(MentorError::Busy) => writeln!(output, "Still working on it...")?,
                Err(e) => {
                    warn!("Action failed: {}", e);
                    writeln!(output, "Something went wrong: {}. Use /retry to try again.", e)?;
                }
            }
        }
    }

    fn read_signup<R: BufRead, W: Write>(
        &self,
        input: &mut R,
        output: &mut W,
    ) -> Result<Option<SignupForm>> {
        let Some(name) = ask(input, output, "What's your name?", None)? else {
            return Ok(None);
        };
        writeln!(output, "Languages: {}", LANGUAGES.join(", "))?;
        let Some(native_language) = ask(input, output, "Your native language", Some("English"))?
        else {
            return Ok(None);
        };
        let Some(target_language) = ask(input, output, "Language to learn", None)? else {
            return Ok(None);
        };

        for (i, level) in LEVELS.iter().enumerate() {
            writeln!(output, "  {}) {}", i + 1, level)?;
        }
        let Some(level) = ask(input, output, "Your level", Some("1"))? else {
            return Ok(None);
        };

        for (i, interest) in COMMON_INTERESTS.iter().enumerate() {
            writeln!(output, "  {}) {}", i + 1, interest)?;
        }
        let Some(interests) = ask(input, output, "Interests (numbers, comma separated)", Some(""))?
        else {
            return Ok(None);
        };
        let Some(custom_interest) = ask(input, output, "Anything else you're into?", Some(""))?
        else {
            return Ok(None);
        };

        Ok(Some(SignupForm {
            name,
            native_language,
            target_language,
            level: pick(&level, LEVELS),
            interests: interests
                .split(',')
                .map(|s| pick(s, COMMON_INTERESTS))
                .filter(|s| !s.is_empty())
                .collect(),
            custom_interest,
        }))
    }

    fn read_login<R: BufRead, W: Write>(
        &self,
        input: &mut R,
        output: &mut W,
    ) -> Result<Option<Event>> {
        let recent = self.app.records().recent_users(3);
        if !recent.is_empty() {
            writeln!(output, "Recent learners:")?;
            for user in recent {
                writeln!(output, "  {} (ID: {})", user.name, user.id)?;
            }
        }

        let Some(name) = ask(input, output, "Name", None)? else {
            return Ok(None);
        };
        let Some(id) = ask(input, output, "ID", None)? else {
            return Ok(None);
        };
        Ok(Some(Event::LogIn { name, id }))
    }
}

/// Read one line; `None` at end of input.
fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Prompt for a value, using `default` for an empty answer.
fn ask<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
    default: Option<&str>,
) -> Result<Option<String>> {
    match default {
        Some(d) if !d.is_empty() => write!(output, "{} [{}]: ", label, d)?,
        _ => write!(output, "{}: ", label)?,
    }
    output.flush()?;

    Ok(read_line(input)?.map(|answer| match (answer.is_empty(), default) {
        (true, Some(d)) => d.to_string(),
        _ => answer,
    }))
}

/// Resolve a 1-based menu number to its entry; other text is kept as typed.
fn pick(answer: &str, choices: &[&str]) -> String {
    let answer = answer.trim();
    answer
        .parse::<usize>()
        .ok()
        .and_then(|n| choices.get(n.checked_sub(1)?))
        .map(|s| s.to_string())
        .unwrap_or_else(|| answer.to_string())
}
