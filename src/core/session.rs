//! Session state machine for Mentor.
//!
//! A session moves a learner from the welcome screen through onboarding
//! and account generation into the main tabs. Transitions are pure:
//! [`Session::apply`] takes an [`Event`] and returns the next session plus
//! the [`Effect`]s a driver must execute. The outcome of each effect comes
//! back as another event, so the whole legality table can be tested
//! without storage or network.
//!
//! Bans are not a state. Whenever the device or the current account is
//! banned, [`Session::view`] is [`View::Banned`] and every event is
//! ignored.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::core::model::{
    DeviceState, GameContent, Message, Roadmap, Role, TeacherPersona, User, UserPreferences,
};
use crate::core::moderation::{Scope, ViolationOutcome};
use crate::core::onboarding;
use crate::core::practice::{GameKind, RepetitionRange, VocabRound};
use crate::error::{MentorError, Result};
use crate::provider::SafetyVerdict;

/// Shown in the tutor chat when the reply could not be fetched.
pub const TUTOR_TROUBLE: &str = "I'm having a little trouble connecting. Check your signal!";

/// Shown when account generation or a quiz item could not be fetched.
pub const GENERATION_TROUBLE: &str = "We couldn't reach your teacher. Please try again.";

/// Top-level screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Welcome,
    Onboarding,
    Generating,
    Home,
    Roadmap,
    Tutor,
    Games,
}

impl Screen {
    /// Whether this is one of the four main tabs.
    pub fn is_tab(&self) -> bool {
        matches!(
            self,
            Screen::Home | Screen::Roadmap | Screen::Tutor | Screen::Games
        )
    }
}

/// Bottom-navigation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Home,
    Roadmap,
    Games,
    Tutor,
}

impl Tab {
    fn screen(self) -> Screen {
        match self {
            Tab::Home => Screen::Home,
            Tab::Roadmap => Screen::Roadmap,
            Tab::Games => Screen::Games,
            Tab::Tutor => Screen::Tutor,
        }
    }
}

/// What the UI should draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// The suspension overlay, drawn instead of any screen.
    Banned,
    Welcome,
    Onboarding,
    Generating { step: GenerationStep, failed: bool },
    Home,
    Roadmap,
    Tutor,
    GamesHub,
    Game(GameKind),
}

/// Sub-step of account generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStep {
    Persona,
    Roadmap,
    Account,
}

/// Sign-up form from the welcome screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub name: String,
    pub native_language: String,
    pub target_language: String,
    pub level: String,
    /// Interests picked from the list.
    pub interests: Vec<String>,
    /// Optional free-text interest.
    pub custom_interest: String,
}

impl SignupForm {
    /// Selected and custom interests, comma separated, blanks dropped.
    pub fn joined_interests(&self) -> String {
        self.interests
            .iter()
            .chain(std::iter::once(&self.custom_interest))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn preferences(&self) -> UserPreferences {
        UserPreferences {
            native_language: self.native_language.trim().to_string(),
            target_language: self.target_language.trim().to_string(),
            level: self.level.trim().to_string(),
            goals: String::new(),
            interests: self.joined_interests(),
            learning_style: String::new(),
        }
    }
}

/// Transient message shown over the current screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A moderation strike short of a ban.
    Warning { scope: Scope, warnings: u32 },
    /// The sign-up name or custom interest was rejected.
    SignupRejected,
    UserNotFound,
    AccountSuspended,
    /// An external call failed; the text says what to do.
    Trouble(String),
    /// The account was created; these are the login details.
    Credentials { name: String, id: String },
    /// Ask the learner for feedback about the app.
    FeedbackRequested,
}

/// Outstanding request. While one is set, learner events are refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    ScreenSignup,
    LookupAccount,
    CheckSafety,
    RecordViolation,
    OnboardingReply,
    Persona,
    Roadmap,
    CreateAccount,
    TutorReply,
    GameItem,
    SaveProgress,
}

/// Inputs to the state machine: learner actions and effect outcomes.
#[derive(Debug, Clone)]
pub enum Event {
    // Learner actions
    SignUp(SignupForm),
    LogIn { name: String, id: String },
    Send(String),
    Navigate(Tab),
    EnterGame(GameKind),
    ExitGame,
    Answer(String),
    NextItem,
    Retry,
    DismissNotice,

    // Effect outcomes
    SignupScreened { safe: bool },
    AccountLookedUp(Option<User>),
    SafetyChecked(SafetyVerdict),
    ViolationRecorded(ViolationOutcome),
    ReplyReceived(String),
    PersonaGenerated(TeacherPersona),
    RoadmapGenerated(Roadmap),
    AccountCreated(User),
    GameItemReceived(GameContent),
    UserSaved(User),
    RequestFailed(String),
}

impl Event {
    fn is_learner_action(&self) -> bool {
        matches!(
            self,
            Event::SignUp(_)
                | Event::LogIn { .. }
                | Event::Send(_)
                | Event::Navigate(_)
                | Event::EnterGame(_)
                | Event::ExitGame
                | Event::Answer(_)
                | Event::NextItem
                | Event::Retry
                | Event::DismissNotice
        )
    }
}

/// Work for the driver. Each effect answers with one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Classify each text; answer `SignupScreened`.
    ScreenSignup { texts: Vec<String> },
    /// Answer `AccountLookedUp`.
    LookupAccount { name: String, id: String },
    /// Answer `SafetyChecked`.
    CheckSafety { text: String },
    /// Persist a strike; answer `ViolationRecorded`.
    RecordViolation { scope: Scope, user_id: Option<String> },
    /// Answer `ReplyReceived`.
    OnboardingReply {
        history: Vec<Message>,
        message: String,
        known_interests: String,
    },
    /// Answer `PersonaGenerated`.
    GeneratePersona(UserPreferences),
    /// Answer `RoadmapGenerated`.
    GenerateRoadmap(UserPreferences),
    /// Answer `AccountCreated`.
    CreateAccount {
        name: String,
        preferences: UserPreferences,
        persona: TeacherPersona,
        roadmap: Roadmap,
    },
    /// Ask the current user's tutor; answer `ReplyReceived`.
    TutorReply { history: Vec<Message>, message: String },
    /// Persist history and progress; answer `UserSaved`.
    SaveTutorTurn {
        user_id: String,
        history: Vec<Message>,
        message: String,
    },
    /// Answer `GameItemReceived`.
    FetchGameItem {
        theme: String,
        prior_concept: Option<String>,
    },
    /// Award quiz xp; answer `UserSaved`.
    AwardCorrectAnswer { user_id: String },
}

/// Tunables the state machine reads from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRules {
    pub required_turns: u32,
    pub goals_summary_chars: usize,
    pub feedback_streak: u32,
    pub repetitions: RepetitionRange,
    pub game_theme: String,
}

impl SessionRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            required_turns: config.onboarding.required_turns.max(1),
            goals_summary_chars: config.onboarding.goals_summary_chars,
            feedback_streak: config.practice.feedback_streak,
            repetitions: RepetitionRange::from_config(&config.practice),
            game_theme: config.practice.default_theme.clone(),
        }
    }
}

impl Default for SessionRules {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Default)]
struct Signup {
    name: String,
    preferences: UserPreferences,
    persona: Option<TeacherPersona>,
    roadmap: Option<Roadmap>,
    failed: bool,
}

#[derive(Debug, Clone)]
struct ActiveGame {
    kind: GameKind,
    round: VocabRound,
    failed: bool,
}

/// One learner session.
#[derive(Debug, Clone)]
pub struct Session {
    rules: SessionRules,
    screen: Screen,
    device: DeviceState,
    user: Option<User>,
    signup: Option<Signup>,
    form: Option<SignupForm>,
    transcript: Vec<Message>,
    chat: Vec<Message>,
    outgoing: Option<String>,
    game: Option<ActiveGame>,
    pending: Option<Request>,
    notice: Option<Notice>,
    rng: StdRng,
}

impl Session {
    /// Start on the welcome screen.
    pub fn new(rules: SessionRules, device: DeviceState) -> Self {
        Self {
            rules,
            screen: Screen::Welcome,
            device,
            user: None,
            signup: None,
            form: None,
            transcript: Vec::new(),
            chat: Vec::new(),
            outgoing: None,
            game: None,
            pending: None,
            notice: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a seeded generator for the quiz repetition draw.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// Whether the device or the current account is banned.
    pub fn is_banned(&self) -> bool {
        self.device.banned || self.user.as_ref().is_some_and(|u| u.is_banned)
    }

    /// What to draw. The ban overlay wins over every screen.
    pub fn view(&self) -> View {
        if self.is_banned() {
            return View::Banned;
        }

        match self.screen {
            Screen::Welcome => View::Welcome,
            Screen::Onboarding => View::Onboarding,
            Screen::Generating => {
                let (step, failed) = match &self.signup {
                    Some(s) if s.persona.is_none() => (GenerationStep::Persona, s.failed),
                    Some(s) if s.roadmap.is_none() => (GenerationStep::Roadmap, s.failed),
                    Some(s) => (GenerationStep::Account, s.failed),
                    None => (GenerationStep::Persona, true),
                };
                View::Generating { step, failed }
            }
            Screen::Home => View::Home,
            Screen::Roadmap => View::Roadmap,
            Screen::Tutor => View::Tutor,
            Screen::Games => match &self.game {
                Some(game) => View::Game(game.kind),
                None => View::GamesHub,
            },
        }
    }

    /// Bottom navigation is shown on the main tabs outside a game.
    pub fn shows_bottom_nav(&self) -> bool {
        !self.is_banned() && self.screen.is_tab() && self.game.is_none()
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<Request> {
        self.pending
    }

    pub fn device(&self) -> DeviceState {
        self.device
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Onboarding transcript, greeting first.
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Tutor conversation as currently shown.
    pub fn chat(&self) -> &[Message] {
        &self.chat
    }

    /// Preferences collected so far during sign-up.
    pub fn pending_preferences(&self) -> Option<&UserPreferences> {
        self.signup.as_ref().map(|s| &s.preferences)
    }

    /// The running vocabulary round, if a game is open.
    pub fn round(&self) -> Option<&VocabRound> {
        self.game.as_ref().map(|g| &g.round)
    }

    /// Whether the last quiz item could not be fetched.
    pub fn game_failed(&self) -> bool {
        self.game.as_ref().is_some_and(|g| g.failed)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Apply an event, returning the next session and the effects to run.
    ///
    /// `self` is left untouched, so a rejected event costs nothing.
    pub fn apply(&self, event: Event) -> Result<(Session, Vec<Effect>)> {
        if self.is_banned() {
            debug!("Ignoring {:?} while banned", event);
            return Ok((self.clone(), Vec::new()));
        }
        if event.is_learner_action() && self.pending.is_some() {
            return Err(MentorError::Busy);
        }

        let mut next = self.clone();
        let effects = next.step(event)?;
        debug!("Now on {:?} (pending: {:?})", next.screen, next.pending);
        Ok((next, effects))
    }

    fn step(&mut self, event: Event) -> Result<Vec<Effect>> {
        match event {
            Event::SignUp(form) => self.sign_up(form),
            Event::LogIn { name, id } => {
                self.require_screen(Screen::Welcome, "log in")?;
                self.notice = None;
                self.pending = Some(Request::LookupAccount);
                Ok(vec![Effect::LookupAccount { name, id }])
            }
            Event::Send(text) => self.send(text),
            Event::Navigate(tab) => self.navigate(tab),
            Event::EnterGame(kind) => self.enter_game(kind),
            Event::ExitGame => {
                if self.screen != Screen::Games || self.game.is_none() {
                    return Err(MentorError::invalid_transition("no game to exit"));
                }
                self.game = None;
                Ok(Vec::new())
            }
            Event::Answer(option) => self.answer(&option),
            Event::NextItem => {
                let game = self.active_game()?;
                if !game.round.is_answered() && game.round.item().is_some() {
                    return Err(MentorError::invalid_transition(
                        "answer the current question first",
                    ));
                }
                Ok(vec![self.fetch_item()])
            }
            Event::Retry => self.retry(),
            Event::DismissNotice => {
                self.notice = None;
                if let Some(game) = self.game.as_mut() {
                    game.round.dismiss_feedback();
                }
                Ok(Vec::new())
            }

            Event::SignupScreened { safe } => {
                self.complete(Request::ScreenSignup)?;
                self.signup_screened(safe);
                Ok(Vec::new())
            }
            Event::AccountLookedUp(user) => {
                self.complete(Request::LookupAccount)?;
                self.account_looked_up(user);
                Ok(Vec::new())
            }
            Event::SafetyChecked(verdict) => {
                self.complete(Request::CheckSafety)?;
                self.safety_checked(verdict)
            }
            Event::ViolationRecorded(outcome) => {
                self.complete(Request::RecordViolation)?;
                self.violation_recorded(outcome);
                Ok(Vec::new())
            }
            Event::ReplyReceived(reply) => self.reply_received(reply),
            Event::PersonaGenerated(persona) => {
                self.complete(Request::Persona)?;
                let signup = self.signup_mut()?;
                signup.persona = Some(persona);
                Ok(vec![self.next_generation_step()?])
            }
            Event::RoadmapGenerated(roadmap) => {
                self.complete(Request::Roadmap)?;
                let signup = self.signup_mut()?;
                signup.roadmap = Some(roadmap);
                Ok(vec![self.next_generation_step()?])
            }
            Event::AccountCreated(user) => {
                self.complete(Request::CreateAccount)?;
                self.account_created(user);
                Ok(Vec::new())
            }
            Event::GameItemReceived(item) => {
                self.complete(Request::GameItem)?;
                let range = self.rules.repetitions;
                let game = self
                    .game
                    .as_mut()
                    .ok_or_else(|| MentorError::invalid_transition("no game in progress"))?;
                game.failed = false;
                game.round.accept_item(item, range, &mut self.rng);
                Ok(Vec::new())
            }
            Event::UserSaved(user) => {
                self.complete(Request::SaveProgress)?;
                self.user = Some(user);
                Ok(Vec::new())
            }
            Event::RequestFailed(reason) => self.request_failed(reason),
        }
    }

    // -------------------------------------------------------------------------
    // Welcome
    // -------------------------------------------------------------------------

    fn sign_up(&mut self, form: SignupForm) -> Result<Vec<Effect>> {
        self.require_screen(Screen::Welcome, "sign up")?;
        let missing = [
            ("name", &form.name),
            ("native language", &form.native_language),
            ("target language", &form.target_language),
            ("level", &form.level),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());
        if let Some((field, _)) = missing {
            return Err(MentorError::invalid_transition(format!(
                "sign-up needs a {}",
                field
            )));
        }

        let mut texts = vec![form.name.trim().to_string()];
        if !form.custom_interest.trim().is_empty() {
            texts.push(form.custom_interest.trim().to_string());
        }

        self.notice = None;
        self.form = Some(form);
        self.pending = Some(Request::ScreenSignup);
        Ok(vec![Effect::ScreenSignup { texts }])
    }

    fn signup_screened(&mut self, safe: bool) {
        let Some(form) = self.form.take() else {
            return;
        };
        if !safe {
            self.notice = Some(Notice::SignupRejected);
            return;
        }

        let preferences = form.preferences();
        self.transcript = vec![onboarding::greeting(form.name.trim(), &preferences.interests)];
        self.signup = Some(Signup {
            name: form.name.trim().to_string(),
            preferences,
            ..Default::default()
        });
        self.screen = Screen::Onboarding;
    }

    fn account_looked_up(&mut self, user: Option<User>) {
        match user {
            None => self.notice = Some(Notice::UserNotFound),
            Some(user) if user.is_banned => self.notice = Some(Notice::AccountSuspended),
            Some(user) => {
                self.user = Some(user);
                self.screen = Screen::Home;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Chat (onboarding and tutor)
    // -------------------------------------------------------------------------

    fn send(&mut self, text: String) -> Result<Vec<Effect>> {
        if !matches!(self.screen, Screen::Onboarding | Screen::Tutor) {
            return Err(MentorError::invalid_transition(format!(
                "cannot send a message from {:?}",
                self.screen
            )));
        }
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(MentorError::invalid_transition("message is empty"));
        }

        self.outgoing = Some(text.clone());
        self.pending = Some(Request::CheckSafety);
        Ok(vec![Effect::CheckSafety { text }])
    }

    fn safety_checked(&mut self, verdict: SafetyVerdict) -> Result<Vec<Effect>> {
        let text = self
            .outgoing
            .take()
            .ok_or_else(|| MentorError::invalid_transition("no message awaiting a safety check"))?;

        if !verdict.is_safe {
            let (scope, user_id) = match self.screen {
                Screen::Tutor => (Scope::Account, self.user.as_ref().map(|u| u.id.clone())),
                _ => (Scope::Device, None),
            };
            self.pending = Some(Request::RecordViolation);
            return Ok(vec![Effect::RecordViolation { scope, user_id }]);
        }

        match self.screen {
            Screen::Onboarding => {
                self.transcript.push(Message::user(text.clone()));
                if onboarding::is_complete(&self.transcript, self.rules.required_turns) {
                    let goals =
                        onboarding::goals_summary(&self.transcript, self.rules.goals_summary_chars);
                    self.signup_mut()?.preferences.goals = goals;
                    self.screen = Screen::Generating;
                    return Ok(vec![self.next_generation_step()?]);
                }

                let history = self.transcript[..self.transcript.len() - 1].to_vec();
                let known_interests = self
                    .pending_preferences()
                    .map(|p| p.interests.clone())
                    .unwrap_or_default();
                self.pending = Some(Request::OnboardingReply);
                Ok(vec![Effect::OnboardingReply {
                    history,
                    message: text,
                    known_interests,
                }])
            }
            Screen::Tutor => {
                let history = self.chat.clone();
                self.chat.push(Message::user(text.clone()));
                self.pending = Some(Request::TutorReply);
                Ok(vec![Effect::TutorReply {
                    history,
                    message: text,
                }])
            }
            other => Err(MentorError::invalid_transition(format!(
                "safety result arrived on {:?}",
                other
            ))),
        }
    }

    fn violation_recorded(&mut self, outcome: ViolationOutcome) {
        match outcome.scope {
            Scope::Device => {
                self.device.warnings = self.device.warnings.max(outcome.warnings);
                self.device.banned |= outcome.should_ban;
            }
            Scope::Account => {
                if let Some(user) = self.user.as_mut() {
                    user.warning_count = user.warning_count.max(outcome.warnings);
                    user.is_banned |= outcome.should_ban;
                }
            }
        }

        if !outcome.should_ban {
            self.notice = Some(Notice::Warning {
                scope: outcome.scope,
                warnings: outcome.warnings,
            });
        }
    }

    fn reply_received(&mut self, reply: String) -> Result<Vec<Effect>> {
        match self.pending {
            Some(Request::OnboardingReply) => {
                self.pending = None;
                self.transcript
                    .push(Message::model(onboarding::reply_or_placeholder(&reply)));
                Ok(Vec::new())
            }
            Some(Request::TutorReply) => {
                let reply = Message::model(reply);
                if reply.requests_feedback() {
                    self.notice = Some(Notice::FeedbackRequested);
                }
                self.chat.push(reply);

                let user_id = self
                    .user
                    .as_ref()
                    .map(|u| u.id.clone())
                    .ok_or_else(|| MentorError::invalid_transition("tutor reply without a user"))?;
                let message = self
                    .chat
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.text.clone())
                    .unwrap_or_default();

                self.pending = Some(Request::SaveProgress);
                Ok(vec![Effect::SaveTutorTurn {
                    user_id,
                    history: self.chat.clone(),
                    message,
                }])
            }
            other => Err(unexpected("a reply", other)),
        }
    }

    // -------------------------------------------------------------------------
    // Generating
    // -------------------------------------------------------------------------

    /// Effect for the first missing piece of the new account.
    fn next_generation_step(&mut self) -> Result<Effect> {
        let signup = self.signup_mut()?;
        signup.failed = false;

        let (request, effect) = match (&signup.persona, &signup.roadmap) {
            (None, _) => (
                Request::Persona,
                Effect::GeneratePersona(signup.preferences.clone()),
            ),
            (Some(_), None) => (
                Request::Roadmap,
                Effect::GenerateRoadmap(signup.preferences.clone()),
            ),
            (Some(persona), Some(roadmap)) => (
                Request::CreateAccount,
                Effect::CreateAccount {
                    name: signup.name.clone(),
                    preferences: signup.preferences.clone(),
                    persona: persona.clone(),
                    roadmap: roadmap.clone(),
                },
            ),
        };

        self.pending = Some(request);
        Ok(effect)
    }

    fn account_created(&mut self, user: User) {
        self.notice = Some(Notice::Credentials {
            name: user.name.clone(),
            id: user.id.clone(),
        });
        self.signup = None;
        self.transcript.clear();
        self.user = Some(user);
        self.screen = Screen::Home;
    }

    // -------------------------------------------------------------------------
    // Main tabs
    // -------------------------------------------------------------------------

    fn navigate(&mut self, tab: Tab) -> Result<Vec<Effect>> {
        if !self.screen.is_tab() || self.game.is_some() {
            return Err(MentorError::invalid_transition(format!(
                "navigation is not available on {:?}",
                self.view()
            )));
        }
        let user = self
            .user
            .as_ref()
            .ok_or_else(|| MentorError::invalid_transition("navigation needs an account"))?;

        if tab == Tab::Tutor && self.screen != Screen::Tutor {
            self.chat = if user.chat_history.is_empty() {
                vec![Message::model(format!(
                    "Hello {}! I am {}. Ready to dive into some {}?",
                    user.name, user.persona.name, user.preferences.target_language
                ))]
            } else {
                user.chat_history.clone()
            };
        }

        self.notice = None;
        self.screen = tab.screen();
        Ok(Vec::new())
    }

    fn enter_game(&mut self, kind: GameKind) -> Result<Vec<Effect>> {
        if self.screen != Screen::Games || self.game.is_some() {
            return Err(MentorError::invalid_transition(
                "games can only be started from the games hub",
            ));
        }
        if !kind.is_playable() {
            return Err(MentorError::invalid_transition(format!(
                "{} is coming soon",
                kind.title()
            )));
        }

        self.game = Some(ActiveGame {
            kind,
            round: VocabRound::new(),
            failed: false,
        });
        Ok(vec![self.fetch_item()])
    }

    fn fetch_item(&mut self) -> Effect {
        let prior_concept = self
            .round()
            .and_then(|r| r.prior_concept())
            .map(str::to_string);
        self.pending = Some(Request::GameItem);
        Effect::FetchGameItem {
            theme: self.rules.game_theme.clone(),
            prior_concept,
        }
    }

    fn answer(&mut self, option: &str) -> Result<Vec<Effect>> {
        let feedback_streak = self.rules.feedback_streak;
        let outcome = self.active_game_mut()?.round.answer(option, feedback_streak)?;

        if outcome.feedback_prompt {
            self.notice = Some(Notice::FeedbackRequested);
        }
        if !outcome.correct {
            return Ok(Vec::new());
        }

        let user_id = self
            .user
            .as_ref()
            .map(|u| u.id.clone())
            .ok_or_else(|| MentorError::invalid_transition("games need an account"))?;
        self.pending = Some(Request::SaveProgress);
        Ok(vec![Effect::AwardCorrectAnswer { user_id }])
    }

    // -------------------------------------------------------------------------
    // Failures
    // -------------------------------------------------------------------------

    fn retry(&mut self) -> Result<Vec<Effect>> {
        match self.screen {
            Screen::Generating if self.signup.as_ref().is_some_and(|s| s.failed) => {
                self.notice = None;
                Ok(vec![self.next_generation_step()?])
            }
            Screen::Games if self.game_failed() => {
                self.notice = None;
                Ok(vec![self.fetch_item()])
            }
            _ => Err(MentorError::invalid_transition("nothing to retry")),
        }
    }

    fn request_failed(&mut self, reason: String) -> Result<Vec<Effect>> {
        let request = self
            .pending
            .take()
            .ok_or_else(|| MentorError::invalid_transition("no request in flight"))?;
        debug!("{:?} failed: {}", request, reason);

        match request {
            Request::OnboardingReply => {
                self.transcript
                    .push(Message::model(onboarding::CONNECTION_TROUBLE));
            }
            Request::TutorReply => {
                // The unanswered message is dropped so it is never persisted
                self.chat.pop();
                self.notice = Some(Notice::Trouble(TUTOR_TROUBLE.to_string()));
            }
            Request::Persona | Request::Roadmap | Request::CreateAccount => {
                self.signup_mut()?.failed = true;
                self.notice = Some(Notice::Trouble(GENERATION_TROUBLE.to_string()));
            }
            Request::GameItem => {
                self.active_game_mut()?.failed = true;
                self.notice = Some(Notice::Trouble(GENERATION_TROUBLE.to_string()));
            }
            Request::ScreenSignup => {
                self.form = None;
                self.notice = Some(Notice::Trouble(reason));
            }
            Request::CheckSafety => {
                self.outgoing = None;
                self.notice = Some(Notice::Trouble(reason));
            }
            Request::LookupAccount | Request::RecordViolation | Request::SaveProgress => {
                self.notice = Some(Notice::Trouble(reason));
            }
        }
        Ok(Vec::new())
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn require_screen(&self, screen: Screen, action: &str) -> Result<()> {
        if self.screen != screen {
            return Err(MentorError::invalid_transition(format!(
                "cannot {} from {:?}",
                action, self.screen
            )));
        }
        Ok(())
    }

    /// Clear the pending request, which must be `expected`.
    fn complete(&mut self, expected: Request) -> Result<()> {
        if self.pending != Some(expected) {
            return Err(unexpected(&format!("{:?} result", expected), self.pending));
        }
        self.pending = None;
        Ok(())
    }

    fn signup_mut(&mut self) -> Result<&mut Signup> {
        self.signup
            .as_mut()
            .ok_or_else(|| MentorError::invalid_transition("no sign-up in progress"))
    }

    fn active_game(&self) -> Result<&ActiveGame> {
        self.game
            .as_ref()
            .ok_or_else(|| MentorError::invalid_transition("no game in progress"))
    }

    fn active_game_mut(&mut self) -> Result<&mut ActiveGame> {
        self.game
            .as_mut()
            .ok_or_else(|| MentorError::invalid_transition("no game in progress"))
    }
}

fn unexpected(what: &str, pending: Option<Request>) -> MentorError {
    MentorError::invalid_transition(format!(
        "unexpected {} (waiting for {:?})",
        what, pending
    ))
}
