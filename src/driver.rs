//! Effect driver for Mentor.
//!
//! [`App`] owns the record store, the content façade and the current
//! [`Session`]. It feeds learner events into the session, runs the
//! effects that come back one at a time, and turns each outcome into the
//! next event. Provider failures are handed to the session as
//! `RequestFailed` so the UI can offer a retry; local faults (storage,
//! illegal state) are surfaced to the caller after the session has been
//! told.

use std::collections::VecDeque;

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::core::moderation::{ModerationGate, Scope};
use crate::core::progress;
use crate::core::session::{Effect, Event, Session, SessionRules};
use crate::error::{MentorError, Result};
use crate::provider::{ChatRequest, ContentFacade, GameItemRequest, OnboardingRequest};
use crate::storage::{KeyValueStore, RecordStore};

/// A running Mentor instance.
pub struct App<S: KeyValueStore> {
    records: RecordStore<S>,
    facade: ContentFacade,
    gate: ModerationGate,
    config: Config,
    session: Session,
}

impl<S: KeyValueStore> App<S> {
    /// Start a session on the welcome screen.
    ///
    /// The device moderation state is read from the store, so a banned
    /// device starts banned.
    pub fn new(records: RecordStore<S>, facade: ContentFacade, config: Config) -> Result<Self> {
        let device = records.device_state()?;
        if device.banned {
            warn!("Starting on a banned device");
        }

        Ok(Self {
            session: Session::new(SessionRules::from_config(&config), device),
            gate: ModerationGate::from_config(&config.moderation),
            records,
            facade,
            config,
        })
    }

    /// Seed the session's quiz generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.session = self.session.with_seed(seed);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn records(&self) -> &RecordStore<S> {
        &self.records
    }

    pub fn provider_name(&self) -> &str {
        self.facade.provider_name()
    }

    /// Apply a learner event and run every effect it causes.
    ///
    /// Returns once the session has no request outstanding.
    pub fn dispatch(&mut self, event: Event) -> Result<()> {
        let (next, effects) = self.session.apply(event)?;
        self.session = next;

        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            debug!("Running {}", effect_label(&effect));

            let outcome = match self.execute(effect) {
                Ok(event) => event,
                Err(err) if err.is_transient() => {
                    warn!("Provider request failed: {}", err);
                    Event::RequestFailed(err.to_string())
                }
                Err(err) => {
                    let (next, _) = self.session.apply(Event::RequestFailed(err.to_string()))?;
                    self.session = next;
                    return Err(err);
                }
            };

            let (next, effects) = self.session.apply(outcome)?;
            self.session = next;
            queue.extend(effects);
        }
        Ok(())
    }

    /// Run one effect and describe its outcome as an event.
    fn execute(&mut self, effect: Effect) -> Result<Event> {
        match effect {
            Effect::ScreenSignup { texts } => {
                let safe = texts
                    .iter()
                    .all(|text| self.gate.check_safety(&self.facade, text).is_safe);
                Ok(Event::SignupScreened { safe })
            }

            Effect::LookupAccount { name, id } => Ok(Event::AccountLookedUp(
                self.records.find_user_by_name_and_id(&name, &id).cloned(),
            )),

            Effect::CheckSafety { text } => Ok(Event::SafetyChecked(
                self.gate.check_safety(&self.facade, &text),
            )),

            Effect::RecordViolation { scope, user_id } => {
                let outcome = match (scope, user_id) {
                    (Scope::Device, _) => self.gate.apply_device_violation(&self.records)?,
                    (Scope::Account, Some(user_id)) => self
                        .gate
                        .apply_account_violation(&mut self.records, &user_id)?,
                    (Scope::Account, None) => {
                        return Err(MentorError::invalid_transition(
                            "account violation without an account",
                        ))
                    }
                };
                Ok(Event::ViolationRecorded(outcome))
            }

            Effect::OnboardingReply {
                history,
                message,
                known_interests,
            } => {
                let request = OnboardingRequest {
                    history: &history,
                    message: &message,
                    known_interests: &known_interests,
                };
                Ok(Event::ReplyReceived(self.facade.onboarding_reply(&request)?))
            }

            Effect::GeneratePersona(preferences) => Ok(Event::PersonaGenerated(
                self.facade.generate_persona(&preferences)?,
            )),

            Effect::GenerateRoadmap(preferences) => Ok(Event::RoadmapGenerated(
                self.facade.generate_roadmap(&preferences)?,
            )),

            Effect::CreateAccount {
                name,
                preferences,
                persona,
                roadmap,
            } => Ok(Event::AccountCreated(self.records.create_user(
                &name,
                preferences,
                persona,
                roadmap,
            )?)),

            Effect::TutorReply { history, message } => {
                let user = self
                    .session
                    .user()
                    .ok_or_else(|| MentorError::invalid_transition("tutor chat needs an account"))?;
                let request = ChatRequest {
                    history: &history,
                    message: &message,
                    persona: &user.persona,
                    target_language: &user.preferences.target_language,
                    native_language: &user.preferences.native_language,
                    level: &user.preferences.level,
                    last_topic: Some(user.progress.last_topic.as_str()),
                };
                Ok(Event::ReplyReceived(self.facade.chat(&request)?))
            }

            Effect::SaveTutorTurn {
                user_id,
                history,
                message,
            } => {
                let current = self
                    .records
                    .get_user(&user_id)
                    .ok_or_else(|| MentorError::user_not_found(&user_id))?;
                let update = progress::tutor_turn(
                    &current.progress,
                    &message,
                    self.config.progress.xp_per_tutor_turn,
                    Utc::now(),
                );
                let saved = self
                    .records
                    .update_user_progress(&user_id, &update, Some(history))?
                    .ok_or_else(|| MentorError::user_not_found(&user_id))?;
                Ok(Event::UserSaved(saved))
            }

            Effect::FetchGameItem {
                theme,
                prior_concept,
            } => {
                let user = self
                    .session
                    .user()
                    .ok_or_else(|| MentorError::invalid_transition("games need an account"))?;
                let request =
                    GameItemRequest::for_learner(&user.preferences, &theme, prior_concept.as_deref());
                Ok(Event::GameItemReceived(
                    self.facade.generate_game_item(&request)?,
                ))
            }

            Effect::AwardCorrectAnswer { user_id } => {
                let current = self
                    .records
                    .get_user(&user_id)
                    .ok_or_else(|| MentorError::user_not_found(&user_id))?;
                let update = progress::correct_answer(
                    &current.progress,
                    self.config.progress.xp_per_correct_answer,
                    Utc::now(),
                );
                let saved = self
                    .records
                    .update_user_progress(&user_id, &update, None)?
                    .ok_or_else(|| MentorError::user_not_found(&user_id))?;
                Ok(Event::UserSaved(saved))
            }
        }
    }
}

fn effect_label(effect: &Effect) -> &'static str {
    match effect {
        Effect::ScreenSignup { .. } => "sign-up screening",
        Effect::LookupAccount { .. } => "account lookup",
        Effect::CheckSafety { .. } => "safety check",
        Effect::RecordViolation { .. } => "violation record",
        Effect::OnboardingReply { .. } => "onboarding reply",
        Effect::GeneratePersona(_) => "persona generation",
        Effect::GenerateRoadmap(_) => "roadmap generation",
        Effect::CreateAccount { .. } => "account creation",
        Effect::TutorReply { .. } => "tutor reply",
        Effect::SaveTutorTurn { .. } => "tutor turn save",
        Effect::FetchGameItem { .. } => "quiz item",
        Effect::AwardCorrectAnswer { .. } => "xp award",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Role;
    use crate::core::practice::GameKind;
    use crate::core::session::{GenerationStep, Notice, SignupForm, Tab, View};
    use crate::provider::{OfflineProvider, Outage};
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    struct Harness {
        app: App<Arc<MemoryStore>>,
        store: Arc<MemoryStore>,
        provider: OfflineProvider,
    }

    fn harness_with(store: Arc<MemoryStore>) -> Harness {
        let provider = OfflineProvider::new();
        let config = Config::default();
        let records = RecordStore::open(Arc::clone(&store), config.storage.id_space)
            .unwrap()
            .with_seed(3);
        let app = App::new(records, ContentFacade::new(provider.clone()), config)
            .unwrap()
            .with_seed(3);
        Harness {
            app,
            store,
            provider,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(MemoryStore::new()))
    }

    fn form() -> SignupForm {
        SignupForm {
            name: "Alex".to_string(),
            native_language: "English".to_string(),
            target_language: "German".to_string(),
            level: "Beginner (A1)".to_string(),
            interests: vec!["Travel".to_string()],
            custom_interest: String::new(),
        }
    }

    fn onboard(h: &mut Harness) {
        h.app.dispatch(Event::SignUp(form())).unwrap();
        for text in ["I want to work in Berlin", "20 minutes a day", "No"] {
            h.app.dispatch(Event::Send(text.into())).unwrap();
        }
    }

    #[test]
    fn test_full_signup_creates_account() {
        let mut h = harness();
        onboard(&mut h);

        let session = h.app.session();
        assert_eq!(session.view(), View::Home);
        assert!(!session.is_busy());

        let user = session.user().unwrap().clone();
        assert_eq!(user.name, "Alex");
        assert!(user.id.len() >= 3);
        assert!(user.id.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(user.roadmap.weeks.len(), 4);
        assert!(user.preferences.goals.starts_with("model: Hi Alex!"));
        assert!(matches!(
            session.notice(),
            Some(Notice::Credentials { id, .. }) if id == &user.id
        ));

        let stored = h.app.records().get_user(&user.id).unwrap();
        assert_eq!(stored, &user);
    }

    #[test]
    fn test_onboarding_replies_are_recorded() {
        let mut h = harness();
        h.app.dispatch(Event::SignUp(form())).unwrap();
        h.app.dispatch(Event::Send("Work".into())).unwrap();

        let transcript = h.app.session().transcript();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[1].role, Role::User);
        assert_eq!(transcript[2].role, Role::Model);
    }

    #[test]
    fn test_unsafe_signup_name_is_rejected_without_strike() {
        let mut h = harness();
        let mut form = form();
        form.custom_interest = "politics".to_string();
        h.app.dispatch(Event::SignUp(form)).unwrap();

        assert_eq!(h.app.session().view(), View::Welcome);
        assert_eq!(h.app.session().notice(), Some(&Notice::SignupRejected));
        assert_eq!(h.app.records().get_device_warnings().unwrap(), 0);
    }

    #[test]
    fn test_device_ban_persists_across_restart() {
        let mut h = harness();
        h.app.dispatch(Event::SignUp(form())).unwrap();
        h.app.dispatch(Event::Send("tell me about politics".into())).unwrap();
        assert_eq!(h.app.records().get_device_warnings().unwrap(), 1);
        assert_eq!(h.app.session().view(), View::Onboarding);

        h.app.dispatch(Event::Send("more politics".into())).unwrap();
        assert_eq!(h.app.session().view(), View::Banned);
        assert!(h.app.records().is_device_banned().unwrap());

        let restarted = harness_with(Arc::clone(&h.store));
        assert_eq!(restarted.app.session().view(), View::Banned);
    }

    #[test]
    fn test_failed_device_ban_is_retried_on_next_violation() {
        let mut h = harness();
        h.app.dispatch(Event::SignUp(form())).unwrap();
        h.app.dispatch(Event::Send("tell me about politics".into())).unwrap();

        h.store.set_fail_writes(true);
        let err = h.app.dispatch(Event::Send("more politics".into())).unwrap_err();
        assert!(matches!(err, MentorError::Storage { .. }));
        assert!(!h.app.session().is_busy());
        assert_eq!(h.app.session().view(), View::Onboarding);
        assert_eq!(h.app.records().get_device_warnings().unwrap(), 1);
        assert!(!h.app.records().is_device_banned().unwrap());

        h.store.set_fail_writes(false);
        h.app.dispatch(Event::Send("politics again".into())).unwrap();
        assert_eq!(h.app.session().view(), View::Banned);
        assert!(h.app.records().is_device_banned().unwrap());
    }

    #[test]
    fn test_classifier_outage_lets_message_through() {
        let mut h = harness();
        h.app.dispatch(Event::SignUp(form())).unwrap();
        h.provider.set_outage(Outage::Classifier);

        h.app.dispatch(Event::Send("politics".into())).unwrap();
        assert_eq!(h.app.session().transcript().len(), 3);
        assert_eq!(h.app.records().get_device_warnings().unwrap(), 0);
    }

    #[test]
    fn test_generation_outage_then_retry() {
        let mut h = harness();
        h.app.dispatch(Event::SignUp(form())).unwrap();
        h.app.dispatch(Event::Send("Work".into())).unwrap();
        h.app.dispatch(Event::Send("Daily".into())).unwrap();

        h.provider.set_outage(Outage::Generation);
        h.app.dispatch(Event::Send("No".into())).unwrap();
        assert_eq!(
            h.app.session().view(),
            View::Generating {
                step: GenerationStep::Persona,
                failed: true
            }
        );
        assert!(h.app.records().list_users().is_empty());

        h.provider.restore();
        h.app.dispatch(Event::Retry).unwrap();
        assert_eq!(h.app.session().view(), View::Home);
        assert_eq!(h.app.records().list_users().len(), 1);
    }

    #[test]
    fn test_storage_failure_on_create_is_surfaced() {
        let mut h = harness();
        h.app.dispatch(Event::SignUp(form())).unwrap();
        h.app.dispatch(Event::Send("Work".into())).unwrap();
        h.app.dispatch(Event::Send("Daily".into())).unwrap();

        h.store.set_fail_writes(true);
        let err = h.app.dispatch(Event::Send("No".into())).unwrap_err();
        assert!(matches!(err, MentorError::Storage { .. }));

        let session = h.app.session();
        assert!(!session.is_busy());
        assert!(session.user().is_none());
        assert_eq!(
            session.view(),
            View::Generating {
                step: GenerationStep::Account,
                failed: true
            }
        );

        h.store.set_fail_writes(false);
        h.app.dispatch(Event::Retry).unwrap();
        assert_eq!(h.app.session().view(), View::Home);
    }

    #[test]
    fn test_login_after_signup() {
        let mut h = harness();
        onboard(&mut h);
        let id = h.app.session().user().unwrap().id.clone();

        let mut fresh = harness_with(Arc::clone(&h.store));
        fresh
            .app
            .dispatch(Event::LogIn {
                name: " alex ".into(),
                id: id.clone(),
            })
            .unwrap();
        assert_eq!(fresh.app.session().view(), View::Home);
        assert_eq!(fresh.app.session().user().unwrap().id, id);
    }

    #[test]
    fn test_tutor_turn_persists_history_and_xp() {
        let mut h = harness();
        onboard(&mut h);
        let id = h.app.session().user().unwrap().id.clone();

        h.app.dispatch(Event::Navigate(Tab::Tutor)).unwrap();
        h.app.dispatch(Event::Send("Wie geht's?".into())).unwrap();

        let stored = h.app.records().get_user(&id).unwrap();
        assert_eq!(stored.chat_history.len(), 3);
        assert_eq!(stored.chat_history[1].text, "Wie geht's?");
        assert_eq!(stored.progress.xp, 10);
        assert_eq!(stored.progress.last_topic, "Wie geht's?");
        assert_eq!(h.app.session().chat().len(), 3);
    }

    #[test]
    fn test_tutor_outage_persists_nothing() {
        let mut h = harness();
        onboard(&mut h);
        let id = h.app.session().user().unwrap().id.clone();
        h.app.dispatch(Event::Navigate(Tab::Tutor)).unwrap();

        h.provider.set_outage(Outage::Generation);
        h.app.dispatch(Event::Send("Hallo".into())).unwrap();

        let stored = h.app.records().get_user(&id).unwrap();
        assert!(stored.chat_history.is_empty());
        assert_eq!(stored.progress.xp, 0);
        assert!(matches!(h.app.session().notice(), Some(Notice::Trouble(_))));
    }

    #[test]
    fn test_account_ban_from_tutor() {
        let mut h = harness();
        onboard(&mut h);
        let id = h.app.session().user().unwrap().id.clone();
        h.app.dispatch(Event::Navigate(Tab::Tutor)).unwrap();

        h.app.dispatch(Event::Send("drugs".into())).unwrap();
        assert_eq!(h.app.records().get_user(&id).unwrap().warning_count, 1);
        h.app.dispatch(Event::Send("drugs again".into())).unwrap();

        assert_eq!(h.app.session().view(), View::Banned);
        assert!(h.app.records().get_user(&id).unwrap().is_banned);
        assert!(!h.app.records().is_device_banned().unwrap());

        // A suspended account cannot log back in
        let mut fresh = harness_with(Arc::clone(&h.store));
        fresh
            .app
            .dispatch(Event::LogIn {
                name: "Alex".into(),
                id,
            })
            .unwrap();
        assert_eq!(fresh.app.session().view(), View::Welcome);
        assert_eq!(fresh.app.session().notice(), Some(&Notice::AccountSuspended));
    }

    #[test]
    fn test_vocab_game_awards_xp() {
        let mut h = harness();
        onboard(&mut h);
        let id = h.app.session().user().unwrap().id.clone();

        h.app.dispatch(Event::Navigate(Tab::Games)).unwrap();
        h.app.dispatch(Event::EnterGame(GameKind::Vocab)).unwrap();
        let answer = h
            .app
            .session()
            .round()
            .and_then(|r| r.item())
            .map(|item| item.correct_answer.clone())
            .unwrap();

        h.app.dispatch(Event::Answer(answer)).unwrap();
        assert_eq!(h.app.records().get_user(&id).unwrap().progress.xp, 5);

        h.app.dispatch(Event::NextItem).unwrap();
        let round = h.app.session().round().unwrap();
        assert_eq!(round.reps(), 2);
        assert!(!round.is_answered());
    }

    #[test]
    fn test_busy_is_never_left_set() {
        let mut h = harness();
        onboard(&mut h);
        assert!(h.app.dispatch(Event::Retry).is_err());
        assert!(!h.app.session().is_busy());
    }
}
