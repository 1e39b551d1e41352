//! Core types and logic for Mentor.
//!
//! This module contains the data model, the moderation gate, the session
//! state machine and the small rule modules it is built from.

pub mod model;
pub mod moderation;
pub mod onboarding;
pub mod practice;
pub mod progress;
pub mod session;

pub use model::{
    DeviceState, GameContent, Message, ProgressUpdate, Role, Roadmap, TeacherPersona, User,
    UserPreferences, UserProgress, WeeklyGoal,
};
pub use moderation::{ModerationGate, Scope, ViolationOutcome};
pub use practice::{AnswerOutcome, GameKind, RepetitionRange, VocabRound};
pub use session::{
    Effect, Event, GenerationStep, Notice, Request, Screen, Session, SessionRules, SignupForm,
    Tab, View,
};
