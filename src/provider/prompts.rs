//! Prompt builders for the hosted provider.
//!
//! Each builder is a pure function of its request so prompts can be
//! checked in tests without a network.

use crate::core::model::{is_beginner_level, TeacherPersona, UserPreferences, FEEDBACK_MARKER};
use crate::provider::traits::{ChatRequest, GameItemRequest};

/// Topics the classifier must reject.
pub const PROHIBITED_TOPICS: &[&str] = &[
    "Politics, government or regimes (insults, criticism, sensitive political discussion)",
    "Religion (insults, blasphemy, controversial religious debate)",
    "Racism, hate speech, discrimination",
    "Dating, romance, flirting, sexual content, sexuality",
    "Drugs, alcohol, illegal acts",
    "Violence, terrorism, extremism",
    "Profanity, insults, bad words",
    "Religiously prohibited topics such as pork, gambling, alcohol or adultery",
];

/// Prompt for the safety classifier.
pub fn safety(text: &str) -> String {
    let topics = PROHIBITED_TOPICS
        .iter()
        .map(|topic| format!("- {}", topic))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Check the user text below against this list of prohibited topics:\n\
         {topics}\n\n\
         Text: \"{text}\"\n\n\
         Greetings and ordinary language-learning questions are safe.\n\
         Answer with JSON {{\"isSafe\": boolean, \"reason\": string}}; \
         leave reason empty when the text is safe."
    )
}

/// System instruction for the onboarding assistant.
pub fn onboarding_instruction(known_interests: &str) -> String {
    let interests = if known_interests.trim().is_empty() {
        "Unknown"
    } else {
        known_interests
    };

    format!(
        "You are a friendly onboarding assistant for a language learning app. \
         Collect what is still missing to build a study plan.\n\n\
         Known interests: {interests}. Acknowledge them warmly but do not ask about them again.\n\n\
         Still missing, ask one at a time:\n\
         1. Motivation or concrete goal (work, travel, exams...).\n\
         2. Daily time available, in minutes.\n\n\
         Once you know both, end your reply with the question \
         \"Do you have anything else to add?\".\n\
         Keep replies short and encouraging. Do not write the plan yet."
    )
}

/// Prompt for persona generation.
pub fn persona(preferences: &UserPreferences) -> String {
    format!(
        "Create a language teacher persona for a student learning {target}.\n\
         Student interests: {interests}.\n\
         Student goal: {goals}.\n\
         Learning style: {style}.\n\n\
         If the interests or goal mention any prohibited topic (politics, romance, drugs and the like), \
         ignore them and use travel and culture instead. Keep the persona neutral, professional and respectful.\n\
         Give the teacher a name, an age, a personality, a teaching style suited to this student, \
         a short catchphrase and an avatarSeed between 1 and 1000.",
        target = preferences.target_language,
        interests = preferences.interests,
        goals = preferences.goals,
        style = preferences.learning_style,
    )
}

/// Prompt for roadmap generation.
pub fn roadmap(preferences: &UserPreferences) -> String {
    format!(
        "Create a 4-week learning roadmap for {target} (level: {level}).\n\
         Focus: {goals}.\n\
         Interests: {interests}.\n\n\
         Ignore any prohibited topics in the focus or interests and fall back to general language skills.\n\
         Return exactly 4 weekly goals numbered 1 to 4.",
        target = preferences.target_language,
        level = preferences.level,
        goals = preferences.goals,
        interests = preferences.interests,
    )
}

/// Prompt for one vocabulary item.
pub fn game_item(request: &GameItemRequest<'_>) -> String {
    let GameItemRequest {
        target_language: target,
        native_language: native,
        level,
        theme,
        prior_concept,
    } = *request;
    let beginner = is_beginner_level(level);

    let (opening, language_rule, concept_rule) = match prior_concept {
        Some(concept) => (
            format!("Write a multiple-choice vocabulary question practising the concept \"{concept}\"."),
            if beginner {
                format!(
                    "The learner is a beginner ({level}): write the question in {native}, asking what \
                     '{concept}' means or how to say it in {target}. Options are in {target}."
                )
            } else {
                format!("Write the question in simple {target}.")
            },
            format!("concept: repeat \"{concept}\""),
        ),
        None => (
            format!("Write one multiple-choice vocabulary question about \"{theme}\"."),
            if beginner {
                format!(
                    "The learner is a beginner ({level}): write the question in {native}, for example \
                     \"How do you say 'Apple' in {target}?\". Options are in {target}."
                )
            } else {
                format!("Write the question in {target}.")
            },
            "concept: the word being tested".to_string(),
        ),
    };

    format!(
        "{opening}\n\
         Target language: {target}\n\
         Native language: {native}\n\
         Level: {level}\n\n\
         {language_rule}\n\n\
         Return JSON with question, options (exactly 4 strings), correctAnswer (one of the options), \
         explanation (in {native}), {concept_rule}, and category (a broad topic in {native} such as \
         Greetings, Food or Travel, never the answer itself)."
    )
}

/// System instruction for the tutor persona.
pub fn tutor_instruction(request: &ChatRequest<'_>) -> String {
    let ChatRequest {
        persona,
        target_language: target,
        native_language: native,
        level,
        last_topic,
        ..
    } = *request;

    let context = match last_topic {
        Some(topic) if !topic.trim().is_empty() => format!(
            "Last session the student talked about \"{topic}\". Pick it up again if it fits, \
             or ask how they are getting on with it.\n"
        ),
        _ => String::new(),
    };

    let level_rule = if is_beginner_level(level) {
        format!(
            "The student is a beginner ({level}). Explain in {native} and set up exercises in {native}, \
             but ask for the practice phrases in {target}, e.g. \"How would you say 'Good morning' in {target}?\". \
             Use {target} only for the words and sentences being practised."
        )
    } else {
        format!("Use mostly {target}; explain harder mistakes in {native}.")
    };

    format!(
        "{identity}\n\
         Target language: {target}.\n\
         Student's native language: {native}.\n\
         Student's level: {level}.\n\
         {context}\n\
         Help the student, correct mistakes gently and stay in character.\n\
         {level_rule}\n\
         If the student writes in {native}, help them say it in {target}.\n\n\
         Now and then (not every turn) ask how they are finding the lessons. When they give any feedback, \
         thank them and end the reply with the exact tag {FEEDBACK_MARKER}.",
        identity = persona_identity(persona),
    )
}

fn persona_identity(persona: &TeacherPersona) -> String {
    format!(
        "You are {}, a {}-year-old language teacher. Personality: {}. Teaching style: {}.",
        persona.name, persona.age, persona.personality, persona.teaching_style
    )
}
