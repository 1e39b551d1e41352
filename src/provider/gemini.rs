//! Hosted Gemini provider.
//!
//! Calls the `generateContent` REST endpoint with a blocking client.
//! Structured calls send a JSON response schema and decode the returned
//! text as JSON; chat calls return the text as-is.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::core::model::{GameContent, Message, Roadmap, TeacherPersona, UserPreferences};
use crate::error::{MentorError, Result};
use crate::provider::prompts;
use crate::provider::traits::{
    ChatRequest, ContentProvider, GameItemRequest, OnboardingRequest, SafetyVerdict,
};

const HARM_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Provider backed by the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    /// Build a provider from configuration.
    ///
    /// Fails if no API key is set in the environment.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let api_key = config.api_key().ok_or_else(|| {
            MentorError::config(format!(
                "no API key found (set {} or API_KEY, or use --offline)",
                config.api_key_env
            ))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| MentorError::provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }

    fn send(&self, body: &GenerateContentRequest) -> Result<String> {
        debug!("Gemini request to {}", self.model);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .map_err(|err| MentorError::provider(format!("Gemini request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .unwrap_or_else(|_| "failed to read Gemini error body".to_string());
            return Err(map_http_error(status, &text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .map_err(|err| MentorError::malformed(format!("Gemini response: {err}")))?;

        extract_text(parsed)
    }

    fn structured<T: DeserializeOwned>(
        &self,
        prompt: String,
        schema: Value,
        unfiltered: bool,
    ) -> Result<T> {
        let mut body = GenerateContentRequest::single(prompt);
        body.generation_config = Some(GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: schema,
        });
        if unfiltered {
            body.safety_settings = unfiltered_safety_settings();
        }

        let text = self.send(&body)?;
        serde_json::from_str(&text)
            .map_err(|err| MentorError::malformed(format!("unexpected JSON from Gemini: {err}")))
    }
}

impl ContentProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn check_safety(&self, text: &str) -> Result<SafetyVerdict> {
        let mut verdict: SafetyVerdict =
            self.structured(prompts::safety(text), safety_schema(), true)?;
        if verdict.reason.as_deref().is_some_and(|r| r.trim().is_empty()) {
            verdict.reason = None;
        }
        Ok(verdict)
    }

    fn onboarding_reply(&self, request: &OnboardingRequest<'_>) -> Result<String> {
        let body = GenerateContentRequest::conversation(
            request.history,
            request.message,
            prompts::onboarding_instruction(request.known_interests),
        );
        self.send(&body)
    }

    fn generate_persona(&self, preferences: &UserPreferences) -> Result<TeacherPersona> {
        self.structured(prompts::persona(preferences), persona_schema(), true)
    }

    fn generate_roadmap(&self, preferences: &UserPreferences) -> Result<Roadmap> {
        self.structured(prompts::roadmap(preferences), roadmap_schema(), false)
    }

    fn generate_game_item(&self, request: &GameItemRequest<'_>) -> Result<GameContent> {
        self.structured(prompts::game_item(request), game_item_schema(), false)
    }

    fn chat(&self, request: &ChatRequest<'_>) -> Result<String> {
        let body = GenerateContentRequest::conversation(
            request.history,
            request.message,
            prompts::tutor_instruction(request),
        );
        self.send(&body)
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
}

impl GenerateContentRequest {
    fn single(prompt: String) -> Self {
        Self {
            contents: vec![Content::text("user", prompt)],
            system_instruction: None,
            generation_config: None,
            safety_settings: Vec::new(),
        }
    }

    /// History followed by the new user message, under a system instruction.
    fn conversation(history: &[Message], message: &str, instruction: String) -> Self {
        let mut contents: Vec<Content> = history
            .iter()
            .map(|m| Content::text(m.role.as_str(), m.text.clone()))
            .collect();
        contents.push(Content::text("user", message.to_string()));

        Self {
            contents,
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part { text: instruction }],
            }),
            generation_config: None,
            safety_settings: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: String) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

fn unfiltered_safety_settings() -> Vec<SafetySetting> {
    HARM_CATEGORIES
        .iter()
        .map(|category| SafetySetting {
            category: *category,
            threshold: "BLOCK_NONE",
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn extract_text(response: GenerateContentResponse) -> Result<String> {
    response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .ok_or_else(|| MentorError::malformed("Gemini returned no candidates"))
}

/// Whether a failed request may succeed if the user tries again.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn map_http_error(status: StatusCode, body: &str) -> MentorError {
    let detail = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let message = wrapper.error.message.unwrap_or_else(|| body.to_string());
            match wrapper.error.status {
                Some(s) if !s.is_empty() => format!("{s}: {message}"),
                _ => message,
            }
        })
        .unwrap_or_else(|_| body.to_string());

    let hint = if is_retryable_status(status) {
        "try again shortly"
    } else {
        "not retryable"
    };
    MentorError::provider(format!("Gemini HTTP {} ({}): {}", status.as_u16(), hint, detail))
}

// =============================================================================
// Response schemas
// =============================================================================

fn safety_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "isSafe": { "type": "BOOLEAN" },
            "reason": { "type": "STRING" }
        },
        "required": ["isSafe", "reason"]
    })
}

fn persona_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": { "type": "STRING" },
            "age": { "type": "INTEGER" },
            "personality": { "type": "STRING" },
            "teachingStyle": { "type": "STRING" },
            "catchphrase": { "type": "STRING" },
            "avatarSeed": {
                "type": "INTEGER",
                "description": "A random number between 1 and 1000 for image generation"
            }
        },
        "required": ["name", "age", "personality", "teachingStyle", "catchphrase", "avatarSeed"]
    })
}

fn roadmap_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "weeks": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "week": { "type": "INTEGER" },
                        "theme": { "type": "STRING" },
                        "focus": { "type": "STRING" },
                        "activity": { "type": "STRING" },
                        "completed": { "type": "BOOLEAN" }
                    },
                    "required": ["week", "theme", "focus", "activity", "completed"]
                }
            }
        },
        "required": ["weeks"]
    })
}

fn game_item_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "question": { "type": "STRING" },
            "options": { "type": "ARRAY", "items": { "type": "STRING" } },
            "correctAnswer": { "type": "STRING" },
            "explanation": { "type": "STRING" },
            "concept": { "type": "STRING" },
            "category": {
                "type": "STRING",
                "description": "A general topic name such as 'Greetings', not the tested word."
            }
        },
        "required": ["question", "options", "correctAnswer", "explanation", "concept", "category"]
    })
}
