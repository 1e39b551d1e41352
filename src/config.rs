//! Configuration loading for Mentor.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.mentor/config.toml`)
//! 3. User config (`~/.mentor/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional. The app runs with the defaults below
//! when no config exists.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MentorError, Result};

/// Main configuration struct for Mentor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Content provider configuration.
    pub provider: ProviderConfig,
    /// Moderation policy.
    pub moderation: ModerationConfig,
    /// Onboarding chat rules.
    pub onboarding: OnboardingConfig,
    /// Vocabulary game rules.
    pub practice: PracticeConfig,
    /// Experience rewards.
    pub progress: ProgressConfig,
    /// Record store settings.
    pub storage: StorageConfig,
}

/// Valid values for the provider kind field.
pub const VALID_PROVIDERS: &[&str] = &["gemini", "offline"];

/// Content provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Which provider to use: "gemini" or "offline".
    pub kind: String,
    /// Model name sent to the generative API.
    pub model: String,
    /// Base URL of the `generateContent` REST endpoint.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl ProviderConfig {
    /// Check if a provider kind is valid.
    pub fn is_valid_kind(value: &str) -> bool {
        VALID_PROVIDERS.contains(&value)
    }

    /// Check if a timeout is valid (must be >= 1 second).
    pub fn is_valid_timeout(value: u64) -> bool {
        value >= 1
    }

    /// Resolve the API key from the configured variable, then `API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        env::var(&self.api_key_env)
            .ok()
            .or_else(|| env::var("API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: "gemini".to_string(),
            model: "gemini-3-flash-preview".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Moderation policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModerationConfig {
    /// Number of violations in one scope that results in a ban.
    pub ban_threshold: u32,
}

impl ModerationConfig {
    /// A threshold of 0 would ban before any violation.
    pub fn is_valid_threshold(value: u32) -> bool {
        value >= 1
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self { ban_threshold: 2 }
    }
}

/// Onboarding chat configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OnboardingConfig {
    /// User turns collected before the profile is generated.
    pub required_turns: u32,
    /// Maximum characters kept from the transcript as the goals summary.
    pub goals_summary_chars: usize,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            required_turns: 3,
            goals_summary_chars: 150,
        }
    }
}

/// Vocabulary game configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PracticeConfig {
    /// Fewest questions asked about one concept before rotating.
    pub min_repetitions: u32,
    /// Most questions asked about one concept before rotating.
    pub max_repetitions: u32,
    /// Consecutive correct answers that raise the feedback prompt.
    pub feedback_streak: u32,
    /// Theme used when no concept is being reinforced.
    pub default_theme: String,
}

impl PracticeConfig {
    /// Check that the repetition range is non-empty and starts at 1 or more.
    pub fn is_valid_range(min: u32, max: u32) -> bool {
        min >= 1 && min <= max
    }
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            min_repetitions: 3,
            max_repetitions: 5,
            feedback_streak: 3,
            default_theme: "Common Phrases".to_string(),
        }
    }
}

/// Experience reward configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProgressConfig {
    /// XP awarded for each completed tutor exchange.
    pub xp_per_tutor_turn: u32,
    /// XP awarded for each correct game answer.
    pub xp_per_correct_answer: u32,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            xp_per_tutor_turn: 10,
            xp_per_correct_answer: 5,
        }
    }
}

/// Record store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Size of the numeric account code space (codes are 1..=id_space).
    pub id_space: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { id_space: 100_000 }
    }
}

impl Config {
    /// Load configuration with full precedence chain.
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration with a specific working directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.apply_env_overrides();
        config
    }

    /// Load user config from `~/.mentor/config.toml`.
    fn load_user_config() -> Option<Config> {
        let home = mentor_home()?;
        Self::load_from_file(&home.join("config.toml")).ok()
    }

    /// Load project config from `.mentor/config.toml` in the given directory.
    fn load_project_config(cwd: &Path) -> Option<Config> {
        let config_path = cwd.join(".mentor").join("config.toml");
        Self::load_from_file(&config_path).ok()
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| MentorError::storage(path, e))?;
        toml::from_str(&content).map_err(|e| MentorError::config(e.to_string()))
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| MentorError::config(e.to_string()))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // MENTOR_PROVIDER
        if let Ok(val) = env::var("MENTOR_PROVIDER") {
            if ProviderConfig::is_valid_kind(&val) {
                self.provider.kind = val;
            } else {
                eprintln!(
                    "Warning: Invalid MENTOR_PROVIDER value '{}'. \
                    Valid values: {:?}. Using default '{}'.",
                    val, VALID_PROVIDERS, self.provider.kind
                );
            }
        }

        // MENTOR_MODEL
        if let Ok(val) = env::var("MENTOR_MODEL") {
            if val.trim().is_empty() {
                eprintln!(
                    "Warning: Empty MENTOR_MODEL value. Using default '{}'.",
                    self.provider.model
                );
            } else {
                self.provider.model = val;
            }
        }

        // MENTOR_TIMEOUT_SECONDS
        if let Ok(val) = env::var("MENTOR_TIMEOUT_SECONDS") {
            match val.parse::<u64>() {
                Ok(n) if ProviderConfig::is_valid_timeout(n) => self.provider.timeout_seconds = n,
                _ => eprintln!(
                    "Warning: Invalid MENTOR_TIMEOUT_SECONDS value '{}'. \
                    Expected a positive integer. Using default '{}'.",
                    val, self.provider.timeout_seconds
                ),
            }
        }

        // MENTOR_BAN_THRESHOLD
        if let Ok(val) = env::var("MENTOR_BAN_THRESHOLD") {
            match val.parse::<u32>() {
                Ok(n) if ModerationConfig::is_valid_threshold(n) => {
                    self.moderation.ban_threshold = n
                }
                _ => eprintln!(
                    "Warning: Invalid MENTOR_BAN_THRESHOLD value '{}'. \
                    Must be >= 1. Using default '{}'.",
                    val, self.moderation.ban_threshold
                ),
            }
        }

        // MENTOR_ONBOARDING_TURNS
        if let Ok(val) = env::var("MENTOR_ONBOARDING_TURNS") {
            match val.parse::<u32>() {
                Ok(n) if n >= 1 => self.onboarding.required_turns = n,
                _ => eprintln!(
                    "Warning: Invalid MENTOR_ONBOARDING_TURNS value '{}'. \
                    Expected a positive integer. Using default '{}'.",
                    val, self.onboarding.required_turns
                ),
            }
        }
    }

    /// Merge another config into this one.
    ///
    /// Field-by-field: every non-default value in `other` wins. A layer
    /// cannot set a value back to its default over a lower layer.
    fn merge(mut self, other: Config) -> Self {
        let default_provider = ProviderConfig::default();
        if other.provider.kind != default_provider.kind {
            self.provider.kind = other.provider.kind;
        }
        if other.provider.model != default_provider.model {
            self.provider.model = other.provider.model;
        }
        if other.provider.base_url != default_provider.base_url {
            self.provider.base_url = other.provider.base_url;
        }
        if other.provider.api_key_env != default_provider.api_key_env {
            self.provider.api_key_env = other.provider.api_key_env;
        }
        if other.provider.timeout_seconds != default_provider.timeout_seconds {
            self.provider.timeout_seconds = other.provider.timeout_seconds;
        }

        if other.moderation.ban_threshold != ModerationConfig::default().ban_threshold
            && ModerationConfig::is_valid_threshold(other.moderation.ban_threshold)
        {
            self.moderation.ban_threshold = other.moderation.ban_threshold;
        }

        let default_onboarding = OnboardingConfig::default();
        if other.onboarding.required_turns != default_onboarding.required_turns {
            self.onboarding.required_turns = other.onboarding.required_turns;
        }
        if other.onboarding.goals_summary_chars != default_onboarding.goals_summary_chars {
            self.onboarding.goals_summary_chars = other.onboarding.goals_summary_chars;
        }

        let default_practice = PracticeConfig::default();
        if PracticeConfig::is_valid_range(
            other.practice.min_repetitions,
            other.practice.max_repetitions,
        ) && (other.practice.min_repetitions != default_practice.min_repetitions
            || other.practice.max_repetitions != default_practice.max_repetitions)
        {
            self.practice.min_repetitions = other.practice.min_repetitions;
            self.practice.max_repetitions = other.practice.max_repetitions;
        }
        if other.practice.feedback_streak != default_practice.feedback_streak {
            self.practice.feedback_streak = other.practice.feedback_streak;
        }
        if other.practice.default_theme != default_practice.default_theme {
            self.practice.default_theme = other.practice.default_theme;
        }

        let default_progress = ProgressConfig::default();
        if other.progress.xp_per_tutor_turn != default_progress.xp_per_tutor_turn {
            self.progress.xp_per_tutor_turn = other.progress.xp_per_tutor_turn;
        }
        if other.progress.xp_per_correct_answer != default_progress.xp_per_correct_answer {
            self.progress.xp_per_correct_answer = other.progress.xp_per_correct_answer;
        }

        if other.storage.id_space != StorageConfig::default().id_space
            && other.storage.id_space >= 1
        {
            self.storage.id_space = other.storage.id_space;
        }

        self
    }
}

/// Get the Mentor home directory.
///
/// Checks `MENTOR_HOME` first, then falls back to `~/.mentor`.
/// An empty `MENTOR_HOME` is ignored.
pub fn mentor_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("MENTOR_HOME") {
        if home.is_empty() {
            tracing::warn!("MENTOR_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("MENTOR_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".mentor"));
    }

    let fallback_path = fallback_mentor_home();
    tracing::warn!(
        "HOME not set, using fallback location: {}",
        fallback_path.display()
    );
    Some(fallback_path)
}

/// Get fallback home path when HOME is unavailable.
#[cfg(unix)]
fn fallback_mentor_home() -> PathBuf {
    use std::os::unix::fs::MetadataExt;
    let uid = std::fs::metadata("/").map(|m| m.uid()).unwrap_or(0);
    PathBuf::from(format!("/tmp/mentor-{}", uid))
}

/// Get fallback home path when HOME is unavailable.
#[cfg(not(unix))]
fn fallback_mentor_home() -> PathBuf {
    std::env::temp_dir().join("mentor")
}

/// Get the record store directory.
///
/// Returns `<mentor_home>/store/`.
pub fn store_dir() -> Option<PathBuf> {
    mentor_home().map(|h| h.join("store"))
}
