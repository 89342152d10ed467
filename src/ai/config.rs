//! Configuration constants for the generation core

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::GenerationError;

/// Default OpenAI-compatible endpoint (OpenRouter aggregator)
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1-0528:free";

/// Upper bound for the per-request token budget
pub const DEFAULT_MAX_TOKENS: u32 = 2500;

/// Default temperature for AI models (0.0 = deterministic, 2.0 = max randomness)
pub const DEFAULT_TEMPERATURE: f32 = 0.6;

/// Minimum spacing between upstream calls in seconds
pub const DEFAULT_MIN_INTERVAL_SECS: f64 = 1.5;

/// Default per-attempt timeout for API requests in seconds
pub const DEFAULT_TIMEOUT_SECS: f64 = 45.0;

/// Maximum number of retries after the first attempt
pub const MAX_RETRIES: u32 = 4;

/// Base delay in milliseconds for exponential backoff
pub const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Ceiling for a single backoff delay in seconds
pub const MAX_BACKOFF_SECS: f64 = 30.0;

/// Token budgets per message length, before capping by `max_tokens`
pub const SHORT_TOKEN_BUDGET: u32 = 120;
pub const MEDIUM_TOKEN_BUDGET: u32 = 660;
pub const LONG_TOKEN_BUDGET: u32 = 1380;

/// Retries ease the request down to these floors
pub const MIN_RETRY_MAX_TOKENS: u32 = 40;
pub const MIN_RETRY_TEMPERATURE: f32 = 0.3;

/// Token budget bounds for the single-message request sent after a blank completion
pub const SIMPLIFIED_MIN_MAX_TOKENS: u32 = 80;
pub const SIMPLIFIED_MAX_MAX_TOKENS: u32 = 200;

/// Upper bound for every seconds-valued setting (one day)
pub const MAX_SETTING_SECS: f64 = 86_400.0;

/// Clause appended for required placeholders the model left out.
/// `{placeholders}` is replaced by the rendered list of missing tokens.
pub const DEFAULT_REPAIR_CLAUSE: &str = "Just for you, {placeholders}.";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a concise message generator for business broadcast messages. \
Generate ONE friendly message suitable for a WhatsApp broadcast. \
Keep every placeholder in curly braces exactly as given and never fill it in. \
Avoid links and questions.";

/// Process-wide generation settings. Built once, read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    #[serde(skip_serializing)] // Don't serialize API key
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: String,
    pub min_interval_seconds: f64,
    pub timeout_seconds: f64,
    pub enable_fallback_templates: bool,
    pub max_retries: u32,
    /// Explicit switch to keep the AI path off even when a key is present
    pub ai_enabled: bool,
    /// Attribution headers for the upstream aggregator
    pub site_url: Option<String>,
    pub site_name: Option<String>,
    pub retry_base_delay_ms: u64,
    pub max_backoff_seconds: f64,
    pub placeholder_repair_clause: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            min_interval_seconds: DEFAULT_MIN_INTERVAL_SECS,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            enable_fallback_templates: true,
            max_retries: MAX_RETRIES,
            ai_enabled: true,
            site_url: None,
            site_name: None,
            retry_base_delay_ms: RETRY_BASE_DELAY_MS,
            max_backoff_seconds: MAX_BACKOFF_SECS,
            placeholder_repair_clause: DEFAULT_REPAIR_CLAUSE.to_string(),
        }
    }
}

impl GenerationConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// True when the AI path may be attempted at all
    pub fn ai_available(&self) -> bool {
        self.ai_enabled
            && self
                .api_key
                .as_deref()
                .map(|key| !key.trim().is_empty())
                .unwrap_or(false)
    }

    pub fn min_interval(&self) -> Duration {
        seconds(self.min_interval_seconds)
    }

    pub fn attempt_timeout(&self) -> Duration {
        seconds(self.timeout_seconds)
    }

    pub fn max_backoff(&self) -> Duration {
        seconds(self.max_backoff_seconds)
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.max_tokens == 0 {
            return Err(GenerationError::ConfigError(
                "max_tokens must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(GenerationError::ConfigError(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }

        if !self.min_interval_seconds.is_finite() || self.min_interval_seconds < 0.0 {
            return Err(GenerationError::ConfigError(
                "min_interval_seconds must be a non-negative number".to_string(),
            ));
        }

        if !self.timeout_seconds.is_finite() || self.timeout_seconds <= 0.0 {
            return Err(GenerationError::ConfigError(
                "timeout_seconds must be greater than zero".to_string(),
            ));
        }

        if !self.max_backoff_seconds.is_finite() || self.max_backoff_seconds < 0.0 {
            return Err(GenerationError::ConfigError(
                "max_backoff_seconds must be a non-negative number".to_string(),
            ));
        }

        if self.base_url.trim().is_empty() {
            return Err(GenerationError::ConfigError("base_url cannot be empty".to_string()));
        }

        if self.model.trim().is_empty() {
            return Err(GenerationError::ConfigError("model cannot be empty".to_string()));
        }

        if !self.placeholder_repair_clause.contains("{placeholders}") {
            return Err(GenerationError::ConfigError(
                "placeholder_repair_clause must contain {placeholders}".to_string(),
            ));
        }

        for (field, value) in [
            ("min_interval_seconds", self.min_interval_seconds),
            ("timeout_seconds", self.timeout_seconds),
            ("max_backoff_seconds", self.max_backoff_seconds),
        ] {
            if value.is_nan() || value > MAX_SETTING_SECS {
                return Err(GenerationError::ConfigError(format!(
                    "{} must be at most {} seconds, got {}",
                    field, MAX_SETTING_SECS, value
                )));
            }
        }

        if !self.ai_available() && !self.enable_fallback_templates {
            return Err(GenerationError::ConfigError(
                "API key is required when fallback templates are disabled".to_string(),
            ));
        }

        Ok(())
    }
}

/// Non-panicking seconds conversion: negatives and NaN clamp to zero, overflow saturates
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}
