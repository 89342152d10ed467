use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

pub mod config;
pub mod fallback;
pub mod generator;
pub mod openai;
pub mod prompts;
pub mod rate_limiter;
pub mod retry;
pub mod validator;

pub use config::GenerationConfig;
pub use fallback::{FallbackProvider, TemplateFallback};
pub use generator::MessageTemplateGenerator;
pub use rate_limiter::RateLimiter;
pub use retry::{RetryPolicy, RetryingTransport};
pub use validator::ResponseValidator;

#[cfg(test)]
mod tests;

/// Placeholder used when the caller names none
pub const DEFAULT_PLACEHOLDER: &str = "name";

static PLACEHOLDER_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid placeholder regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Informal,
    Formal,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tone::Informal => write!(f, "informal"),
            Tone::Formal => write!(f, "formal"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl fmt::Display for MessageLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageLength::Short => write!(f, "short"),
            MessageLength::Medium => write!(f, "medium"),
            MessageLength::Long => write!(f, "long"),
        }
    }
}

/// Per-call input supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub prompt: String,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub length: MessageLength,
    /// Accepts either a list or a comma-separated string
    #[serde(default, deserialize_with = "deserialize_placeholders")]
    pub placeholders: Vec<String>,
    #[serde(default)]
    pub audience: Option<String>,
}

impl GenerationParams {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    pub fn with_length(mut self, length: MessageLength) -> Self {
        self.length = length;
        self
    }

    pub fn with_placeholders<I, S>(mut self, placeholders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.placeholders = placeholders.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Placeholder names with braces stripped, blanks and duplicates dropped,
    /// defaulting to `["name"]`. Names differing only in case are duplicates;
    /// the first spelling wins.
    pub fn placeholder_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for raw in &self.placeholders {
            let name = raw.trim().trim_matches(|c: char| c == '{' || c == '}' || c.is_whitespace());
            if name.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                continue;
            }
            names.push(name.to_string());
        }

        if names.is_empty() {
            names.push(DEFAULT_PLACEHOLDER.to_string());
        }
        names
    }

    /// Audience with surrounding whitespace removed, `None` when blank
    pub fn audience(&self) -> Option<&str> {
        self.audience
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.prompt.trim().is_empty() {
            return Err(GenerationError::ValidationError(
                "Prompt is required".to_string(),
            ));
        }

        for name in self.placeholder_names() {
            if !PLACEHOLDER_NAME_REGEX.is_match(&name) {
                return Err(GenerationError::ValidationError(format!(
                    "Invalid placeholder name: {}",
                    name
                )));
            }
        }

        Ok(())
    }
}

fn deserialize_placeholders<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Csv(String),
        List(Vec<String>),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Csv(s)) => s.split(',').map(|p| p.trim().to_string()).collect(),
        Some(Raw::List(list)) => list,
        None => Vec::new(),
    })
}

/// Render a placeholder name as its `{token}` form
pub fn token(name: &str) -> String {
    format!("{{{}}}", name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    Ai,
    Fallback,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub tone: Tone,
    pub length: MessageLength,
    /// Placeholders in `{token}` form
    pub placeholders: Vec<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    pub message: String,
    pub source: MessageSource,
    pub error: Option<String>,
    pub prompt: String,
    pub length: MessageLength,
    pub placeholders: Vec<String>,
    pub audience: Option<String>,
    pub metadata: GenerationMetadata,
}

impl GenerationResult {
    pub(crate) fn completed(params: &GenerationParams, message: String, source: MessageSource) -> Self {
        Self::build(params, true, message, source, None)
    }

    pub(crate) fn failed(params: &GenerationParams, error: &GenerationError) -> Self {
        Self::build(params, false, String::new(), MessageSource::Error, Some(error.to_string()))
    }

    fn build(
        params: &GenerationParams,
        success: bool,
        message: String,
        source: MessageSource,
        error: Option<String>,
    ) -> Self {
        let names = params.placeholder_names();
        let audience = params.audience().map(str::to_string);

        Self {
            success,
            message,
            source,
            error,
            prompt: params.prompt.trim().to_string(),
            length: params.length,
            metadata: GenerationMetadata {
                tone: params.tone,
                length: params.length,
                placeholders: names.iter().map(|n| token(n)).collect(),
                audience: audience.clone(),
            },
            placeholders: names,
            audience,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub model: String,
    pub ai_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpstreamErrorKind {
    Timeout,
    RateLimited,
    AuthFailed,
    ServerError,
    NetworkError,
}

impl fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UpstreamErrorKind::Timeout => "Timeout",
            UpstreamErrorKind::RateLimited => "Rate limited",
            UpstreamErrorKind::AuthFailed => "Authentication failed",
            UpstreamErrorKind::ServerError => "Server error",
            UpstreamErrorKind::NetworkError => "Network error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct UpstreamError {
    pub kind: UpstreamErrorKind,
    pub message: String,
    /// Server-provided `Retry-After`, if any
    pub retry_after: Option<Duration>,
}

impl UpstreamError {
    pub fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            UpstreamErrorKind::Timeout,
            format!("no response within {:.1}s", after.as_secs_f64()),
        )
    }

    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self {
            kind: UpstreamErrorKind::RateLimited,
            message: "upstream returned 429".to_string(),
            retry_after,
        }
    }

    /// A completion with no usable text, treated like a 5xx
    pub fn empty_completion() -> Self {
        Self::new(UpstreamErrorKind::ServerError, "Empty response from API")
    }

    /// Only a rejected key is final; everything else may succeed on another attempt.
    pub fn is_retryable(&self) -> bool {
        self.kind != UpstreamErrorKind::AuthFailed
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Upstream failed after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: UpstreamError },

    #[error("AI generation unavailable: {0}")]
    AiUnavailable(String),
}

impl GenerationError {
    /// Failures that a fallback template may stand in for
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            GenerationError::ExhaustedRetries { .. } | GenerationError::AiUnavailable(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Body of a `/chat/completions` request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawCompletion {
    pub text: String,
    pub model: Option<String>,
    pub total_tokens: Option<u32>,
}

impl RawCompletion {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
            total_tokens: None,
        }
    }
}

/// One upstream attempt. Retries, timeouts and spacing are layered on top by
/// [`RetryingTransport`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<RawCompletion, UpstreamError>;
}
