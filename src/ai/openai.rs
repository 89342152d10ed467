use super::{
    CompletionRequest, CompletionTransport, GenerationConfig, GenerationError, RawCompletion,
    UpstreamError, UpstreamErrorKind,
};
use crate::utils::network_diagnostics::{log_api_request, log_api_response};
use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, Response, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Single-attempt client for an OpenAI-compatible `/chat/completions` endpoint
/// (OpenRouter, DeepSeek, OpenAI). Owns one pooled `reqwest::Client`.
pub struct OpenAICompatibleTransport {
    api_key: String,
    endpoint: String,
    client: Client,
    site_url: Option<String>,
    site_name: Option<String>,
}

impl OpenAICompatibleTransport {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| GenerationError::ConfigError("API key is not configured".to_string()))?
            .to_string();

        // Expect versioned base (e.g., https://openrouter.ai/api/v1) and append only /chat/completions
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        let client = Client::builder()
            .timeout(config.attempt_timeout())
            .build()
            .map_err(|e| GenerationError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            endpoint,
            client,
            site_url: config.site_url.clone(),
            site_name: config.site_name.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn classify_failure(response: Response) -> UpstreamError {
        let status = response.status();
        let retry_after = parse_retry_after(&response);
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpstreamError::new(
                UpstreamErrorKind::AuthFailed,
                format!("API returned {}: {}", status, body),
            ),
            StatusCode::TOO_MANY_REQUESTS => UpstreamError::rate_limited(retry_after),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => UpstreamError::new(
                UpstreamErrorKind::Timeout,
                format!("API returned {}", status),
            ),
            _ => UpstreamError::new(
                UpstreamErrorKind::ServerError,
                format!("API returned {}: {}", status, body),
            ),
        }
    }
}

fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

fn classify_send_error(e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::new(UpstreamErrorKind::Timeout, e.to_string())
    } else {
        UpstreamError::new(UpstreamErrorKind::NetworkError, e.to_string())
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u32>,
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
}

impl Usage {
    fn total(&self) -> Option<u32> {
        self.total_tokens.or(match (self.prompt_tokens, self.completion_tokens) {
            (None, None) => None,
            (p, c) => Some(p.unwrap_or(0).saturating_add(c.unwrap_or(0))),
        })
    }
}

#[async_trait]
impl CompletionTransport for OpenAICompatibleTransport {
    async fn complete(&self, request: &CompletionRequest) -> Result<RawCompletion, UpstreamError> {
        if log::log_enabled!(log::Level::Info) {
            log_api_request("openrouter", &request.model, request.max_tokens);
        }

        let mut req = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request);

        if let Some(site_url) = &self.site_url {
            req = req.header("HTTP-Referer", site_url);
        }
        if let Some(site_name) = &self.site_name {
            req = req.header("X-Title", site_name);
        }

        let request_start = Instant::now();
        let response = req.send().await.map_err(classify_send_error)?;
        let status = response.status();
        let duration_ms = request_start.elapsed().as_millis() as u64;

        if !status.is_success() {
            log_api_response("openrouter", "POST", &self.endpoint, status.as_u16(), duration_ms, None);
            return Err(Self::classify_failure(response).await);
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::new(UpstreamErrorKind::Timeout, e.to_string())
            } else {
                UpstreamError::new(
                    UpstreamErrorKind::ServerError,
                    format!("Invalid response: {}", e),
                )
            }
        })?;

        let total_tokens = body.usage.as_ref().and_then(Usage::total);
        log_api_response("openrouter", "POST", &self.endpoint, status.as_u16(), duration_ms, total_tokens);

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        // Blank or reasoning-only text is handled by the retry layer
        Ok(RawCompletion {
            text,
            model: body.model,
            total_tokens,
        })
    }
}
