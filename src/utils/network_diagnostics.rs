use crate::ai::{UpstreamError, UpstreamErrorKind};
use crate::utils::logger::{log_event, LogEvent, NetworkDetails, NetworkStatus};
use std::time::Duration;

impl From<&UpstreamError> for NetworkStatus {
    fn from(error: &UpstreamError) -> Self {
        match error.kind {
            UpstreamErrorKind::Timeout => NetworkStatus::Timeout { duration_ms: 0 },
            UpstreamErrorKind::RateLimited => NetworkStatus::RateLimited {
                retry_after: error.retry_after.map(|d| d.as_secs()),
            },
            _ => NetworkStatus::Failed {
                error: error.to_string(),
            },
        }
    }
}

/// Log an outbound completion request (stateless, never logs credentials)
pub fn log_api_request(provider: &str, model: &str, max_tokens: u32) {
    log::info!("🌐 API_REQUEST_START:");
    log::info!("  • Provider: {}", provider);
    log::info!("  • Model: {}", model);
    log::info!("  • Max Tokens: {}", max_tokens);
}

/// Log API response with details using structured logging
pub fn log_api_response(
    provider: &str,
    method: &str,
    endpoint: &str,
    status_code: u16,
    duration_ms: u64,
    tokens_used: Option<u32>,
) {
    let status = if (200..300).contains(&status_code) {
        NetworkStatus::Success
    } else {
        NetworkStatus::Failed { error: format!("HTTP {}", status_code) }
    };

    log_event(LogEvent::Network {
        operation: format!("API_{}", provider.to_uppercase()),
        status,
        duration_ms,
        details: Some(NetworkDetails {
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            status_code: Some(status_code),
        }),
    });

    if let Some(tokens) = tokens_used {
        log::info!("  • Tokens Used: {}", tokens);
    }

    if duration_ms > 5000 {
        log::warn!("⚠️ SLOW_API_RESPONSE: {}ms from {}", duration_ms, provider);
    }
}

/// Log an upstream failure with categorization and optional timing
pub fn log_upstream_error(error: &UpstreamError, duration_ms: Option<u64>) {
    let operation = match error.kind {
        UpstreamErrorKind::Timeout => "NETWORK_TIMEOUT",
        UpstreamErrorKind::RateLimited => "RATE_LIMITED",
        UpstreamErrorKind::AuthFailed => "AUTH_FAILED",
        UpstreamErrorKind::ServerError => "SERVER_ERROR",
        UpstreamErrorKind::NetworkError => "NETWORK_ERROR",
    };

    let mut status = NetworkStatus::from(error);
    if let NetworkStatus::Timeout { duration_ms: ref mut d } = status {
        *d = duration_ms.unwrap_or_default();
    }

    log_event(LogEvent::Network {
        operation: operation.to_string(),
        status,
        duration_ms: duration_ms.unwrap_or_default(),
        details: None,
    });

    match error.kind {
        UpstreamErrorKind::Timeout => {
            log::error!("  • Suggestion: Check internet connection or increase timeout");
        }
        UpstreamErrorKind::RateLimited => {
            log::error!("  • Suggestion: Reduce request frequency or raise the minimum interval");
        }
        UpstreamErrorKind::AuthFailed => {
            log::error!("  • Suggestion: Check the configured API key");
        }
        UpstreamErrorKind::ServerError | UpstreamErrorKind::NetworkError => {}
    }
}

/// Log a retry about to happen
pub fn log_retry_attempt(operation: &str, attempt: u32, max_attempts: u32, delay: Duration) {
    log::info!(
        "🔄 RETRY_ATTEMPT: {} (attempt {}/{}) in {}ms",
        operation,
        attempt,
        max_attempts,
        delay.as_millis()
    );
}
