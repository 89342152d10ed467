use serde::Serialize;
use std::collections::HashMap;

/// Structured logging utilities for the generator
///
/// Every generation logs its start and outcome as an `Operation` event and every
/// upstream exchange as a `Network` event, so one grep over the log shows the
/// full path a message took (AI, fallback or error) and how long each hop was.
///
/// Message bodies are only ever logged through [`preview`].

/// Structured log event types
#[derive(Debug, Clone, Serialize)]
pub enum LogEvent {
    Operation {
        name: String,
        phase: OperationPhase,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<LogContext>,
    },
    Network {
        operation: String,
        status: NetworkStatus,
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<NetworkDetails>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub enum OperationPhase {
    Start,
    Complete { duration_ms: u64 },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct LogContext {
    #[serde(flatten)]
    pub fields: HashMap<String, String>,
}

impl LogContext {
    pub fn from_pairs<const N: usize>(pairs: [(&str, String); N]) -> Self {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum NetworkStatus {
    Success,
    RateLimited { retry_after: Option<u64> },
    Timeout { duration_ms: u64 },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkDetails {
    pub endpoint: String,
    pub method: String,
    pub status_code: Option<u16>,
}

pub fn log_event(event: LogEvent) {
    match event {
        LogEvent::Operation { name, phase, context } => {
            let ctx_str = context
                .map(|c| {
                    let mut fields: Vec<_> = c.fields.into_iter().collect();
                    fields.sort();
                    format!(" | {:?}", fields)
                })
                .unwrap_or_default();
            match phase {
                OperationPhase::Start => {
                    log::info!("🚀 {} STARTING{}", name, ctx_str);
                }
                OperationPhase::Complete { duration_ms } => {
                    log::info!("✅ {} COMPLETE in {}ms{}", name, duration_ms, ctx_str);
                }
                OperationPhase::Failed { error } => {
                    log::error!("❌ {} FAILED: {}{}", name, error, ctx_str);
                }
            }
        }
        LogEvent::Network { operation, status, duration_ms, details } => {
            let detail_str = details
                .map(|d| match d.status_code {
                    Some(code) => format!(" | {} {} -> {}", d.method, d.endpoint, code),
                    None => format!(" | {} {}", d.method, d.endpoint),
                })
                .unwrap_or_default();
            match status {
                NetworkStatus::Success => {
                    log::info!("🌐 {} SUCCESS in {}ms{}", operation, duration_ms, detail_str);
                }
                NetworkStatus::RateLimited { retry_after } => {
                    let retry_str = retry_after.map(|r| format!(" (retry after {}s)", r)).unwrap_or_default();
                    log::warn!("⚠️ {} RATE LIMITED{}{}", operation, retry_str, detail_str);
                }
                NetworkStatus::Timeout { duration_ms: timeout } => {
                    log::error!("⏱️ {} TIMEOUT after {}ms{}", operation, timeout, detail_str);
                }
                NetworkStatus::Failed { error } => {
                    log::error!("❌ {} FAILED: {}{}", operation, error, detail_str);
                }
            }
        }
    }
}

/// Maximum characters of message text written to the log
pub const PREVIEW_CHARS: usize = 300;

/// Char-boundary safe preview of generated text
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
