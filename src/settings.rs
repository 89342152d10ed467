//! Builds a [`GenerationConfig`] from the process environment and `.env`.
//!
//! This is the config-loading side of the binary; the `ai` core only ever
//! receives a finished `GenerationConfig`.

use crate::ai::{GenerationConfig, GenerationError};
use std::env;
use std::str::FromStr;

/// Checked in order, first non-blank wins
const API_KEY_VARS: &[&str] = &["OPENROUTER_API_KEY", "DEEPSEEK_API_KEY", "OPENAI_API_KEY"];

fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(name: &str) -> Result<Option<T>, GenerationError> {
    match var(name) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            GenerationError::ConfigError(format!("{} has an invalid value: {}", name, raw))
        }),
    }
}

fn flag(name: &str) -> Result<Option<bool>, GenerationError> {
    match var(name).map(|v| v.to_lowercase()) {
        None => Ok(None),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(Some(true)),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(Some(false)),
        Some(v) => Err(GenerationError::ConfigError(format!(
            "{} has an invalid value: {}",
            name, v
        ))),
    }
}

/// Read settings from the environment, loading `.env` first if present.
/// Unset variables keep the defaults of [`GenerationConfig`].
pub fn config_from_env() -> Result<GenerationConfig, GenerationError> {
    if let Ok(path) = dotenv::dotenv() {
        log::debug!("Loaded environment from {}", path.display());
    }
    load_config()
}

fn load_config() -> Result<GenerationConfig, GenerationError> {
    let mut config = GenerationConfig::default();

    config.api_key = API_KEY_VARS.iter().find_map(|name| var(name));

    if let Some(url) = var("OPENROUTER_URL") {
        config.base_url = url;
    }
    if let Some(model) = var("OPENROUTER_MODEL") {
        config.model = model;
    }
    if let Some(max_tokens) = parsed("OPENROUTER_MAX_TOKENS")? {
        config.max_tokens = max_tokens;
    }
    if let Some(temperature) = parsed("OPENROUTER_TEMPERATURE")? {
        config.temperature = temperature;
    }
    if let Some(interval) = parsed("OPENROUTER_MIN_INTERVAL")? {
        config.min_interval_seconds = interval;
    }
    if let Some(timeout) = parsed("OPENROUTER_TIMEOUT")? {
        config.timeout_seconds = timeout;
    }
    if let Some(retries) = parsed("OPENROUTER_MAX_RETRIES")? {
        config.max_retries = retries;
    }
    if let Some(enabled) = flag("ENABLE_FALLBACK_TEMPLATES")? {
        config.enable_fallback_templates = enabled;
    }
    if let Some(enabled) = flag("AI_ENABLED")? {
        config.ai_enabled = enabled;
    }
    config.site_url = var("OPENROUTER_SITE_URL");
    config.site_name = var("OPENROUTER_SITE_NAME");

    Ok(config)
}
