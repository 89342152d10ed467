#[cfg(test)]
mod tests {
    use super::super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_generation_error_display() {
        let err = GenerationError::ValidationError("Prompt is required".to_string());
        assert_eq!(err.to_string(), "Validation error: Prompt is required");

        let err = GenerationError::Upstream(UpstreamError::new(UpstreamErrorKind::AuthFailed, "401"));
        assert_eq!(err.to_string(), "Upstream error: Authentication failed: 401");

        let err = GenerationError::ExhaustedRetries {
            attempts: 5,
            last: UpstreamError::timeout(std::time::Duration::from_secs(45)),
        };
        assert_eq!(
            err.to_string(),
            "Upstream failed after 5 attempts: Timeout: no response within 45.0s"
        );
    }

    #[test]
    fn test_only_auth_failures_are_final() {
        for kind in [
            UpstreamErrorKind::Timeout,
            UpstreamErrorKind::RateLimited,
            UpstreamErrorKind::ServerError,
            UpstreamErrorKind::NetworkError,
        ] {
            assert!(UpstreamError::new(kind, "x").is_retryable(), "{:?}", kind);
        }
        assert!(!UpstreamError::new(UpstreamErrorKind::AuthFailed, "x").is_retryable());
    }

    #[test]
    fn test_fallback_eligibility() {
        assert!(GenerationError::AiUnavailable("no key".to_string()).allows_fallback());
        assert!(GenerationError::ExhaustedRetries {
            attempts: 1,
            last: UpstreamError::new(UpstreamErrorKind::ServerError, "500"),
        }
        .allows_fallback());
        assert!(!GenerationError::ValidationError("x".to_string()).allows_fallback());
        assert!(!GenerationError::Upstream(UpstreamError::new(UpstreamErrorKind::AuthFailed, "x"))
            .allows_fallback());
    }

    #[test]
    fn test_params_validation() {
        // Empty prompt
        assert!(GenerationParams::new("").validate().is_err());

        // Whitespace only
        assert!(GenerationParams::new("   \n\t  ").validate().is_err());

        // Valid prompt
        assert!(GenerationParams::new("Diwali greetings").validate().is_ok());

        // Placeholder names must be identifiers
        let params = GenerationParams::new("Promo").with_placeholders(["first name"]);
        assert!(params.validate().is_err());

        let params = GenerationParams::new("Promo").with_placeholders(["{discount_pct}", "code2"]);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_placeholder_normalization() {
        let params = GenerationParams::new("x");
        assert_eq!(params.placeholder_names(), vec!["name"]);

        let params = GenerationParams::new("x").with_placeholders(["{name}", " discount ", "", "name", "{ code }"]);
        assert_eq!(params.placeholder_names(), vec!["name", "discount", "code"]);

        let params = GenerationParams::new("x").with_placeholders(["", "{}"]);
        assert_eq!(params.placeholder_names(), vec!["name"]);

        // Case variants collapse to the first spelling
        let params = GenerationParams::new("x").with_placeholders(["Name", "name", "{CODE}", "code"]);
        assert_eq!(params.placeholder_names(), vec!["Name", "CODE"]);
    }

    #[test]
    fn test_params_deserialize_accepts_csv_and_list() {
        let params: GenerationParams =
            serde_json::from_str(r#"{"prompt":"Promo","placeholders":"name, discount,code"}"#).unwrap();
        assert_eq!(params.placeholder_names(), vec!["name", "discount", "code"]);
        assert_eq!(params.tone, Tone::Informal);
        assert_eq!(params.length, MessageLength::Medium);

        let params: GenerationParams = serde_json::from_str(
            r#"{"prompt":"Promo","tone":"formal","length":"short","placeholders":["name","code"],"audience":"VIP"}"#,
        )
        .unwrap();
        assert_eq!(params.placeholder_names(), vec!["name", "code"]);
        assert_eq!(params.tone, Tone::Formal);
        assert_eq!(params.length, MessageLength::Short);
        assert_eq!(params.audience(), Some("VIP"));

        let params: GenerationParams =
            serde_json::from_str(r#"{"prompt":"Hi","placeholders":null}"#).unwrap();
        assert_eq!(params.placeholder_names(), vec!["name"]);
    }

    #[test]
    fn test_config_serialization_hides_api_key() {
        let config = GenerationConfig::default().with_api_key("secret_key");

        // API key should not be serialized
        let serialized = serde_json::to_string(&config).unwrap();
        assert!(!serialized.contains("secret_key"));
        assert!(serialized.contains("deepseek/deepseek-r1-0528:free"));
    }

    #[test]
    fn test_config_deserialize_uses_defaults() {
        let config: GenerationConfig =
            serde_json::from_str(r#"{"api_key":"k","model":"m","max_retries":2}"#).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.model, "m");
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.max_tokens, config::DEFAULT_MAX_TOKENS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let base = GenerationConfig::default().with_api_key("test_key_12345");
        assert_ok!(base.validate());

        let mut config = base.clone();
        config.max_tokens = 0;
        assert_err!(config.validate());

        let mut config = base.clone();
        config.temperature = 2.5;
        assert_err!(config.validate());

        let mut config = base.clone();
        config.min_interval_seconds = -1.0;
        assert_err!(config.validate());

        let mut config = base.clone();
        config.timeout_seconds = 0.0;
        assert_err!(config.validate());

        let mut config = base.clone();
        config.placeholder_repair_clause = "Hi there.".to_string();
        assert_err!(config.validate());

        // Nothing could ever answer
        let mut config = GenerationConfig::default();
        config.enable_fallback_templates = false;
        assert!(matches!(config.validate(), Err(GenerationError::ConfigError(_))));

        // Fallback-only is fine
        assert_ok!(GenerationConfig::default().validate());
    }

    #[test]
    fn test_config_rejects_unbounded_durations() {
        let base = GenerationConfig::default().with_api_key("test_key_12345");

        let mut config = base.clone();
        config.timeout_seconds = 1e30;
        assert_err!(config.validate());

        let mut config = base.clone();
        config.min_interval_seconds = f64::NAN;
        assert_err!(config.validate());

        let mut config = base.clone();
        config.max_backoff_seconds = f64::INFINITY;
        assert_err!(config.validate());

        let mut config = base.clone();
        config.timeout_seconds = config::MAX_SETTING_SECS;
        assert_ok!(config.validate());
    }

    #[test]
    fn test_duration_accessors_never_panic() {
        let mut config = GenerationConfig::default();
        config.timeout_seconds = 1e30;
        config.min_interval_seconds = -3.0;
        config.max_backoff_seconds = f64::NAN;

        assert_eq!(config.attempt_timeout(), std::time::Duration::MAX);
        assert_eq!(config.min_interval(), std::time::Duration::ZERO);
        assert_eq!(config.max_backoff(), std::time::Duration::ZERO);
    }

    #[test]
    fn test_ai_availability() {
        assert!(!GenerationConfig::default().ai_available());
        assert!(!GenerationConfig::default().with_api_key("  ").ai_available());
        assert!(GenerationConfig::default().with_api_key("k").ai_available());

        let mut config = GenerationConfig::default().with_api_key("k");
        config.ai_enabled = false;
        assert!(!config.ai_available());
    }

    #[test]
    fn test_result_serialization_shape() {
        let params = GenerationParams::new(" Promo ")
            .with_placeholders(["name", "discount"])
            .with_audience("VIP");
        let result = GenerationResult::completed(
            &params,
            "Hi {name}, {discount} off".to_string(),
            MessageSource::Fallback,
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["source"], "fallback");
        assert_eq!(json["prompt"], "Promo");
        assert_eq!(json["length"], "medium");
        assert_eq!(json["placeholders"], serde_json::json!(["name", "discount"]));
        assert_eq!(json["metadata"]["placeholders"], serde_json::json!(["{name}", "{discount}"]));
        assert_eq!(json["metadata"]["tone"], "informal");
        assert_eq!(json["metadata"]["audience"], "VIP");
        assert!(json["error"].is_null());
    }
}
