//! HTTP tests for the OpenAI-compatible transport
//!
//! A local wiremock server stands in for the chat completions endpoint so
//! request shape and status classification can be checked end to end.

use crate::ai::openai::OpenAICompatibleTransport;
use crate::ai::{
    ChatMessage, CompletionRequest, CompletionTransport, GenerationConfig, GenerationParams,
    MessageSource, MessageTemplateGenerator, UpstreamErrorKind,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> GenerationConfig {
    let mut config = GenerationConfig::default().with_api_key("test_key_12345");
    // Trailing slash must not produce a double slash in the endpoint
    config.base_url = format!("{}/", server.uri());
    config.timeout_seconds = 5.0;
    config
}

fn request() -> CompletionRequest {
    CompletionRequest {
        model: "deepseek/deepseek-r1-0528:free".to_string(),
        messages: vec![
            ChatMessage::system("You write broadcast messages."),
            ChatMessage::user("Tone: informal"),
        ],
        max_tokens: 660,
        temperature: 0.6,
    }
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "gen-1",
        "model": "deepseek/deepseek-r1-0528:free",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 80, "completion_tokens": 25, "total_tokens": 105}
    })
}

#[tokio::test]
async fn test_successful_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test_key_12345"))
        .and(body_partial_json(json!({
            "model": "deepseek/deepseek-r1-0528:free",
            "max_tokens": 660,
            "messages": [
                {"role": "system", "content": "You write broadcast messages."},
                {"role": "user", "content": "Tone: informal"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("  Hello {name}!  ")))
        .expect(1)
        .mount(&server)
        .await;

    let transport = OpenAICompatibleTransport::new(&config_for(&server)).unwrap();
    assert_eq!(transport.endpoint(), format!("{}/chat/completions", server.uri()));

    let completion = transport.complete(&request()).await.unwrap();
    assert_eq!(completion.text, "Hello {name}!");
    assert_eq!(completion.total_tokens, Some(105));
    assert_eq!(completion.model.as_deref(), Some("deepseek/deepseek-r1-0528:free"));
}

#[tokio::test]
async fn test_attribution_headers_sent_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("HTTP-Referer", "https://example.com"))
        .and(header("X-Title", "Campaigns"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Hi {name}")))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.site_url = Some("https://example.com".to_string());
    config.site_name = Some("Campaigns".to_string());

    let transport = OpenAICompatibleTransport::new(&config).unwrap();
    assert!(transport.complete(&request()).await.is_ok());
}

#[tokio::test]
async fn test_unauthorized_is_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let transport = OpenAICompatibleTransport::new(&config_for(&server)).unwrap();
    let err = transport.complete(&request()).await.unwrap_err();

    assert_eq!(err.kind, UpstreamErrorKind::AuthFailed);
    assert!(!err.is_retryable());
    assert!(err.message.contains("invalid api key"));
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let transport = OpenAICompatibleTransport::new(&config_for(&server)).unwrap();
    let err = transport.complete(&request()).await.unwrap_err();

    assert_eq!(err.kind, UpstreamErrorKind::RateLimited);
    assert_eq!(err.retry_after, Some(Duration::from_secs(7)));
}

#[tokio::test]
async fn test_server_errors_are_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let transport = OpenAICompatibleTransport::new(&config_for(&server)).unwrap();
    let err = transport.complete(&request()).await.unwrap_err();

    assert_eq!(err.kind, UpstreamErrorKind::ServerError);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_gateway_timeout_is_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(504))
        .mount(&server)
        .await;

    let transport = OpenAICompatibleTransport::new(&config_for(&server)).unwrap();
    let err = transport.complete(&request()).await.unwrap_err();
    assert_eq!(err.kind, UpstreamErrorKind::Timeout);
}

#[tokio::test]
async fn test_malformed_body_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let transport = OpenAICompatibleTransport::new(&config_for(&server)).unwrap();
    let err = transport.complete(&request()).await.unwrap_err();

    assert_eq!(err.kind, UpstreamErrorKind::ServerError);
    assert!(err.message.starts_with("Invalid response"));
}

#[tokio::test]
async fn test_empty_content_passed_through_as_blank() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "   "}}]
        })))
        .mount(&server)
        .await;

    let transport = OpenAICompatibleTransport::new(&config_for(&server)).unwrap();
    let completion = transport.complete(&request()).await.unwrap();

    // Classified as a server error by the retry layer
    assert_eq!(completion.text, "");
}

#[tokio::test]
async fn test_usage_overflow_saturates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Hi {name}"}}],
            "usage": {"prompt_tokens": 4294967295u32, "completion_tokens": 10}
        })))
        .mount(&server)
        .await;

    let transport = OpenAICompatibleTransport::new(&config_for(&server)).unwrap();
    let completion = transport.complete(&request()).await.unwrap();
    assert_eq!(completion.total_tokens, Some(u32::MAX));
}

#[tokio::test]
async fn test_huge_retry_after_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1e30"))
        .mount(&server)
        .await;

    let transport = OpenAICompatibleTransport::new(&config_for(&server)).unwrap();
    let err = transport.complete(&request()).await.unwrap_err();

    assert_eq!(err.kind, UpstreamErrorKind::RateLimited);
    assert_eq!(err.retry_after, None);
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let mut config = GenerationConfig::default().with_api_key("test_key_12345");
    config.base_url = "http://127.0.0.1:1".to_string();
    config.timeout_seconds = 5.0;

    let transport = OpenAICompatibleTransport::new(&config).unwrap();
    let err = transport.complete(&request()).await.unwrap_err();
    assert_eq!(err.kind, UpstreamErrorKind::NetworkError);
}

#[tokio::test]
async fn test_generator_over_http_recovers_from_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("<think>keep it short</think>\"Hi {name}, the sale is live!\"")),
        )
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.min_interval_seconds = 0.0;
    config.retry_base_delay_ms = 10;
    let http = OpenAICompatibleTransport::new(&config).unwrap();
    let generator = MessageTemplateGenerator::new(config)
        .unwrap()
        .with_transport(Arc::new(http));

    let result = generator.generate(GenerationParams::new("Sale announcement")).await;

    assert_eq!(result.source, MessageSource::Ai);
    assert_eq!(result.message, "Hi {name}, the sale is live!");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_generator_over_http_follows_up_reasoning_only_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("<think>The user wants a birthday note for {name}...")),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Happy birthday, {name}!")))
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.min_interval_seconds = 0.0;
    let http = OpenAICompatibleTransport::new(&config).unwrap();
    let generator = MessageTemplateGenerator::new(config)
        .unwrap()
        .with_transport(Arc::new(http));

    let result = generator.generate(GenerationParams::new("Birthday wishes")).await;
    assert_eq!(result.source, MessageSource::Ai);
    assert_eq!(result.message, "Happy birthday, {name}!");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
    let follow_up: serde_json::Value = serde_json::from_slice(&received[1].body).unwrap();
    assert_eq!(follow_up["messages"].as_array().unwrap().len(), 1);
    assert_eq!(follow_up["messages"][0]["role"], "user");
    assert_eq!(follow_up["max_tokens"], 200);
}
