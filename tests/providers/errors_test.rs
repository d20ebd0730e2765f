//! HTTP status translation and error body sanitization.

use std::collections::BTreeMap;

use testsmith::providers::calllog::CallLogBook;
use testsmith::providers::dispatcher::Dispatcher;
use testsmith::providers::{
    error_detail, sanitize_http_error_body, status_error, ErrorKind, ModelSettings, Provider,
    ProviderConfig, ProviderError, ProviderKind,
};

use crate::mock_server::{serve_once, MockResponse, MockServer};

const HOSTED: [ProviderKind; 6] = [
    ProviderKind::OpenAi,
    ProviderKind::Anthropic,
    ProviderKind::DeepSeek,
    ProviderKind::Groq,
    ProviderKind::OpenRouter,
    ProviderKind::Custom,
];

fn hosted_provider(kind: ProviderKind, server: &MockServer) -> Provider {
    let settings = ModelSettings {
        api_key: Some("sk-test".to_owned()),
        model: Some("test-model".to_owned()),
        ..ModelSettings::default()
    };
    let config = match kind {
        ProviderKind::OpenAi => ProviderConfig::OpenAi(settings),
        ProviderKind::Anthropic => ProviderConfig::Anthropic(settings),
        ProviderKind::DeepSeek => ProviderConfig::DeepSeek(settings),
        ProviderKind::Groq => ProviderConfig::Groq(settings),
        ProviderKind::OpenRouter => ProviderConfig::OpenRouter(settings),
        ProviderKind::Custom => ProviderConfig::Custom {
            base_url: Some(server.url("/v1")),
            headers: BTreeMap::new(),
            settings,
        },
        ProviderKind::Local => panic!("local is not a hosted provider"),
    };
    match Provider::from_config(&config) {
        Ok(provider) => provider.with_endpoint(server.url("/v1/chat/completions")),
        Err(err) => panic!("{kind} config should validate: {err}"),
    }
}

async fn dispatch_to(kind: ProviderKind, status: u16, body: &str) -> (ProviderError, CallLogBook) {
    let server = serve_once(MockResponse::json(status, body)).await;
    let provider = hosted_provider(kind, &server);
    let mut log = CallLogBook::new();
    let result = Dispatcher::new()
        .dispatch(&provider, "system", "prompt", &mut log)
        .await;
    assert_eq!(server.requests().len(), 1, "{kind} should send exactly one request");
    match result {
        Ok(text) => panic!("{kind} status {status} should fail, got {text}"),
        Err(err) => (err, log),
    }
}

async fn dispatch_against(status: u16, body: &str) -> (ProviderError, CallLogBook) {
    dispatch_to(ProviderKind::OpenAi, status, body).await
}

#[tokio::test]
async fn every_hosted_provider_reports_bad_credentials() {
    for kind in HOSTED {
        let (err, log) = dispatch_to(kind, 401, r#"{"error":{"message":"invalid_api_key"}}"#).await;
        assert_eq!(err.kind(), ErrorKind::Authentication, "{kind}");
        let message = err.to_string();
        assert!(message.contains("invalid_api_key"), "{kind}: {message}");
        assert!(
            message.contains("key") || message.contains("credentials"),
            "{kind}: {message}"
        );
        assert!(message.contains(kind.display_name()), "{kind}: {message}");
        assert_eq!(log.len(), 1, "{kind}");
    }
}

#[tokio::test]
async fn every_hosted_provider_reports_rate_limit() {
    for kind in HOSTED {
        let (err, log) = dispatch_to(kind, 429, r#"{"error":{"message":"slow down"}}"#).await;
        assert_eq!(err.kind(), ErrorKind::RateLimit, "{kind}");
        assert!(err.to_string().contains("slow down"), "{kind}");
        assert_eq!(log.len(), 1, "{kind}");
    }
}

#[tokio::test]
async fn every_hosted_provider_reports_server_error() {
    for kind in HOSTED {
        let (err, log) = dispatch_to(kind, 500, "upstream exploded").await;
        assert_eq!(err.kind(), ErrorKind::Server, "{kind}");
        assert!(err.to_string().contains("upstream exploded"), "{kind}");
        assert_eq!(log.len(), 1, "{kind}");
    }
}

#[tokio::test]
async fn unauthorized_surfaces_provider_message() {
    let (err, log) = dispatch_against(401, r#"{"error":{"message":"invalid_api_key"}}"#).await;

    assert_eq!(err.kind(), ErrorKind::Authentication);
    let message = err.to_string();
    assert!(message.contains("invalid_api_key"), "{message}");
    assert!(message.contains("API key"), "{message}");
    assert_eq!(log.len(), 1);
    assert_eq!(
        log.entries()[0].response.as_ref().map(|r| r.status),
        Some(401)
    );
}

#[tokio::test]
async fn forbidden_is_authentication() {
    let (err, _) = dispatch_against(403, r#"{"error":"forbidden"}"#).await;
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert!(err.to_string().contains("forbidden"));
}

#[tokio::test]
async fn not_found_without_fallback_is_terminal() {
    let (err, log) = dispatch_against(404, r#"{"message":"no such model"}"#).await;
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("no such model"));
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn too_many_requests_is_rate_limit() {
    let (err, _) = dispatch_against(429, r#"{"error":{"message":"slow down"}}"#).await;
    assert_eq!(err.kind(), ErrorKind::RateLimit);
    assert!(err.to_string().contains("slow down"));
}

#[tokio::test]
async fn server_error_body_is_sanitized() {
    let token = format!("sk-{}", "a".repeat(40));
    let (err, _) = dispatch_against(500, &format!("upstream failed for {token}")).await;

    assert_eq!(err.kind(), ErrorKind::Server);
    match err {
        ProviderError::Server { status, body, .. } => {
            assert_eq!(status, 500);
            assert!(!body.contains(&token));
            assert!(body.contains("[REDACTED]"));
        }
        other => panic!("expected server error, got: {other}"),
    }
}

#[tokio::test]
async fn other_status_is_http_status() {
    let (err, _) = dispatch_against(418, "teapot").await;
    assert_eq!(err.kind(), ErrorKind::HttpStatus);
    assert!(err.to_string().contains("418"));
}

#[test]
fn status_error_maps_every_class() {
    let cases = [
        (401, ErrorKind::Authentication),
        (403, ErrorKind::Authentication),
        (404, ErrorKind::NotFound),
        (429, ErrorKind::RateLimit),
        (500, ErrorKind::Server),
        (503, ErrorKind::Server),
        (400, ErrorKind::HttpStatus),
    ];
    for (status, kind) in cases {
        let err = status_error(ProviderKind::Groq, "http://x", status, "{}");
        assert_eq!(err.kind(), kind, "status {status}");
    }
}

#[test]
fn error_detail_understands_common_shapes() {
    assert_eq!(error_detail(r#"{"error":{"message":"bad key"}}"#), "bad key");
    assert_eq!(error_detail(r#"{"error":"bad model"}"#), "bad model");
    assert_eq!(error_detail(r#"{"message":"gone"}"#), "gone");
    assert_eq!(error_detail("plain  text\nbody"), "plain text body");
}

#[test]
fn sanitize_truncates_long_bodies() {
    let sanitized = sanitize_http_error_body(&"x".repeat(400));
    assert!(sanitized.ends_with("...[truncated]"));
    assert_eq!(sanitized.chars().count(), 256 + "...[truncated]".len());
}

#[test]
fn sanitize_redacts_provider_tokens() {
    let raw = format!(
        "keys: sk-ant-{} sk-or-{} gsk_{}",
        "b".repeat(20),
        "c".repeat(20),
        "d".repeat(24)
    );
    let sanitized = sanitize_http_error_body(&raw);
    assert!(!sanitized.contains("bbbbbbbbbb"));
    assert!(!sanitized.contains("cccccccccc"));
    assert!(!sanitized.contains("dddddddddd"));
    assert_eq!(sanitized.matches("[REDACTED]").count(), 3);
}
