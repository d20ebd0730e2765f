//! Dispatch against a mock hosted provider: extraction and call logging.

use testsmith::providers::calllog::CallLogBook;
use testsmith::providers::dispatcher::Dispatcher;
use testsmith::providers::{ErrorKind, ModelSettings, Provider, ProviderConfig};

use crate::mock_server::{serve_once, MockResponse, MockServer};

fn openai_at(server: &MockServer) -> Provider {
    let config = ProviderConfig::OpenAi(ModelSettings {
        api_key: Some("sk-test".to_owned()),
        ..ModelSettings::default()
    });
    match Provider::from_config(&config) {
        Ok(provider) => provider.with_endpoint(server.url("/v1/chat/completions")),
        Err(err) => panic!("config should validate: {err}"),
    }
}

fn anthropic_at(server: &MockServer) -> Provider {
    let config = ProviderConfig::Anthropic(ModelSettings {
        api_key: Some("sk-ant-test".to_owned()),
        ..ModelSettings::default()
    });
    match Provider::from_config(&config) {
        Ok(provider) => provider.with_endpoint(server.url("/v1/messages")),
        Err(err) => panic!("config should validate: {err}"),
    }
}

#[tokio::test]
async fn openai_content_is_extracted_verbatim() {
    let server = serve_once(MockResponse::json(
        200,
        r#"{"choices":[{"message":{"content":"```python\nclick('#submit')\n```"}}]}"#,
    ))
    .await;
    let provider = openai_at(&server);
    let mut log = CallLogBook::new();

    let text = Dispatcher::new()
        .dispatch(&provider, "system", "prompt", &mut log)
        .await
        .expect("dispatch should succeed");

    assert_eq!(text, "```python\nclick('#submit')\n```");
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/v1/chat/completions");
    assert_eq!(requests[0].header("authorization"), Some("Bearer sk-test"));
}

#[tokio::test]
async fn anthropic_content_block_is_extracted() {
    let server = serve_once(MockResponse::json(
        200,
        r#"{"content":[{"type":"text","text":"await page.goto('/')"}]}"#,
    ))
    .await;
    let provider = anthropic_at(&server);
    let mut log = CallLogBook::new();

    let text = Dispatcher::new()
        .dispatch(&provider, "system", "prompt", &mut log)
        .await
        .expect("dispatch should succeed");

    assert_eq!(text, "await page.goto('/')");
    assert_eq!(server.requests()[0].header("anthropic-version"), Some("2023-06-01"));
}

#[tokio::test]
async fn hosted_empty_content_is_accepted() {
    let server = serve_once(MockResponse::json(
        200,
        r#"{"choices":[{"message":{"content":""}}]}"#,
    ))
    .await;
    let provider = openai_at(&server);
    let mut log = CallLogBook::new();

    let text = Dispatcher::new()
        .dispatch(&provider, "system", "prompt", &mut log)
        .await
        .expect("hosted providers accept empty content");
    assert!(text.is_empty());
}

#[tokio::test]
async fn missing_content_field_is_malformed() {
    let server = serve_once(MockResponse::json(200, r#"{"id":"chatcmpl-1","choices":[]}"#)).await;
    let provider = openai_at(&server);
    let mut log = CallLogBook::new();

    let err = Dispatcher::new()
        .dispatch(&provider, "system", "prompt", &mut log)
        .await
        .expect_err("missing content should fail");

    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    let message = err.to_string();
    assert!(message.starts_with("unexpected response format from OpenAI"));
    assert!(message.contains("choices[0].message.content"));
}

#[tokio::test]
async fn non_json_success_body_is_malformed() {
    let server = serve_once(MockResponse::with_content_type(200, "text/plain", "hello")).await;
    let provider = openai_at(&server);
    let mut log = CallLogBook::new();

    let err = Dispatcher::new()
        .dispatch(&provider, "system", "prompt", &mut log)
        .await
        .expect_err("plain text should fail");
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
}

#[tokio::test]
async fn call_log_records_request_and_response() {
    let server = serve_once(MockResponse::json(
        200,
        r#"{"choices":[{"message":{"content":"ok"}}]}"#,
    ))
    .await;
    let provider = openai_at(&server);
    let mut log = CallLogBook::new();

    Dispatcher::new()
        .dispatch(&provider, "system", "prompt", &mut log)
        .await
        .expect("dispatch should succeed");

    let entries = log.into_entries();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.request.url, server.url("/v1/chat/completions"));
    assert_eq!(entry.request.method, "POST");
    assert_eq!(entry.request.headers["authorization"], "[REDACTED]");
    assert_eq!(
        entry.request.body.as_ref().map(|b| b["messages"][1]["content"].clone()),
        Some(serde_json::json!("prompt"))
    );

    let response = entry.response.as_ref().expect("response should be recorded");
    assert_eq!(response.status, 200);
    assert!(response.body.contains("\"ok\""));
    assert!(response.timestamp >= entry.request.timestamp);
    assert!(entry.error.is_none());
    assert!(!entry.is_pending());
}

#[tokio::test]
async fn each_dispatch_gets_its_own_log() {
    let first = serve_once(MockResponse::json(
        200,
        r#"{"choices":[{"message":{"content":"one"}}]}"#,
    ))
    .await;
    let second = serve_once(MockResponse::json(
        200,
        r#"{"choices":[{"message":{"content":"two"}}]}"#,
    ))
    .await;
    let dispatcher = Dispatcher::new();
    let first_provider = openai_at(&first);
    let second_provider = openai_at(&second);

    let mut first_log = CallLogBook::new();
    let mut second_log = CallLogBook::new();
    let (a, b) = tokio::join!(
        dispatcher.dispatch(&first_provider, "s", "p", &mut first_log),
        dispatcher.dispatch(&second_provider, "s", "p", &mut second_log),
    );

    assert_eq!(a.ok().as_deref(), Some("one"));
    assert_eq!(b.ok().as_deref(), Some("two"));
    assert_eq!(first_log.len(), 1);
    assert_eq!(second_log.len(), 1);
    assert_eq!(first_log.entries()[0].request.url, first.url("/v1/chat/completions"));
    assert_eq!(second_log.entries()[0].request.url, second.url("/v1/chat/completions"));
}
