//! Custom OpenAI-compatible endpoint.

use std::collections::BTreeMap;

use testsmith::providers::calllog::CallLogBook;
use testsmith::providers::dispatcher::Dispatcher;
use testsmith::providers::{ErrorKind, ModelSettings, Provider, ProviderConfig, ProviderError};

use crate::mock_server::{serve_once, MockResponse};

fn custom(base_url: Option<&str>, key: Option<&str>, model: Option<&str>) -> ProviderConfig {
    let mut headers = BTreeMap::new();
    headers.insert("X-Team".to_owned(), "qa".to_owned());
    ProviderConfig::Custom {
        base_url: base_url.map(str::to_owned),
        headers,
        settings: ModelSettings {
            api_key: key.map(str::to_owned),
            model: model.map(str::to_owned),
            temperature: Some(0.0),
            max_tokens: Some(512),
        },
    }
}

#[test]
fn every_field_is_required() {
    let cases = [
        custom(None, Some("k"), Some("m")),
        custom(Some("https://llm.example.com/v1"), None, Some("m")),
        custom(Some("https://llm.example.com/v1"), Some("k"), None),
        custom(Some("not a url"), Some("k"), Some("m")),
    ];
    for config in cases {
        match Provider::from_config(&config) {
            Err(ProviderError::Configuration(_)) => {}
            other => panic!("expected configuration error, got {other:?}"),
        }
    }
}

#[test]
fn url_appends_chat_completions_to_trimmed_base() {
    let bases = [
        "https://llm.example.com/v1",
        "https://llm.example.com/v1/",
        " https://llm.example.com/v1// ",
    ];
    for base in bases {
        match Provider::from_config(&custom(Some(base), Some("k"), Some("m"))) {
            Ok(Provider::Custom(inner)) => {
                assert_eq!(
                    inner.url(),
                    "https://llm.example.com/v1/chat/completions",
                    "{base:?}"
                );
            }
            other => panic!("expected custom provider for {base:?}, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn sends_bearer_extra_headers_and_settings() {
    let server = serve_once(MockResponse::json(
        200,
        r#"{"choices":[{"message":{"content":"cy.get('#a').click()"}}]}"#,
    ))
    .await;
    let base = format!("{}/", server.url("/v1"));
    let provider = match Provider::from_config(&custom(Some(&base), Some("custom-key"), Some("house"))) {
        Ok(provider) => provider,
        Err(err) => panic!("config should validate: {err}"),
    };
    let mut log = CallLogBook::new();

    let text = Dispatcher::new()
        .dispatch(&provider, "system", "prompt", &mut log)
        .await
        .expect("dispatch should succeed");

    assert_eq!(text, "cy.get('#a').click()");
    let request = &server.requests()[0];
    assert_eq!(request.path, "/v1/chat/completions");
    assert_eq!(request.header("authorization"), Some("Bearer custom-key"));
    assert_eq!(request.header("x-team"), Some("qa"));
    let body = request.json();
    assert_eq!(body["model"], "house");
    assert_eq!(body["max_tokens"], 512);
    assert_eq!(body["temperature"], 0.0);
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = serve_once(MockResponse::json(404, "{}")).await;
    let provider = match Provider::from_config(&custom(Some(&server.url("/v1")), Some("k"), Some("m"))) {
        Ok(provider) => provider,
        Err(err) => panic!("config should validate: {err}"),
    };
    let mut log = CallLogBook::new();

    let err = Dispatcher::new()
        .dispatch(&provider, "system", "prompt", &mut log)
        .await
        .expect_err("404 should fail");

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(log.len(), 1);
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn credential_headers_are_sent_but_not_logged() {
    let server = serve_once(MockResponse::json(
        200,
        r#"{"choices":[{"message":{"content":"ok()"}}]}"#,
    ))
    .await;
    let mut config = custom(Some(&server.url("/v1")), Some("custom-key"), Some("m"));
    if let ProviderConfig::Custom { headers, .. } = &mut config {
        headers.insert("X-Api-Token".to_owned(), "tok-123".to_owned());
    }
    let provider = match Provider::from_config(&config) {
        Ok(provider) => provider,
        Err(err) => panic!("config should validate: {err}"),
    };
    let mut log = CallLogBook::new();

    Dispatcher::new()
        .dispatch(&provider, "system", "prompt", &mut log)
        .await
        .expect("dispatch should succeed");

    assert_eq!(server.requests()[0].header("x-api-token"), Some("tok-123"));
    let logged = &log.entries()[0].request.headers;
    assert_eq!(logged["x-api-token"], "[REDACTED]");
    assert_eq!(logged["authorization"], "[REDACTED]");
    assert_eq!(logged["x-team"], "qa");
    let shown = serde_json::to_string(log.entries()).expect("log should serialize");
    assert!(!shown.contains("tok-123"));
    assert!(!shown.contains("custom-key"));
}
