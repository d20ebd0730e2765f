//! Local provider: endpoint detection, fallback and strict content checks.

use testsmith::providers::calllog::CallLogBook;
use testsmith::providers::dispatcher::Dispatcher;
use testsmith::providers::local::LocalApi;
use testsmith::providers::{ErrorKind, ModelSettings, Provider, ProviderConfig, ProviderError};

use crate::mock_server::{closed_port_url, serve, serve_once, MockResponse};

fn local(endpoint: &str, model: Option<&str>) -> ProviderConfig {
    ProviderConfig::Local {
        endpoint: Some(endpoint.to_owned()),
        settings: ModelSettings {
            model: model.map(str::to_owned),
            ..ModelSettings::default()
        },
    }
}

fn provider(endpoint: &str) -> Provider {
    match Provider::from_config(&local(endpoint, Some("llama3"))) {
        Ok(provider) => provider,
        Err(err) => panic!("local config should validate: {err}"),
    }
}

#[test]
fn detect_picks_wire_format_from_base_url() {
    assert_eq!(
        LocalApi::detect("http://localhost:11434"),
        LocalApi::Generate {
            url: "http://localhost:11434/api/generate".to_owned()
        }
    );
    assert_eq!(
        LocalApi::detect("http://localhost:1234/v1"),
        LocalApi::OpenAiCompatible {
            chat_url: "http://localhost:1234/v1/chat/completions".to_owned(),
            completions_url: "http://localhost:1234/v1/completions".to_owned(),
        }
    );
}

#[test]
fn validation_distinguishes_endpoint_and_model() {
    let missing_endpoint = ProviderConfig::Local {
        endpoint: None,
        settings: ModelSettings {
            model: Some("llama3".to_owned()),
            ..ModelSettings::default()
        },
    };
    let endpoint_message = match Provider::from_config(&missing_endpoint) {
        Err(ProviderError::Configuration(message)) => message,
        other => panic!("expected configuration error, got {other:?}"),
    };
    assert!(endpoint_message.contains("endpoint"));

    let model_message = match Provider::from_config(&local("http://localhost:11434", None)) {
        Err(ProviderError::Configuration(message)) => message,
        other => panic!("expected configuration error, got {other:?}"),
    };
    assert!(model_message.contains("model"));
    assert_ne!(endpoint_message, model_message);

    assert!(Provider::from_config(&local("ftp://localhost", Some("llama3"))).is_err());
}

#[tokio::test]
async fn generate_endpoint_is_used_without_v1() {
    let server = serve_once(MockResponse::json(200, r#"{"response":"do_something()"}"#)).await;
    let provider = provider(&server.base_url);
    let mut log = CallLogBook::new();

    let text = Dispatcher::new()
        .dispatch(&provider, "system", "prompt", &mut log)
        .await
        .expect("dispatch should succeed");

    assert_eq!(text, "do_something()");
    assert_eq!(server.paths(), vec!["/api/generate".to_owned()]);
    let body = server.requests()[0].json();
    assert_eq!(body["model"], "llama3");
    assert_eq!(body["prompt"], "prompt");
    assert_eq!(body["stream"], false);
    assert!(body.get("messages").is_none());
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn v1_base_falls_back_to_completions_once_on_404() {
    let server = serve(vec![
        MockResponse::json(404, r#"{"error":"not found"}"#),
        MockResponse::json(200, r#"{"choices":[{"text":"page.click()"}]}"#),
    ])
    .await;
    let provider = provider(&server.url("/v1"));
    let mut log = CallLogBook::new();

    let text = Dispatcher::new()
        .dispatch(&provider, "system", "prompt", &mut log)
        .await
        .expect("fallback should succeed");

    assert_eq!(text, "page.click()");
    assert_eq!(
        server.paths(),
        vec![
            "/v1/chat/completions".to_owned(),
            "/v1/completions".to_owned()
        ]
    );
    let legacy = server.requests()[1].json();
    assert_eq!(legacy["prompt"], "prompt");
    assert_eq!(legacy["stream"], false);

    let entries = log.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].response.as_ref().map(|r| r.status), Some(404));
    assert_eq!(entries[1].response.as_ref().map(|r| r.status), Some(200));
}

#[tokio::test]
async fn v1_server_error_is_not_retried() {
    let server = serve(vec![
        MockResponse::json(500, r#"{"error":"model crashed"}"#),
        MockResponse::json(200, r#"{"choices":[{"text":"never"}]}"#),
    ])
    .await;
    let provider = provider(&server.url("/v1"));
    let mut log = CallLogBook::new();

    let err = Dispatcher::new()
        .dispatch(&provider, "system", "prompt", &mut log)
        .await
        .expect_err("500 should fail");

    assert_eq!(err.kind(), ErrorKind::Server);
    assert!(err.to_string().contains("model crashed"));
    assert_eq!(log.len(), 1);
    assert_eq!(server.paths(), vec!["/v1/chat/completions".to_owned()]);
}

#[tokio::test]
async fn fallback_is_not_retried_again() {
    let server = serve(vec![
        MockResponse::json(404, "{}"),
        MockResponse::json(404, r#"{"error":{"message":"model llama3 not found"}}"#),
        MockResponse::json(200, r#"{"choices":[{"text":"never"}]}"#),
    ])
    .await;
    let provider = provider(&server.url("/v1"));
    let mut log = CallLogBook::new();

    let err = Dispatcher::new()
        .dispatch(&provider, "system", "prompt", &mut log)
        .await
        .expect_err("second 404 should fail");

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("model llama3 not found"));
    assert_eq!(log.len(), 2);
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn empty_content_is_rejected() {
    let server = serve_once(MockResponse::json(200, r#"{"response":"   "}"#)).await;
    let provider = provider(&server.base_url);
    let mut log = CallLogBook::new();

    let err = Dispatcher::new()
        .dispatch(&provider, "system", "prompt", &mut log)
        .await
        .expect_err("empty content should fail");
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
}

#[tokio::test]
async fn falls_through_to_later_strategies() {
    let server = serve_once(MockResponse::json(200, r#"{"text":"cy.visit('/')"}"#)).await;
    let provider = provider(&server.base_url);
    let mut log = CallLogBook::new();

    let text = Dispatcher::new()
        .dispatch(&provider, "system", "prompt", &mut log)
        .await
        .expect("text field should be accepted");
    assert_eq!(text, "cy.visit('/')");
}

#[tokio::test]
async fn connection_failure_names_local_service() {
    let base = closed_port_url().await;
    let provider = provider(&base);
    let mut log = CallLogBook::new();

    let err = Dispatcher::new()
        .dispatch(&provider, "system", "prompt", &mut log)
        .await
        .expect_err("closed port should fail");

    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(err
        .to_string()
        .contains(&format!("Cannot connect to local LLM service at {base}")));
    assert_eq!(log.len(), 1);
    assert!(log.entries()[0].error.is_some());
    assert!(log.entries()[0].response.is_none());
}
