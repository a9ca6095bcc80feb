use httpmock::prelude::*;
use serde_json::json;

use dm_llm::gateway::LlmGatewayHandle;
use dm_llm::types::{CompletionRequest, GatewayConfig, LlmError, ProviderKind};

fn config_for(base_url: String) -> GatewayConfig {
    GatewayConfig {
        provider: ProviderKind::ProviderB,
        model: "model-y".to_string(),
        base_url,
        api_key: "test-key".to_string(),
        max_tokens: 256,
        temperature: 0.0,
        request_timeout_ms: 5_000,
        max_retries: 3,
    }
}

fn request() -> CompletionRequest {
    CompletionRequest {
        system: "describe".to_string(),
        user: "the orders table".to_string(),
        max_tokens: 256,
        temperature: 0.0,
        json_mode: false,
    }
}

#[tokio::test]
async fn gateway_completes_successfully_on_first_try() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(json!({
            "choices": [{"message": {"content": "ok"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2}
        }));
    });

    let handle = LlmGatewayHandle::new_standalone(config_for(server.base_url())).expect("handle");
    let response = handle.complete(request()).await.expect("completion should succeed");

    mock.assert_calls(1);
    assert_eq!(response.text, "ok");
    assert_eq!(response.input_tokens, 3);
    assert_eq!(response.output_tokens, 2);
}

#[tokio::test]
async fn gateway_sends_the_configured_api_key_as_a_bearer_token() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .header("authorization", "Bearer test-key");
        then.status(200).json_body(json!({
            "choices": [{"message": {"content": "ok"}}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1}
        }));
    });

    let handle = LlmGatewayHandle::new_standalone(config_for(server.base_url())).expect("handle");
    handle.complete(request()).await.expect("completion should succeed");

    mock.assert_calls(1);
}

#[tokio::test]
async fn gateway_retries_on_rate_limit_then_succeeds() {
    let server = MockServer::start();
    let first = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .header("x-dm-retry-attempt", "0");
        then.status(429).body("rate limited");
    });
    let second = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .header("x-dm-retry-attempt", "1");
        then.status(200).json_body(json!({
            "choices": [{"message": {"content": "ok after retry"}}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1}
        }));
    });

    let handle = LlmGatewayHandle::new_standalone(config_for(server.base_url())).expect("handle");
    let response = handle.complete(request()).await.expect("retry should eventually succeed");

    assert_eq!(response.text, "ok after retry");
    first.assert_calls(1);
    second.assert_calls(1);
}

#[tokio::test]
async fn gateway_surfaces_terminal_status_without_retry() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(401).body("unauthorized");
    });

    let handle = LlmGatewayHandle::new_standalone(config_for(server.base_url())).expect("handle");
    let error = handle.complete(request()).await.expect_err("401 should not be retried");

    mock.assert_calls(1);
    match error {
        LlmError::HttpStatus { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("unauthorized"));
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn gateway_exhausts_retries_and_reports_rate_limited() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(429).body("still rate limited");
    });

    let mut config = config_for(server.base_url());
    config.max_retries = 2;
    let handle = LlmGatewayHandle::new_standalone(config).expect("handle");
    let error = handle.complete(request()).await.expect_err("should exhaust retries");

    mock.assert_calls(2);
    assert!(matches!(error, LlmError::RateLimited(_)));
}

#[tokio::test]
async fn gateway_parses_json_directly_when_already_clean() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(json!({
            "choices": [{"message": {"content": "{\"table_name\": \"orders\"}"}}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1}
        }));
    });

    let handle = LlmGatewayHandle::new_standalone(config_for(server.base_url())).expect("handle");
    let value = handle.complete_json(request()).await.expect("json decode");
    assert_eq!(value["table_name"], "orders");
}

#[tokio::test]
async fn gateway_strips_code_fence_before_failing_malformed_json() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(json!({
            "choices": [{"message": {"content": "```json\n{\"table_name\": \"orders\"}\n```"}}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1}
        }));
    });

    let handle = LlmGatewayHandle::new_standalone(config_for(server.base_url())).expect("handle");
    let value = handle.complete_json(request()).await.expect("json decode after cleaning");
    assert_eq!(value["table_name"], "orders");
}
