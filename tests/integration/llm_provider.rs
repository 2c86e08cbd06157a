//! Exercises the real `retrieva::llm::ollama::OllamaClient` against a `wiremock`-faked Ollama
//! server, rather than hitting the mock server directly with a bare `reqwest::Client` the way
//! the teacher's own `ollama_integration_tests.rs` does — that style proves wiremock works but
//! never actually drives this crate's own client code.

#![cfg(feature = "ollama")]

use retrieva::llm::ollama::OllamaClient;
use retrieva::LLMClient;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_chat_response(content: &str) -> serde_json::Value {
    json!({
        "model": "llama3.2",
        "created_at": "2024-01-01T00:00:00Z",
        "message": {
            "role": "assistant",
            "content": content
        },
        "done": true
    })
}

#[tokio::test]
async fn generate_parses_the_assistant_message_content_from_a_mocked_server() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_chat_response("Hello! How can I help you?")))
        .mount(&mock_server)
        .await;

    let client = OllamaClient::new(mock_server.uri(), "llama3.2".to_string()).await.unwrap();
    let response = client.generate("Hello").await.unwrap();

    assert_eq!(response, "Hello! How can I help you?");
}

#[tokio::test]
async fn generate_with_system_sends_a_system_and_user_message_and_parses_the_reply() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_chat_response("I am a helpful coding assistant.")))
        .mount(&mock_server)
        .await;

    let client = OllamaClient::new(mock_server.uri(), "llama3.2".to_string()).await.unwrap();
    let response = client.generate_with_system("You are a coding assistant", "Who are you?").await.unwrap();

    assert_eq!(response, "I am a helpful coding assistant.");
}

#[tokio::test]
async fn generate_with_history_carries_prior_turns_into_the_request() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_chat_response("Yes, we spoke about retention.")))
        .mount(&mock_server)
        .await;

    let client = OllamaClient::new(mock_server.uri(), "llama3.2".to_string()).await.unwrap();
    let history = vec![
        ("user".to_string(), "What's our retention policy?".to_string()),
        ("assistant".to_string(), "Data is retained for 90 days.".to_string()),
        ("user".to_string(), "Did we discuss this already?".to_string()),
    ];
    let response = client.generate_with_history(&history).await.unwrap();

    assert_eq!(response, "Yes, we spoke about retention.");
}

/// A non-2xx upstream response surfaces as `CoreError::TransientUpstream`, not a panic, so
/// callers like `Synthesizer`/`DeepResearchAgent` can degrade gracefully.
#[tokio::test]
async fn upstream_error_response_surfaces_as_a_transient_error_not_a_panic() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let client = OllamaClient::new(mock_server.uri(), "llama3.2".to_string()).await.unwrap();
    let result = client.generate("anything").await;

    assert!(result.is_err());
}
