// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use promptscraper::config::settings::LlmSettings;
use promptscraper::domain::services::llm_service::{LLMService, LanguageModel};
use promptscraper::utils::errors::ModelError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service(server: &MockServer) -> LLMService {
    LLMService::new_with_config(
        "test-key".to_string(),
        "test-model".to_string(),
        format!("{}/v1/", server.uri()),
    )
}

#[tokio::test]
async fn test_complete_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "test-model", "temperature": 0.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"fields\": {}}"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = service(&server).complete("extract emails").await.unwrap();

    assert_eq!(reply, "{\"fields\": {}}");
}

#[tokio::test]
async fn test_error_status_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let err = service(&server).complete("extract emails").await.unwrap_err();

    assert_eq!(
        err,
        ModelError::Api {
            status: 429,
            body: "rate limited".to_string()
        }
    );
}

#[tokio::test]
async fn test_reply_without_content_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = service(&server).complete("extract emails").await.unwrap_err();

    assert!(matches!(err, ModelError::InvalidResponse(_)));
}

#[test]
fn test_configured_key_is_used() {
    let settings = LlmSettings {
        api_key: Some("configured".to_string()),
        model: "gpt-4o-mini".to_string(),
        api_base_url: "https://api.openai.com/v1".to_string(),
        temperature: 0.0,
        max_tokens: 512,
        timeout_secs: 10,
    };

    assert!(LLMService::from_settings(&settings).has_credential());
}
