/*!
 * Tests for provider clients and the mock provider
 */

use std::sync::Arc;

use doctran::errors::ProviderError;
use doctran::providers::anthropic::Anthropic;
use doctran::providers::mock::MockProvider;
use doctran::providers::ollama::Ollama;
use doctran::providers::openai::OpenAI;
use doctran::providers::Provider;
use doctran::translation::{BackendRequest, ProviderBackend, TranslationBackend};

fn backend_request(text: &str) -> BackendRequest {
    BackendRequest {
        system_prompt: "Translate to German.".to_string(),
        text: text.to_string(),
    }
}

#[tokio::test]
async fn test_providerBackend_withMock_shouldReportModelAndUsage() {
    let backend = ProviderBackend::new(MockProvider::working(), "mock-standard");

    let response = backend.translate(&backend_request("Good morning")).await.unwrap();

    assert_eq!(backend.model(), "mock-standard");
    assert_eq!(response.text, "[TRANSLATED] Good morning");
    assert!(response.tokens_used.is_some());
}

#[tokio::test]
async fn test_providerBackend_emptyMock_shouldReturnEmptyText() {
    let backend = ProviderBackend::new(MockProvider::empty(), "mock");
    let response = backend.translate(&backend_request("Hello")).await.unwrap();
    assert!(response.text.is_empty());
}

#[tokio::test]
async fn test_failFirst_shouldUseConnectionErrors() {
    let provider = MockProvider::fail_first(1);
    let backend: Arc<dyn TranslationBackend> = Arc::new(ProviderBackend::new(provider.clone(), "mock"));

    let first = backend.translate(&backend_request("a")).await;
    let second = backend.translate(&backend_request("a")).await;

    assert!(matches!(first, Err(ProviderError::ConnectionError(_))));
    assert!(second.is_ok());
    assert_eq!(provider.request_count(), 2);
}

#[tokio::test]
async fn test_failingMock_shouldReturnServerError() {
    let backend = ProviderBackend::new(MockProvider::failing(), "mock");
    match backend.translate(&backend_request("a")).await {
        Err(ProviderError::ApiError { status_code, .. }) => assert_eq!(status_code, 500),
        other => panic!("expected API error, got {:?}", other.map(|r| r.text)),
    }
}

#[tokio::test]
async fn test_randomDelay_shouldStillTranslateEveryRequest() {
    let provider = MockProvider::random_delay(10);
    let backend = ProviderBackend::new(provider.clone(), "mock");

    let requests: Vec<BackendRequest> = (0..8).map(|i| backend_request(&format!("line {}", i))).collect();
    let responses = futures::future::join_all(requests.iter().map(|r| backend.translate(r))).await;

    for (i, response) in responses.into_iter().enumerate() {
        assert_eq!(response.unwrap().text, format!("[TRANSLATED] line {}", i));
    }
    assert_eq!(provider.request_count(), 8);
}

#[test]
fn test_ollamaRequest_shouldCarrySystemPromptAndSampling() {
    let client = Ollama::new("http://localhost:11434", 30).with_sampling(0.1, 512);
    let request = client.build_request("llama3", "Translate to Italian.", "Hello");

    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["model"], "llama3");
    assert_eq!(json["prompt"], "Hello");
    assert_eq!(json["system"], "Translate to Italian.");
    assert_eq!(json["stream"], false);
}

#[test]
fn test_openAiRequest_shouldPutSystemPromptFirst() {
    let client = OpenAI::new("sk-test", "", 30);
    let request = client.build_request("gpt-4o-mini", "Translate to Spanish.", "Hello");

    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["messages"][0]["role"], "system");
    assert_eq!(json["messages"][1]["role"], "user");
    assert_eq!(json["messages"][1]["content"], "Hello");
}

#[test]
fn test_anthropicRequest_shouldUseTopLevelSystemField() {
    let client = Anthropic::new("key", "", 30).with_sampling(0.2, 1024);
    let request = client.build_request("claude-3-haiku", "Translate to Dutch.", "Hello");

    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["system"], "Translate to Dutch.");
    assert_eq!(json["max_tokens"], 1024);
    assert_eq!(json["messages"].as_array().map(|m| m.len()), Some(1));
}

#[tokio::test]
async fn test_ollama_unreachableServer_shouldBeConnectionError() {
    let client = Ollama::new("http://127.0.0.1:9", 2);
    let request = client.build_request("llama3", "Translate.", "Hello");

    let result = client.complete(request).await;

    assert!(matches!(result, Err(ProviderError::ConnectionError(_))));
}
