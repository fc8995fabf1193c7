/*!
 * Provider implementations for different translation services.
 *
 * This module contains client implementations for various LLM providers:
 * - Ollama: Local LLM server
 * - OpenAI: OpenAI API and compatible servers (LM Studio)
 * - Anthropic: Anthropic API integration
 * - Mock: scripted provider for tests
 */

use async_trait::async_trait;
use log::error;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::time::Duration;

use crate::errors::ProviderError;

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably behind a translation backend.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// The request type for this provider
    type Request: Send + Sync;

    /// The response type for this provider
    type Response: Send + Sync;

    /// Build a single-turn request: system instructions plus the text to translate
    fn build_request(&self, model: &str, system_prompt: &str, text: &str) -> Self::Request;

    /// Complete a request using this provider
    ///
    /// # Arguments
    /// * `request` - The request to complete
    ///
    /// # Returns
    /// * `Result<Self::Response, ProviderError>` - The response from the provider or an error
    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError>;

    /// Extract text from the provider response
    fn extract_text(response: &Self::Response) -> String;

    /// Total tokens billed for the response, when the provider reports them
    fn tokens_used(response: &Self::Response) -> Option<u64>;
}

/// HTTP client with the given request timeout
pub(crate) fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_default()
}

/// Classify a transport failure
pub(crate) fn request_error(provider: &str, e: reqwest::Error) -> ProviderError {
    if e.is_timeout() || e.is_connect() {
        ProviderError::ConnectionError(format!("{}: {}", provider, e))
    } else {
        ProviderError::RequestFailed(format!("{}: {}", provider, e))
    }
}

/// Turn a non-success HTTP status into the matching provider error
pub(crate) async fn check_status(provider: &str, response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    error!("{} API error ({}): {}", provider, status, message);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthenticationError(message),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded(message),
        _ => ProviderError::ApiError {
            status_code: status.as_u16(),
            message,
        },
    })
}

/// Deserialize a successful JSON body
pub(crate) async fn parse_json<T: DeserializeOwned>(provider: &str, response: Response) -> Result<T, ProviderError> {
    let body = response
        .text()
        .await
        .map_err(|e| request_error(provider, e))?;

    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(500).collect();
        error!("Failed to parse {} response: {}. Raw response: {}", provider, e, preview);
        ProviderError::ParseError(format!("{}: {}", provider, e))
    })
}

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;
