/*!
 * Mock provider implementations for testing.
 *
 * This module provides mock providers that simulate different behaviors:
 * - `MockProvider::working()` - Always succeeds with translated text
 * - `MockProvider::intermittent(n)` - Fails every n-th request
 * - `MockProvider::failing()` - Always fails with an error
 * - `MockProvider::random_delay(ms)` - Succeeds after a random latency
 *
 * Clones share their counters and event log, so a test can keep a handle on
 * a provider that has been moved into a backend.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::Provider;

/// Mock request for testing
#[derive(Debug, Clone)]
pub struct MockRequest {
    /// Model the request was built for
    pub model: String,
    /// System prompt
    pub system_prompt: String,
    /// The text to translate
    pub text: String,
}

/// Mock response for testing
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// The translated text
    pub text: String,
    /// Simulated token usage
    pub tokens: Option<u64>,
}

/// Start or end of one request, numbered in arrival order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEvent {
    Started(usize),
    Finished(usize),
}

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Fails the first N requests, then works
    FailFirst { failures: usize },
    /// Returns empty response
    Empty,
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
    /// Succeeds after a uniformly random delay up to `max_ms`
    RandomDelay { max_ms: u64 },
}

/// Mock provider for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter for intermittent failures
    request_count: Arc<AtomicUsize>,
    /// Requests currently being served
    in_flight: Arc<AtomicUsize>,
    /// Highest number of concurrent requests observed
    peak_in_flight: Arc<AtomicUsize>,
    /// Request starts and finishes in the order they happened
    events: Arc<Mutex<Vec<MockEvent>>>,
    /// Custom response generator (optional)
    custom_response: Option<fn(&MockRequest) -> String>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
            events: Arc::new(Mutex::new(Vec::new())),
            custom_response: None,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every: fail_every.max(1) })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that fails its first `failures` requests
    pub fn fail_first(failures: usize) -> Self {
        Self::new(MockBehavior::FailFirst { failures })
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Create a mock that answers after a fixed delay
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Create a mock with random latency, for ordering tests
    pub fn random_delay(max_ms: u64) -> Self {
        Self::new(MockBehavior::RandomDelay { max_ms })
    }

    /// Set a custom response generator
    pub fn with_custom_response(mut self, generator: fn(&MockRequest) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Highest number of requests served at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Snapshot of the request event log
    pub fn events(&self) -> Vec<MockEvent> {
        self.events.lock().clone()
    }

    fn translate(&self, request: &MockRequest) -> MockResponse {
        let text = match self.custom_response {
            Some(generator) => generator(request),
            None => format!("[TRANSLATED] {}", request.text),
        };
        MockResponse {
            text,
            tokens: Some((request.text.len() / 4 + 1) as u64),
        }
    }

    async fn respond(&self, request: &MockRequest, count: usize) -> Result<MockResponse, ProviderError> {
        match self.behavior {
            MockBehavior::Working => Ok(self.translate(request)),

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(self.translate(request))
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::FailFirst { failures } => {
                if count < failures {
                    Err(ProviderError::ConnectionError(format!(
                        "Simulated outage (request #{})",
                        count + 1
                    )))
                } else {
                    Ok(self.translate(request))
                }
            }

            MockBehavior::Empty => Ok(MockResponse {
                text: String::new(),
                tokens: Some(0),
            }),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(self.translate(request))
            }

            MockBehavior::RandomDelay { max_ms } => {
                let delay_ms = rand::rng().random_range(0..=max_ms);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(self.translate(request))
            }
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    type Request = MockRequest;
    type Response = MockResponse;

    fn build_request(&self, model: &str, system_prompt: &str, text: &str) -> Self::Request {
        MockRequest {
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
            text: text.to_string(),
        }
    }

    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        self.events.lock().push(MockEvent::Started(count));

        let result = self.respond(&request, count).await;

        self.events.lock().push(MockEvent::Finished(count));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn extract_text(response: &Self::Response) -> String {
        response.text.clone()
    }

    fn tokens_used(response: &Self::Response) -> Option<u64> {
        response.tokens
    }
}
