/*!
 * Translation backends.
 *
 * A backend translates one chunk given a system prompt. `ProviderBackend`
 * adapts any `Provider` client; `BackendRegistry` maps each tier to the
 * backend configured for it.
 */

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

use crate::app_config::{Config, ProviderConfig, TranslationProvider};
use crate::chunking::Tier;
use crate::errors::ProviderError;
use crate::providers::anthropic::Anthropic;
use crate::providers::ollama::Ollama;
use crate::providers::openai::OpenAI;
use crate::providers::Provider;

/// One chunk to translate
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub system_prompt: String,
    pub text: String,
}

/// A backend's answer for one chunk
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub text: String,
    /// Tokens billed, when the backend reports usage
    pub tokens_used: Option<u64>,
}

/// Opaque model service used for one tier
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Model identifier recorded on translated chunks
    fn model(&self) -> &str;

    async fn translate(&self, request: &BackendRequest) -> Result<BackendResponse, ProviderError>;
}

/// Backend built on a provider client and a model name
#[derive(Debug, Clone)]
pub struct ProviderBackend<P: Provider> {
    provider: P,
    model: String,
}

impl<P: Provider> ProviderBackend<P> {
    pub fn new(provider: P, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

#[async_trait]
impl<P: Provider> TranslationBackend for ProviderBackend<P> {
    fn model(&self) -> &str {
        &self.model
    }

    async fn translate(&self, request: &BackendRequest) -> Result<BackendResponse, ProviderError> {
        let provider_request = self
            .provider
            .build_request(&self.model, &request.system_prompt, &request.text);
        let response = self.provider.complete(provider_request).await?;

        Ok(BackendResponse {
            text: P::extract_text(&response),
            tokens_used: P::tokens_used(&response),
        })
    }
}

/// Backend per tier
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<Tier, Arc<dyn TranslationBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the backend for a tier
    pub fn register(&mut self, tier: Tier, backend: Arc<dyn TranslationBackend>) {
        self.backends.insert(tier, backend);
    }

    /// Builder form of `register`
    pub fn with_backend(mut self, tier: Tier, backend: Arc<dyn TranslationBackend>) -> Self {
        self.register(tier, backend);
        self
    }

    pub fn get(&self, tier: Tier) -> Option<Arc<dyn TranslationBackend>> {
        self.backends.get(&tier).cloned()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Build HTTP backends for every tier from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new();

        for (tier, settings) in config.chunking.tiers.iter() {
            let provider_config = config
                .translation
                .get_provider_config(&settings.provider)
                .ok_or_else(|| anyhow!("Tier '{}' uses provider '{}' which is not configured", tier, settings.provider))?;
            let model = config.translation.model_for(settings);

            debug!("Tier {} uses {} model {}", tier, settings.provider.display_name(), model);
            registry.register(tier, build_backend(settings.provider, provider_config, model));
        }

        Ok(registry)
    }
}

fn build_backend(
    provider: TranslationProvider,
    config: &ProviderConfig,
    model: String,
) -> Arc<dyn TranslationBackend> {
    let (temperature, max_output_tokens) = (config.temperature, config.max_output_tokens);
    match provider {
        TranslationProvider::Ollama => {
            let client = Ollama::new(&config.endpoint, config.timeout_secs).with_sampling(temperature, max_output_tokens);
            Arc::new(ProviderBackend::new(client, model))
        }
        TranslationProvider::OpenAI | TranslationProvider::LMStudio => {
            let client = OpenAI::new(&config.api_key, &config.endpoint, config.timeout_secs)
                .with_sampling(temperature, max_output_tokens);
            Arc::new(ProviderBackend::new(client, model))
        }
        TranslationProvider::Anthropic => {
            let client = Anthropic::new(&config.api_key, &config.endpoint, config.timeout_secs)
                .with_sampling(temperature, max_output_tokens);
            Arc::new(ProviderBackend::new(client, model))
        }
    }
}
