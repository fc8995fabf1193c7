use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::default::Default;
use std::path::Path;
use url::Url;

use crate::chunking::{ChunkOptions, Tier};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Default source language code (ISO); detected per chunk when absent
    #[serde(default)]
    pub source_language: Option<String>,

    /// Default target language code (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Chunking engine settings
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Job queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Ollama
    #[default]
    Ollama,
    // @provider: OpenAI
    OpenAI,
    // @provider: Anthropic
    Anthropic,
    // @provider: LM Studio (OpenAI-compatible local server)
    LMStudio,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::LMStudio => "LM Studio",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
        }
    }

    /// Hosted providers refuse requests without an API key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Anthropic)
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "lmstudio" => Ok(Self::LMStudio),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    // @field: Upper bound on generated tokens per request
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        let (model, endpoint, timeout_secs) = match provider_type {
            TranslationProvider::Ollama => (default_ollama_model(), default_ollama_endpoint(), default_timeout_secs()),
            TranslationProvider::OpenAI => (default_openai_model(), default_openai_endpoint(), default_timeout_secs()),
            TranslationProvider::Anthropic => (
                default_anthropic_model(),
                default_anthropic_endpoint(),
                default_anthropic_timeout_secs(),
            ),
            TranslationProvider::LMStudio => (default_lmstudio_model(), default_lmstudio_endpoint(), default_timeout_secs()),
        };

        Self {
            provider_type: provider_type.to_lowercase_string(),
            model,
            api_key: String::new(),
            endpoint,
            timeout_secs,
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }

    /// Parsed provider kind
    pub fn kind(&self) -> Result<TranslationProvider> {
        self.provider_type.parse()
    }
}

/// Per-tier chunking and translation settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TierSettings {
    /// Token budget for one chunk
    pub max_tokens: usize,

    /// Tokens shared between consecutive chunks
    pub overlap: usize,

    /// Attach content metadata to every chunk
    #[serde(default)]
    pub generate_dna: bool,

    /// Break sections at headings
    #[serde(default = "default_true")]
    pub preserve_structure: bool,

    /// Chunks translated concurrently within one batch
    #[serde(default = "default_tier_concurrency")]
    pub concurrency: usize,

    /// Pause between batches in milliseconds
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Provider serving this tier
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Model override; the provider's model is used when absent
    #[serde(default)]
    pub model: Option<String>,

    /// Confidence reported for chunks translated in this tier
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

impl TierSettings {
    /// Chunking options before per-call overrides
    pub fn chunk_options(&self) -> ChunkOptions {
        ChunkOptions {
            max_tokens: self.max_tokens,
            overlap: self.overlap,
            preserve_structure: self.preserve_structure,
            generate_dna: self.generate_dna,
        }
    }

    fn basic() -> Self {
        Self {
            max_tokens: 500,
            overlap: 50,
            generate_dna: false,
            preserve_structure: false,
            concurrency: 3,
            batch_delay_ms: 100,
            provider: TranslationProvider::Ollama,
            model: Some("llama3.2:3b".to_string()),
            confidence: 0.75,
        }
    }

    fn standard() -> Self {
        Self {
            max_tokens: 1000,
            overlap: 100,
            generate_dna: false,
            preserve_structure: true,
            concurrency: 2,
            batch_delay_ms: 200,
            provider: TranslationProvider::Ollama,
            model: Some("llama3.1:8b".to_string()),
            confidence: 0.85,
        }
    }

    fn premium() -> Self {
        Self {
            max_tokens: 1500,
            overlap: 100,
            generate_dna: true,
            preserve_structure: true,
            concurrency: 1,
            batch_delay_ms: 200,
            provider: TranslationProvider::Ollama,
            model: Some("llama3.1:70b".to_string()),
            confidence: 0.95,
        }
    }
}

/// Settings for each quality tier
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TierTable {
    #[serde(default = "TierSettings::basic")]
    pub basic: TierSettings,

    #[serde(default = "TierSettings::standard")]
    pub standard: TierSettings,

    #[serde(default = "TierSettings::premium")]
    pub premium: TierSettings,
}

impl TierTable {
    pub fn get(&self, tier: Tier) -> &TierSettings {
        match tier {
            Tier::Basic => &self.basic,
            Tier::Standard => &self.standard,
            Tier::Premium => &self.premium,
        }
    }

    pub fn get_mut(&mut self, tier: Tier) -> &mut TierSettings {
        match tier {
            Tier::Basic => &mut self.basic,
            Tier::Standard => &mut self.standard,
            Tier::Premium => &mut self.premium,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tier, &TierSettings)> {
        Tier::ALL.into_iter().map(move |tier| (tier, self.get(tier)))
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            basic: TierSettings::basic(),
            standard: TierSettings::standard(),
            premium: TierSettings::premium(),
        }
    }
}

/// Chunking engine configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Token budget for one section before it is split into chunks
    #[serde(default = "default_section_target_tokens")]
    pub section_target_tokens: usize,

    /// Regex marking a heading paragraph; the built-in pattern is used when absent
    #[serde(default)]
    pub heading_pattern: Option<String>,

    /// Concurrent DNA extraction tasks
    #[serde(default = "default_dna_concurrency")]
    pub dna_concurrency: usize,

    /// How far back the splitter looks for whitespace to end a chunk on
    #[serde(default = "default_boundary_window_chars")]
    pub boundary_window_chars: usize,

    /// Token counter memoization capacity
    #[serde(default = "default_token_cache_size")]
    pub token_cache_size: usize,

    /// Use the per-script chars-per-token table instead of measuring each section
    #[serde(default)]
    pub script_aware_ratios: bool,

    /// Chars per token by detected script (language code or "default")
    #[serde(default = "default_script_ratios")]
    pub script_ratios: HashMap<String, f64>,

    /// Per-tier settings
    #[serde(default)]
    pub tiers: TierTable,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            section_target_tokens: default_section_target_tokens(),
            heading_pattern: None,
            dna_concurrency: default_dna_concurrency(),
            boundary_window_chars: default_boundary_window_chars(),
            token_cache_size: default_token_cache_size(),
            script_aware_ratios: false,
            script_ratios: default_script_ratios(),
            tiers: TierTable::default(),
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// System prompt template for translation
    /// Placeholders: {source_language}, {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl TranslationConfig {
    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers
            .iter()
            .find(|p| p.provider_type.eq_ignore_ascii_case(&provider_str))
    }

    /// Model used by a tier: the tier override, else the provider's model
    pub fn model_for(&self, tier: &TierSettings) -> String {
        if let Some(model) = tier.model.as_ref().filter(|m| !m.is_empty()) {
            return model.clone();
        }

        match self.get_provider_config(&tier.provider) {
            Some(provider_config) if !provider_config.model.is_empty() => provider_config.model.clone(),
            _ => match tier.provider {
                TranslationProvider::Ollama => default_ollama_model(),
                TranslationProvider::OpenAI => default_openai_model(),
                TranslationProvider::Anthropic => default_anthropic_model(),
                TranslationProvider::LMStudio => default_lmstudio_model(),
            },
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Ollama),
                ProviderConfig::new(TranslationProvider::OpenAI),
                ProviderConfig::new(TranslationProvider::Anthropic),
                ProviderConfig::new(TranslationProvider::LMStudio),
            ],
            system_prompt: default_system_prompt(),
        }
    }
}

/// Job queue configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueueConfig {
    /// Attempts per job before it is marked failed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay in milliseconds, doubled on each further attempt
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Number of concurrent workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Idle poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Active jobs older than this are considered abandoned
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// Job database location; the platform data directory is used when absent
    #[serde(default)]
    pub database_path: Option<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            workers: default_workers(),
            poll_interval_ms: default_poll_interval_ms(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
            database_path: None,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_target_language() -> String {
    "fr".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_anthropic_timeout_secs() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_output_tokens() -> u32 {
    4096
}

fn default_true() -> bool {
    true
}

fn default_tier_concurrency() -> usize {
    1
}

fn default_batch_delay_ms() -> u64 {
    200
}

fn default_confidence() -> f32 {
    0.85
}

fn default_section_target_tokens() -> usize {
    1000
}

fn default_dna_concurrency() -> usize {
    8
}

fn default_boundary_window_chars() -> usize {
    50
}

fn default_token_cache_size() -> usize {
    10_000
}

fn default_script_ratios() -> HashMap<String, f64> {
    [
        ("en", 4.5),
        ("vi", 1.3),
        ("zh", 0.7),
        ("ja", 0.7),
        ("ko", 0.8),
        ("default", 4.0),
    ]
    .into_iter()
    .map(|(script, ratio)| (script.to_string(), ratio))
    .collect()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    2000
}

fn default_workers() -> usize {
    2
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_visibility_timeout_secs() -> u64 {
    600
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_lmstudio_endpoint() -> String {
    // LM Studio default server (OpenAI compatible) runs on port 1234 under /v1
    "http://localhost:1234/v1".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_lmstudio_model() -> String {
    // Placeholder; users should set to the loaded model name in LM Studio
    "local-model".to_string()
}

fn default_system_prompt() -> String {
    "You are a professional translator. Translate the following text from {source_language} to {target_language}. Maintain the original meaning and tone, and reply with the translation only.".to_string()
}

impl Config {
    /// Load a configuration file, writing the defaults first when it does not exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Config::default();
            config.save(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate languages
        crate::language_utils::validate_language_code(&self.target_language)?;
        if let Some(source) = &self.source_language {
            crate::language_utils::validate_language_code(source)?;
        }

        if let Some(pattern) = &self.chunking.heading_pattern {
            regex::Regex::new(pattern).with_context(|| format!("Invalid heading pattern: {}", pattern))?;
        }

        if self.chunking.dna_concurrency == 0 {
            return Err(anyhow!("chunking.dna_concurrency must be at least 1"));
        }

        for (script, ratio) in &self.chunking.script_ratios {
            if !ratio.is_finite() || *ratio <= 0.0 {
                return Err(anyhow!("Script ratio for '{}' must be a positive number", script));
            }
        }

        for (tier, settings) in self.chunking.tiers.iter() {
            settings
                .chunk_options()
                .validate()
                .with_context(|| format!("Invalid settings for tier '{}'", tier))?;

            if settings.concurrency == 0 {
                return Err(anyhow!("Tier '{}' needs a concurrency of at least 1", tier));
            }

            // Only providers a tier actually uses must be reachable
            let provider_config = self
                .translation
                .get_provider_config(&settings.provider)
                .ok_or_else(|| {
                    anyhow!(
                        "Tier '{}' uses provider '{}' which is not configured",
                        tier,
                        settings.provider
                    )
                })?;

            Url::parse(&provider_config.endpoint).with_context(|| {
                format!(
                    "Invalid endpoint for provider '{}': {}",
                    settings.provider, provider_config.endpoint
                )
            })?;

            if settings.provider.requires_api_key() && provider_config.api_key.is_empty() {
                return Err(anyhow!(
                    "Translation API key is required for {} provider (used by tier '{}')",
                    settings.provider.display_name(),
                    tier
                ));
            }
        }

        if self.queue.max_attempts == 0 {
            return Err(anyhow!("queue.max_attempts must be at least 1"));
        }

        if self.queue.workers == 0 {
            return Err(anyhow!("queue.workers must be at least 1"));
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: None,
            target_language: default_target_language(),
            chunking: ChunkingConfig::default(),
            translation: TranslationConfig::default(),
            queue: QueueConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
