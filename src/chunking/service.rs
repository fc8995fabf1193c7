/*!
 * Chunking service: tier resolution, strategy dispatch and DNA attachment.
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use regex::Regex;

use super::dna::DnaExtractor;
use super::model::{link_chunks, ChunkOptions, ChunkOverrides, ChunkingResult, DocumentAnalysis, Tier};
use super::strategy::{ChunkingStrategy, SimpleStrategy, StrategySettings, StructuredStrategy};
use super::tokens::{approximate_tokens, TokenCounter};
use crate::app_config::{ChunkingConfig, TierTable};
use crate::errors::ChunkingError;

/// Documents estimated below this many tokens are recommended the basic tier
const BASIC_TIER_LIMIT: usize = 1000;

/// Documents estimated below this many tokens are recommended the standard tier
const STANDARD_TIER_LIMIT: usize = 5000;

/// Entry point of the chunking engine
pub struct ChunkingService {
    strategies: HashMap<Tier, Arc<dyn ChunkingStrategy>>,
    tiers: TierTable,
    dna: DnaExtractor,
}

impl ChunkingService {
    /// Build the default strategy map from configuration
    pub fn new(config: &ChunkingConfig) -> Result<Self, ChunkingError> {
        let heading_pattern = config
            .heading_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| ChunkingError::Configuration(format!("Invalid heading pattern: {}", e)))?;

        let settings = StrategySettings {
            section_target_tokens: config.section_target_tokens,
            boundary_window_chars: config.boundary_window_chars,
            heading_pattern,
            script_ratios: config.script_aware_ratios.then(|| config.script_ratios.clone()),
        };

        let simple: Arc<dyn ChunkingStrategy> =
            Arc::new(SimpleStrategy::new(config.token_cache_size, settings.clone()));
        let structured: Arc<dyn ChunkingStrategy> =
            Arc::new(StructuredStrategy::new(TokenCounter::exact(config.token_cache_size), settings));

        let mut strategies = HashMap::new();
        strategies.insert(Tier::Basic, simple);
        strategies.insert(Tier::Standard, Arc::clone(&structured));
        strategies.insert(Tier::Premium, structured);

        Ok(Self {
            strategies,
            tiers: config.tiers.clone(),
            dna: DnaExtractor::new(config.dna_concurrency),
        })
    }

    /// Replace the strategy used for one tier
    pub fn with_strategy(mut self, tier: Tier, strategy: Arc<dyn ChunkingStrategy>) -> Self {
        self.strategies.insert(tier, strategy);
        self
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    /// Tier defaults with overrides applied, validated
    pub fn resolve_options(&self, tier: Tier, overrides: Option<&ChunkOverrides>) -> Result<ChunkOptions, ChunkingError> {
        let mut options = self.tiers.get(tier).chunk_options();
        if let Some(overrides) = overrides {
            options = options.apply(overrides);
        }
        options.validate()?;
        Ok(options)
    }

    /// Split a document into ordered, linked chunks for `tier`
    pub async fn chunk_document(
        &self,
        text: &str,
        tier: Tier,
        overrides: Option<&ChunkOverrides>,
    ) -> Result<ChunkingResult, ChunkingError> {
        let started = Instant::now();
        let options = self.resolve_options(tier, overrides)?;

        if text.trim().is_empty() {
            debug!("Empty document, nothing to chunk");
            return Ok(ChunkingResult::empty(tier));
        }

        let strategy = self
            .strategies
            .get(&tier)
            .ok_or_else(|| ChunkingError::InvalidTier(tier.to_string()))?;

        let mut chunks = strategy.chunk(text, &options)?;
        link_chunks(&mut chunks);

        if options.generate_dna {
            self.dna.extract_batch(&mut chunks).await;
        }

        let total_tokens = chunks.iter().map(|c| c.token_count).sum();
        let processing_time_ms = started.elapsed().as_millis() as u64;

        info!(
            "Chunked {} chars into {} chunks ({} tokens) with the {} strategy for tier {} in {}ms",
            text.len(),
            chunks.len(),
            total_tokens,
            strategy.name(),
            tier,
            processing_time_ms
        );

        Ok(ChunkingResult {
            chunks,
            total_tokens,
            strategy_used: tier,
            processing_time_ms,
        })
    }

    /// Estimate size and recommend a tier
    pub fn analyze_document(&self, text: &str) -> DocumentAnalysis {
        analyze_document(text)
    }
}

/// `ceil(chars / 4)` estimate with the tier thresholds
pub fn analyze_document(text: &str) -> DocumentAnalysis {
    let estimated_tokens = approximate_tokens(text);
    let recommended_tier = if estimated_tokens < BASIC_TIER_LIMIT {
        Tier::Basic
    } else if estimated_tokens < STANDARD_TIER_LIMIT {
        Tier::Standard
    } else {
        Tier::Premium
    };

    DocumentAnalysis {
        estimated_tokens,
        recommended_tier,
        document_length: text.chars().count(),
    }
}
