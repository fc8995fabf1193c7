/*!
 * Document translation: chunk, translate in paced batches, reassemble.
 *
 * Chunks are translated in batches of the tier's concurrency. A batch is
 * joined completely before the pacing delay and the next batch starts, so
 * at most `concurrency` backend calls are ever in flight. Any chunk failure
 * fails the whole document.
 */

use anyhow::Result;
use futures::future::join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::backend::{BackendRegistry, BackendRequest, TranslationBackend};
use super::prompts::PromptTemplate;
use crate::app_config::{Config, TierTable};
use crate::chunking::{Chunk, ChunkOverrides, ChunkingService, Tier};
use crate::errors::TranslationError;
use crate::language_utils;

/// What to translate into, and how
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub target_language: String,
    pub tier: Tier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
    #[serde(default = "default_preserve_formatting")]
    pub preserve_formatting: bool,
    /// Per-document changes to the tier's chunk options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_options: Option<ChunkOverrides>,
}

fn default_preserve_formatting() -> bool {
    true
}

impl TranslationRequest {
    pub fn new(target_language: impl Into<String>, tier: Tier) -> Self {
        Self {
            target_language: target_language.into(),
            tier,
            source_language: None,
            preserve_formatting: true,
            chunk_options: None,
        }
    }
}

/// One translated chunk with its source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedChunk {
    pub original_chunk: Chunk,
    pub translated_content: String,
    pub model: String,
    pub tokens_used: u64,
    pub confidence: f32,
}

impl TranslatedChunk {
    pub fn ordering_key(&self) -> (usize, usize) {
        self.original_chunk.ordering_key()
    }
}

/// Summary of one document translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationMetadata {
    pub total_chunks: usize,
    /// Source tokens of the chunked document; per-chunk `tokens_used` holds backend usage
    pub total_tokens: u64,
    pub processing_time_ms: u64,
    pub tier: Tier,
    pub target_language: String,
}

/// Full result of a document translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTranslation {
    pub translated_text: String,
    pub chunks: Vec<TranslatedChunk>,
    pub metadata: TranslationMetadata,
}

/// Sort by document order and join with blank lines
pub fn reassemble(chunks: &mut [TranslatedChunk]) -> String {
    chunks.sort_by_key(|c| c.ordering_key());
    chunks
        .iter()
        .map(|c| c.translated_content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Drives chunking and per-tier backends for whole documents
pub struct TranslationOrchestrator {
    chunking: Arc<ChunkingService>,
    backends: BackendRegistry,
    tiers: TierTable,
    prompt: PromptTemplate,
}

impl TranslationOrchestrator {
    pub fn new(chunking: Arc<ChunkingService>, backends: BackendRegistry, system_prompt: &str) -> Self {
        let tiers = chunking.tiers().clone();
        Self {
            chunking,
            backends,
            tiers,
            prompt: PromptTemplate::new(system_prompt),
        }
    }

    /// Chunking service and HTTP backends from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let chunking = Arc::new(ChunkingService::new(&config.chunking)?);
        let backends = BackendRegistry::from_config(config)?;
        Ok(Self::new(chunking, backends, &config.translation.system_prompt))
    }

    pub fn chunking(&self) -> &ChunkingService {
        &self.chunking
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    /// Translate a whole document
    pub async fn translate_document(
        &self,
        text: &str,
        request: &TranslationRequest,
    ) -> Result<DocumentTranslation, TranslationError> {
        self.translate_document_with_progress(text, request, |_, _| {}).await
    }

    /// Translate a whole document, reporting `(completed_chunks, total_chunks)`.
    ///
    /// The callback fires once with zero completed chunks right after
    /// chunking, then after every batch.
    pub async fn translate_document_with_progress<F>(
        &self,
        text: &str,
        request: &TranslationRequest,
        progress: F,
    ) -> Result<DocumentTranslation, TranslationError>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let started = Instant::now();

        language_utils::validate_language_code(&request.target_language)
            .map_err(|_| TranslationError::InvalidLanguage(request.target_language.clone()))?;
        if let Some(source) = &request.source_language {
            if language_utils::language_codes_match(source, &request.target_language) {
                warn!("Source and target language are both '{}'", request.target_language);
            }
        }

        let backend = self
            .backends
            .get(request.tier)
            .ok_or_else(|| TranslationError::MissingBackend(request.tier.to_string()))?;
        let settings = self.tiers.get(request.tier);

        let chunking = self
            .chunking
            .chunk_document(text, request.tier, request.chunk_options.as_ref())
            .await?;
        let total = chunking.chunks.len();
        progress(0, total);

        let batch_size = settings.concurrency.max(1);
        let batch_delay = Duration::from_millis(settings.batch_delay_ms);
        let mut translated = Vec::with_capacity(total);

        for (batch_number, batch) in chunking.chunks.chunks(batch_size).enumerate() {
            let base = batch_number * batch_size;
            debug!(
                "Translating batch {} ({} chunks) with {}",
                batch_number + 1,
                batch.len(),
                backend.model()
            );

            let results = join_all(batch.iter().enumerate().map(|(offset, chunk)| {
                self.translate_chunk(backend.as_ref(), chunk, base + offset, request, settings.confidence)
            }))
            .await;

            for result in results {
                translated.push(result?);
            }

            let completed = translated.len();
            progress(completed, total);

            if completed < total && !batch_delay.is_zero() {
                tokio::time::sleep(batch_delay).await;
            }
        }

        let translated_text = reassemble(&mut translated);
        let total_tokens = chunking.total_tokens as u64;
        let processing_time_ms = started.elapsed().as_millis() as u64;

        info!(
            "Translated {} chunks into {} ({} tier, {} source tokens) in {}ms",
            total, request.target_language, request.tier, total_tokens, processing_time_ms
        );

        Ok(DocumentTranslation {
            translated_text,
            chunks: translated,
            metadata: TranslationMetadata {
                total_chunks: total,
                total_tokens,
                processing_time_ms,
                tier: request.tier,
                target_language: request.target_language.clone(),
            },
        })
    }

    async fn translate_chunk(
        &self,
        backend: &dyn TranslationBackend,
        chunk: &Chunk,
        chunk_index: usize,
        request: &TranslationRequest,
        confidence: f32,
    ) -> Result<TranslatedChunk, TranslationError> {
        let system_prompt = self.prompt.for_chunk(
            request.source_language.as_deref(),
            &request.target_language,
            chunk.dna.as_ref(),
            request.preserve_formatting,
        );

        let response = backend
            .translate(&BackendRequest {
                system_prompt,
                text: chunk.content.clone(),
            })
            .await
            .map_err(|source| TranslationError::Backend { chunk_index, source })?;

        if response.text.trim().is_empty() && !chunk.content.trim().is_empty() {
            return Err(TranslationError::EmptyTranslation { chunk_index });
        }

        Ok(TranslatedChunk {
            original_chunk: chunk.clone(),
            translated_content: response.text,
            model: backend.model().to_string(),
            tokens_used: response.tokens_used.unwrap_or(chunk.token_count as u64),
            confidence,
        })
    }
}
