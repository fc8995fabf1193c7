/*!
 * Chunking strategies.
 *
 * A strategy turns a document into ordered, linked chunks for a set of
 * resolved options. Both built-in strategies detect sections first and then
 * split each section; they differ in how tokens are counted and how the
 * chars-per-token ratio is chosen.
 */

use std::collections::HashMap;

use regex::Regex;

use super::dna::detect_language;
use super::model::{link_chunks, Chunk, ChunkOptions};
use super::sections::{detect_sections, DEFAULT_HEADING_PATTERN};
use super::splitter::{ChunkSplitter, SplitterConfig};
use super::tokens::TokenCounter;
use crate::errors::ChunkingError;

/// Turns a document into ordered chunks
pub trait ChunkingStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Counter used for chunk token counts
    fn counter(&self) -> &TokenCounter;

    /// Chunk `text`; options are already validated
    fn chunk(&self, text: &str, options: &ChunkOptions) -> Result<Vec<Chunk>, ChunkingError>;
}

/// Settings shared by the built-in strategies
#[derive(Debug, Clone)]
pub struct StrategySettings {
    pub section_target_tokens: usize,
    pub boundary_window_chars: usize,
    /// Heading regex; the built-in pattern is used when absent
    pub heading_pattern: Option<Regex>,
    /// Chars per token keyed by language code, with a "default" entry
    pub script_ratios: Option<HashMap<String, f64>>,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            section_target_tokens: 1000,
            boundary_window_chars: 50,
            heading_pattern: None,
            script_ratios: None,
        }
    }
}

fn chunk_by_sections(
    text: &str,
    options: &ChunkOptions,
    counter: &TokenCounter,
    settings: &StrategySettings,
    use_headings: bool,
    ratio_for: impl Fn(&str) -> Option<f64>,
) -> Result<Vec<Chunk>, ChunkingError> {
    let heading = if use_headings && options.preserve_structure {
        Some(settings.heading_pattern.as_ref().unwrap_or(&*DEFAULT_HEADING_PATTERN))
    } else {
        None
    };

    // A section always has room for at least one full chunk
    let target = settings.section_target_tokens.max(options.max_tokens);
    let sections = detect_sections(text, target, heading, counter);

    let mut chunks = Vec::new();
    for section in sections {
        let config = SplitterConfig {
            max_tokens: options.max_tokens,
            overlap_tokens: options.overlap,
            boundary_window_chars: settings.boundary_window_chars,
            chars_per_token: ratio_for(section.text),
        };
        let splitter = ChunkSplitter::new(counter, config);
        chunks.extend(splitter.split(section.text, section.index, section.start)?);
    }

    link_chunks(&mut chunks);
    Ok(chunks)
}

/// Approximate token counts, no heading breaks, measured ratios
pub struct SimpleStrategy {
    counter: TokenCounter,
    settings: StrategySettings,
}

impl SimpleStrategy {
    pub fn new(cache_capacity: usize, settings: StrategySettings) -> Self {
        Self {
            counter: TokenCounter::approximate(cache_capacity),
            settings,
        }
    }
}

impl ChunkingStrategy for SimpleStrategy {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    fn chunk(&self, text: &str, options: &ChunkOptions) -> Result<Vec<Chunk>, ChunkingError> {
        chunk_by_sections(text, options, &self.counter, &self.settings, false, |_| None)
    }
}

/// Exact token counts, heading-aware sections, optional script ratios
pub struct StructuredStrategy {
    counter: TokenCounter,
    settings: StrategySettings,
}

impl StructuredStrategy {
    pub fn new(counter: TokenCounter, settings: StrategySettings) -> Self {
        Self { counter, settings }
    }

    fn ratio_for(&self, section: &str) -> Option<f64> {
        let ratios = self.settings.script_ratios.as_ref()?;
        ratios
            .get(detect_language(section))
            .or_else(|| ratios.get("default"))
            .copied()
    }
}

impl ChunkingStrategy for StructuredStrategy {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    fn chunk(&self, text: &str, options: &ChunkOptions) -> Result<Vec<Chunk>, ChunkingError> {
        chunk_by_sections(text, options, &self.counter, &self.settings, true, |section| {
            self.ratio_for(section)
        })
    }
}
