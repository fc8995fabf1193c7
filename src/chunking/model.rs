/*!
 * Data types produced by the chunking engine.
 *
 * Chunk offsets are byte offsets into the source document, so
 * `&source[chunk.start_offset..chunk.end_offset] == chunk.content` always
 * holds. Overlapping chunks share a byte range; `ChunkingResult::reconstruct`
 * drops the shared part when stitching.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::ChunkingError;

/// Quality tier selecting chunk sizes, metadata and translation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Basic,
    Standard,
    Premium,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Basic, Tier::Standard, Tier::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Standard => "standard",
            Tier::Premium => "premium",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ChunkingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(Tier::Basic),
            "standard" => Ok(Tier::Standard),
            "premium" => Ok(Tier::Premium),
            other => Err(ChunkingError::InvalidTier(other.to_string())),
        }
    }
}

/// Fully resolved options for one chunking call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkOptions {
    pub max_tokens: usize,
    pub overlap: usize,
    pub preserve_structure: bool,
    pub generate_dna: bool,
}

impl ChunkOptions {
    /// Reject options that can never produce a valid chunking
    pub fn validate(&self) -> Result<(), ChunkingError> {
        if self.max_tokens == 0 {
            return Err(ChunkingError::Configuration(
                "max_tokens must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.max_tokens {
            return Err(ChunkingError::Configuration(format!(
                "overlap ({}) must be smaller than max_tokens ({})",
                self.overlap, self.max_tokens
            )));
        }
        Ok(())
    }

    /// Apply per-call overrides on top of tier defaults
    pub fn apply(mut self, overrides: &ChunkOverrides) -> Self {
        if let Some(max_tokens) = overrides.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(overlap) = overrides.overlap {
            self.overlap = overlap;
        }
        if let Some(preserve_structure) = overrides.preserve_structure {
            self.preserve_structure = preserve_structure;
        }
        if let Some(generate_dna) = overrides.generate_dna {
            self.generate_dna = generate_dna;
        }
        self
    }
}

/// Optional per-call changes to a tier's chunk options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlap: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_structure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_dna: Option<bool>,
}

impl ChunkOverrides {
    pub fn is_empty(&self) -> bool {
        self == &ChunkOverrides::default()
    }
}

/// Coarse writing style of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleCategory {
    Technical,
    Academic,
    Narrative,
    #[default]
    General,
}

impl fmt::Display for StyleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StyleCategory::Technical => "technical",
            StyleCategory::Academic => "academic",
            StyleCategory::Narrative => "narrative",
            StyleCategory::General => "general",
        };
        write!(f, "{}", name)
    }
}

/// Heuristic content metadata attached to a finished chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDna {
    pub language: String,
    pub style: StyleCategory,
    pub has_table: bool,
    pub has_figure: bool,
    pub has_code: bool,
    pub topics: Vec<String>,
    pub entities: Vec<String>,
    pub references: Vec<String>,
    /// 0 (trivial) to 10 (dense)
    pub complexity: u8,
    pub word_count: usize,
    pub sentence_count: usize,
    /// Share of positive sentiment words, 0.5 when none are found
    pub sentiment: f32,
}

impl Default for ChunkDna {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            style: StyleCategory::General,
            has_table: false,
            has_figure: false,
            has_code: false,
            topics: Vec::new(),
            entities: Vec::new(),
            references: Vec::new(),
            complexity: 0,
            word_count: 0,
            sentence_count: 0,
            sentiment: 0.5,
        }
    }
}

/// One token-bounded piece of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub section_index: usize,
    pub local_index: usize,
    pub content: String,
    pub token_count: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_chunk_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_chunk_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dna: Option<ChunkDna>,
}

impl Chunk {
    /// Create an unlinked chunk; the end offset follows from the content length
    pub fn new(
        section_index: usize,
        local_index: usize,
        content: String,
        token_count: usize,
        start_offset: usize,
    ) -> Self {
        let end_offset = start_offset + content.len();
        Self {
            id: Uuid::new_v4().to_string(),
            section_index,
            local_index,
            content,
            token_count,
            start_offset,
            end_offset,
            prev_chunk_id: None,
            next_chunk_id: None,
            dna: None,
        }
    }

    /// Document order of the chunk
    pub fn ordering_key(&self) -> (usize, usize) {
        (self.section_index, self.local_index)
    }
}

/// Set prev/next pointers along the slice order
pub fn link_chunks(chunks: &mut [Chunk]) {
    let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
    for (i, chunk) in chunks.iter_mut().enumerate() {
        chunk.prev_chunk_id = if i > 0 { Some(ids[i - 1].clone()) } else { None };
        chunk.next_chunk_id = ids.get(i + 1).cloned();
    }
}

/// Output of one chunking call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingResult {
    pub chunks: Vec<Chunk>,
    pub total_tokens: usize,
    pub strategy_used: Tier,
    pub processing_time_ms: u64,
}

impl ChunkingResult {
    pub fn empty(tier: Tier) -> Self {
        Self {
            chunks: Vec::new(),
            total_tokens: 0,
            strategy_used: tier,
            processing_time_ms: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Stitch the chunks back into text using their offsets.
    ///
    /// Overlapping bytes are emitted once; a gap between two chunks only ever
    /// held whitespace and becomes a single space.
    pub fn reconstruct(&self) -> String {
        let mut ordered: Vec<&Chunk> = self.chunks.iter().collect();
        ordered.sort_by_key(|c| (c.start_offset, c.ordering_key()));

        let mut out = String::new();
        let mut covered = 0usize;
        for chunk in ordered {
            if chunk.end_offset <= covered && !out.is_empty() {
                continue;
            }
            if chunk.start_offset >= covered || out.is_empty() {
                if chunk.start_offset > covered && !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&chunk.content);
            } else {
                out.push_str(&chunk.content[covered - chunk.start_offset..]);
            }
            covered = chunk.end_offset;
        }
        out
    }
}

/// Size estimate and tier recommendation for a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub estimated_tokens: usize,
    pub recommended_tier: Tier,
    /// Length in characters
    pub document_length: usize,
}
