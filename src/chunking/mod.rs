/*!
 * Document chunking engine.
 *
 * Documents are cut into paragraph-aligned sections, each section is split
 * into token-bounded overlapping chunks, and premium chunks get heuristic
 * content metadata ("DNA").
 */

pub mod dna;
pub mod model;
pub mod sections;
pub mod service;
pub mod splitter;
pub mod strategy;
pub mod tokens;

pub use dna::DnaExtractor;
pub use model::{
    Chunk, ChunkDna, ChunkOptions, ChunkOverrides, ChunkingResult, DocumentAnalysis, StyleCategory, Tier,
};
pub use service::ChunkingService;
pub use strategy::{ChunkingStrategy, SimpleStrategy, StrategySettings, StructuredStrategy};
pub use tokens::{count_tokens, TokenCounter};
