/*!
 * # doctran - tiered document translation
 *
 * A Rust library for translating long documents with LLM backends.
 *
 * ## Features
 *
 * - Token-bounded, overlapping, paragraph-aware chunking with a guaranteed
 *   end to every split
 * - Heuristic chunk metadata ("DNA"): language, style, tables, code,
 *   topics, entities, references, complexity
 * - Three quality tiers (basic, standard, premium), each with its own chunk
 *   sizes, pacing and backend:
 *   - Ollama (local LLM)
 *   - OpenAI API and OpenAI-compatible servers such as LM Studio
 *   - Anthropic API
 * - A persistent SQLite job queue with retries, exponential backoff,
 *   monotonic progress and reclaim of abandoned jobs
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * - `app_config`: Configuration management
 * - `chunking`: Sections, splitter, token counting, DNA and tier strategies
 * - `translation`: Backends, prompts and the batch-paced orchestrator
 * - `providers`: Client implementations for LLM providers, plus a mock
 * - `database`: SQLite job store
 * - `queue`: Job submission, text extraction and workers
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod chunking;
pub mod database;
pub mod errors;
pub mod language_utils;
pub mod providers;
pub mod queue;
pub mod translation;

pub use app_config::Config;
pub use chunking::{Chunk, ChunkDna, ChunkingResult, ChunkingService, Tier};
pub use errors::{AppError, ChunkingError, ExtractionError, ProviderError, QueueError, TranslationError};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use queue::{JobQueue, JobSubmission, Worker, WorkerPool};
pub use translation::{DocumentTranslation, TranslationOrchestrator, TranslationRequest};
