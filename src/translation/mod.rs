/*!
 * Tiered document translation.
 *
 * - `backend`: the per-tier model service abstraction and its registry
 * - `prompts`: system prompt construction
 * - `orchestrator`: batch-paced chunk translation and reassembly
 */

pub use self::backend::{BackendRegistry, BackendRequest, BackendResponse, ProviderBackend, TranslationBackend};
pub use self::orchestrator::{
    reassemble, DocumentTranslation, TranslatedChunk, TranslationMetadata, TranslationOrchestrator,
    TranslationRequest,
};
pub use self::prompts::PromptTemplate;

pub mod backend;
pub mod orchestrator;
pub mod prompts;
