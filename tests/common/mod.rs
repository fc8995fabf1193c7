/*!
 * Common test utilities for the doctran test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use doctran::app_config::{Config, QueueConfig};
use doctran::chunking::{ChunkingService, Tier};
use doctran::database::Repository;
use doctran::providers::mock::MockProvider;
use doctran::queue::{JobQueue, PlainTextExtractor, WorkerPool};
use doctran::translation::{BackendRegistry, ProviderBackend, TranslationOrchestrator};

/// Route test logs through env_logger; repeated calls are ignored
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

const SENTENCES: &[&str] = &[
    "The committee reviewed the quarterly report in considerable detail.",
    "Several members raised questions about the projected maintenance budget.",
    "Engineering responded that the replacement schedule had already been approved.",
    "Nobody expected the harbour bridge to need repairs so soon after opening.",
    "Meanwhile the library extended its opening hours through the winter months.",
    "Volunteers organised reading groups for children and retired teachers alike.",
];

/// English prose split into blank-line separated paragraphs
pub fn paragraphs(count: usize, sentences_per_paragraph: usize) -> String {
    (0..count)
        .map(|p| {
            (0..sentences_per_paragraph)
                .map(|s| SENTENCES[(p + s) % SENTENCES.len()])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prose of at least `chars` characters
pub fn document_of_length(chars: usize) -> String {
    let mut paragraphs_needed = 1;
    loop {
        let text = paragraphs(paragraphs_needed, 4);
        if text.len() >= chars {
            return text;
        }
        paragraphs_needed += 1;
    }
}

/// Collapse whitespace runs for reconstruction comparisons
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Default configuration without pacing delays and with millisecond backoff
pub fn test_config() -> Config {
    let mut config = Config::default();
    for tier in Tier::ALL {
        config.chunking.tiers.get_mut(tier).batch_delay_ms = 0;
    }
    config.queue = QueueConfig {
        backoff_base_ms: 5,
        poll_interval_ms: 5,
        workers: 2,
        ..QueueConfig::default()
    };
    config
}

/// The same mock behind every tier
pub fn mock_registry(provider: &MockProvider) -> BackendRegistry {
    Tier::ALL.iter().fold(BackendRegistry::new(), |registry, tier| {
        registry.with_backend(
            *tier,
            Arc::new(ProviderBackend::new(provider.clone(), format!("mock-{}", tier))),
        )
    })
}

pub fn mock_orchestrator(config: &Config, provider: &MockProvider) -> Arc<TranslationOrchestrator> {
    let chunking = Arc::new(ChunkingService::new(&config.chunking).expect("valid chunking config"));
    Arc::new(TranslationOrchestrator::new(
        chunking,
        mock_registry(provider),
        &config.translation.system_prompt,
    ))
}

pub fn memory_queue(config: &Config) -> Arc<JobQueue> {
    let repo = Repository::new_in_memory().expect("in-memory job store");
    Arc::new(JobQueue::new(repo, config.chunking.tiers.clone(), config.queue.clone()))
}

pub fn mock_pool(config: &Config, queue: Arc<JobQueue>, provider: &MockProvider) -> WorkerPool {
    WorkerPool::new(
        queue,
        mock_orchestrator(config, provider),
        Arc::new(PlainTextExtractor),
        &config.queue,
    )
}
