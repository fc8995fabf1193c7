/*!
 * Tests for the chunking engine: sections, splitter and service
 */

use doctran::app_config::ChunkingConfig;
use doctran::chunking::sections::detect_sections;
use doctran::chunking::service::analyze_document;
use doctran::chunking::splitter::{ChunkSplitter, SplitterConfig};
use doctran::chunking::{ChunkOverrides, ChunkingService, Tier, TokenCounter};
use doctran::errors::ChunkingError;

use crate::common::{document_of_length, init_logging, normalize_whitespace, paragraphs};

fn service() -> ChunkingService {
    ChunkingService::new(&ChunkingConfig::default()).expect("default chunking config is valid")
}

#[tokio::test]
async fn test_chunkDocument_emptyInput_shouldReturnNoChunks() {
    let result = service().chunk_document("", Tier::Basic, None).await.unwrap();

    assert!(result.is_empty());
    assert_eq!(result.total_tokens, 0);
    assert_eq!(result.strategy_used, Tier::Basic);
}

#[tokio::test]
async fn test_chunkDocument_whitespaceOnly_shouldReturnNoChunks() {
    let result = service()
        .chunk_document(" \n\n\t  \n ", Tier::Premium, None)
        .await
        .unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_chunkDocument_shortEnglishOnBasic_shouldYieldOneChunkWithoutDna() {
    let text = "The quick brown fox jumps over the lazy dog while the farmer watches from the old wooden porch.";
    assert!(text.len() >= 90 && text.len() <= 110);

    let result = service().chunk_document(text, Tier::Basic, None).await.unwrap();

    assert_eq!(result.len(), 1);
    let chunk = &result.chunks[0];
    assert_eq!(chunk.content, text);
    assert!(chunk.dna.is_none());
    assert!(chunk.prev_chunk_id.is_none());
    assert!(chunk.next_chunk_id.is_none());
}

#[tokio::test]
async fn test_chunkDocument_longDocumentOnPremium_shouldCarryDnaAndLinks() {
    init_logging();
    let text = document_of_length(20_000);

    let result = service().chunk_document(&text, Tier::Premium, None).await.unwrap();

    assert!(result.len() > 1, "expected several chunks, got {}", result.len());
    for chunk in &result.chunks {
        let dna = chunk.dna.as_ref().expect("premium chunks carry DNA");
        assert_eq!(dna.language, "en");
        assert!(chunk.token_count <= 1500);
    }

    let chunks = &result.chunks;
    assert!(chunks[0].prev_chunk_id.is_none());
    assert!(chunks.last().unwrap().next_chunk_id.is_none());
    for pair in chunks.windows(2) {
        assert_eq!(pair[0].next_chunk_id.as_deref(), Some(pair[1].id.as_str()));
        assert_eq!(pair[1].prev_chunk_id.as_deref(), Some(pair[0].id.as_str()));
    }
}

#[tokio::test]
async fn test_chunkDocument_overlapEqualToMax_shouldBeConfigurationError() {
    let overrides = ChunkOverrides {
        max_tokens: Some(200),
        overlap: Some(200),
        ..Default::default()
    };

    let result = service().chunk_document("Some text.", Tier::Standard, Some(&overrides)).await;
    assert!(matches!(result, Err(ChunkingError::Configuration(_))));
}

#[tokio::test]
async fn test_chunkDocument_zeroMaxTokens_shouldFailEvenForEmptyInput() {
    let overrides = ChunkOverrides {
        max_tokens: Some(0),
        overlap: Some(0),
        ..Default::default()
    };

    let result = service().chunk_document("", Tier::Basic, Some(&overrides)).await;
    assert!(matches!(result, Err(ChunkingError::Configuration(_))));
}

#[tokio::test]
async fn test_chunkDocument_everyTier_shouldReconstructSource() {
    let text = paragraphs(60, 5);
    let service = service();

    for tier in Tier::ALL {
        let overrides = ChunkOverrides {
            max_tokens: Some(120),
            overlap: Some(20),
            ..Default::default()
        };
        let result = service.chunk_document(&text, tier, Some(&overrides)).await.unwrap();

        assert!(result.len() > 1);
        assert_eq!(
            normalize_whitespace(&result.reconstruct()),
            normalize_whitespace(&text),
            "tier {} lost or duplicated text",
            tier
        );
        for chunk in &result.chunks {
            assert_eq!(&text[chunk.start_offset..chunk.end_offset], chunk.content);
        }
    }
}

#[tokio::test]
async fn test_chunkDocument_exactCounter_shouldRespectTokenBudget() {
    let text = paragraphs(40, 6);
    let overrides = ChunkOverrides {
        max_tokens: Some(80),
        overlap: Some(10),
        ..Default::default()
    };

    let result = service().chunk_document(&text, Tier::Standard, Some(&overrides)).await.unwrap();

    let counter = TokenCounter::exact(64);
    for chunk in &result.chunks {
        assert!(chunk.token_count <= 80, "chunk has {} tokens", chunk.token_count);
        assert_eq!(chunk.token_count, counter.count(&chunk.content));
    }
    assert_eq!(result.total_tokens, result.chunks.iter().map(|c| c.token_count).sum::<usize>());
}

#[tokio::test]
async fn test_chunkDocument_englishThenChinese_shouldKeepStandardBudget() {
    let text = format!(
        "{}{}",
        "The committee reviewed the report. ".repeat(400),
        "委员会审查了季度报告。".repeat(300)
    );

    let result = service().chunk_document(&text, Tier::Standard, None).await.unwrap();

    let budget = ChunkingConfig::default().tiers.get(Tier::Standard).max_tokens;
    assert!(result.chunks.len() > 1);
    for chunk in &result.chunks {
        assert!(chunk.token_count <= budget, "chunk has {} tokens", chunk.token_count);
    }
    assert_eq!(result.chunks.last().unwrap().end_offset, text.len());
}

#[tokio::test]
async fn test_chunkDocument_shouldBeDeterministic() {
    let text = paragraphs(30, 4);
    let service = service();

    let first = service.chunk_document(&text, Tier::Standard, None).await.unwrap();
    let second = service.chunk_document(&text, Tier::Standard, None).await.unwrap();

    let spans = |r: &doctran::ChunkingResult| {
        r.chunks
            .iter()
            .map(|c| (c.section_index, c.local_index, c.start_offset, c.end_offset))
            .collect::<Vec<_>>()
    };
    assert_eq!(spans(&first), spans(&second));
}

#[test]
fn test_split_oneHugeWord_shouldTerminateWithinBudget() {
    let counter = TokenCounter::exact(256);
    let splitter = ChunkSplitter::new(&counter, SplitterConfig::new(64, 8));
    let text = "antidisestablishmentarianism".repeat(400);

    let chunks = splitter.split(&text, 0, 0).unwrap();

    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| c.token_count <= 64));
    assert_eq!(chunks.last().unwrap().end_offset, text.len());
}

#[test]
fn test_split_repetitiveText_shouldTerminate() {
    let counter = TokenCounter::exact(256);
    let splitter = ChunkSplitter::new(&counter, SplitterConfig::new(50, 45));
    let text = "la ".repeat(3_000);

    let chunks = splitter.split(&text, 0, 0).unwrap();

    assert!(chunks.len() > 1);
    for pair in chunks.windows(2) {
        assert!(pair[1].end_offset > pair[0].end_offset, "every chunk must make progress");
    }
}

#[test]
fn test_split_allWhitespace_shouldYieldNothing() {
    let counter = TokenCounter::exact(16);
    let splitter = ChunkSplitter::new(&counter, SplitterConfig::new(10, 2));
    assert!(splitter.split(&" \n".repeat(500), 0, 0).unwrap().is_empty());
}

#[test]
fn test_detectSections_shouldPartitionInput() {
    let text = paragraphs(25, 3);
    let counter = TokenCounter::approximate(64);

    let sections = detect_sections(&text, 100, None, &counter);

    assert!(sections.len() > 1);
    let joined: String = sections.iter().map(|s| s.text).collect();
    assert_eq!(joined, text);
    for pair in sections.windows(2) {
        assert_eq!(pair[0].end(), pair[1].start);
    }
}

#[test]
fn test_analyzeDocument_shouldBeIdempotentAndPickTiers() {
    let short = "a".repeat(400);
    let medium = "a".repeat(8_000);
    let long = "a".repeat(40_000);

    assert_eq!(analyze_document(&short), analyze_document(&short));
    assert_eq!(analyze_document(&short).recommended_tier, Tier::Basic);
    assert_eq!(analyze_document(&medium).recommended_tier, Tier::Standard);
    assert_eq!(analyze_document(&long).recommended_tier, Tier::Premium);
    assert_eq!(analyze_document(&short).estimated_tokens, 100);
}
