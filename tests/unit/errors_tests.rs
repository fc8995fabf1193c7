/*!
 * Tests for error messages and retry classification
 */

use doctran::errors::{AppError, ChunkingError, ExtractionError, ProviderError, QueueError, TranslationError};

#[test]
fn test_providerError_display_shouldIncludeStatusAndMessage() {
    let error = ProviderError::ApiError {
        status_code: 429,
        message: "slow down".to_string(),
    };
    assert_eq!(error.to_string(), "API responded with error: 429 - slow down");
}

#[test]
fn test_translationError_backend_shouldNameChunkAndCause() {
    let error = TranslationError::Backend {
        chunk_index: 7,
        source: ProviderError::ConnectionError("reset by peer".to_string()),
    };

    let message = error.to_string();
    assert!(message.contains("chunk 7"));
    assert!(message.contains("reset by peer"));
    assert!(std::error::Error::source(&error).is_some());
}

#[test]
fn test_chunkingError_iterationBound_shouldReportLimit() {
    let error = ChunkingError::IterationBoundExceeded {
        section_index: 2,
        limit: 40,
    };
    assert_eq!(
        error.to_string(),
        "Chunk splitter exceeded its iteration bound of 40 in section 2"
    );
}

#[test]
fn test_appError_fromConversions_shouldWrapSubsystems() {
    let chunking: AppError = ChunkingError::Configuration("overlap too large".to_string()).into();
    assert!(matches!(chunking, AppError::Chunking(_)));

    let extraction: AppError = ExtractionError::Empty.into();
    assert!(matches!(extraction, AppError::Extraction(ExtractionError::Empty)));

    let io: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(io, AppError::File(_)));

    let other: AppError = anyhow::anyhow!("boom").into();
    assert_eq!(other.to_string(), "Unknown error: boom");
}

#[test]
fn test_queueError_fromAnyhow_shouldKeepContextChain() {
    let error: QueueError = anyhow::anyhow!("disk full").context("Failed to insert job").into();
    match error {
        QueueError::Storage(message) => {
            assert!(message.contains("Failed to insert job"));
            assert!(message.contains("disk full"));
        }
        other => panic!("expected storage error, got {:?}", other),
    }
}

#[test]
fn test_isRetryable_transientFailures_shouldRetry() {
    let retryable = [
        AppError::Provider(ProviderError::RateLimitExceeded("quota".to_string())),
        AppError::Translation(TranslationError::EmptyTranslation { chunk_index: 0 }),
        AppError::Extraction(ExtractionError::Io("interrupted".to_string())),
        AppError::Queue(QueueError::Storage("locked".to_string())),
        AppError::File("temporarily unavailable".to_string()),
    ];
    for error in &retryable {
        assert!(error.is_retryable(), "{} should be retryable", error);
    }
}

#[test]
fn test_isRetryable_permanentFailures_shouldNotRetry() {
    let permanent = [
        AppError::Extraction(ExtractionError::Empty),
        AppError::Chunking(ChunkingError::Configuration("max_tokens must be positive".to_string())),
        AppError::Translation(TranslationError::MissingBackend("premium".to_string())),
        AppError::Translation(TranslationError::InvalidLanguage("xx".to_string())),
        AppError::Queue(QueueError::NotFound("job-1".to_string())),
    ];
    for error in &permanent {
        assert!(!error.is_retryable(), "{} should not be retryable", error);
    }
}
