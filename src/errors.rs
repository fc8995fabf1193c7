/*!
 * Error types for the doctran library.
 *
 * Each subsystem gets its own error enum built with thiserror; `AppError`
 * wraps all of them for the worker and the CLI. Application glue (database
 * access, configuration loading) uses anyhow with context instead.
 */

use thiserror::Error;

/// Errors that can occur when talking to a translation provider API
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

/// Errors raised while splitting a document into chunks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkingError {
    /// Options that can never produce a valid chunking
    #[error("Invalid chunking configuration: {0}")]
    Configuration(String),

    /// Tier name that does not map to a strategy
    #[error("Invalid tier: {0}")]
    InvalidTier(String),

    /// The splitter ran past its computed iteration budget.
    /// This is an internal invariant violation, never an input problem.
    #[error("Chunk splitter exceeded its iteration bound of {limit} in section {section_index}")]
    IterationBoundExceeded {
        /// Section being split
        section_index: usize,
        /// Iteration budget that was exhausted
        limit: usize,
    },
}

/// Errors from the text extraction collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The input format cannot be turned into plain text here
    #[error("Unsupported input: {0}")]
    Unsupported(String),

    /// Reading the input failed
    #[error("Failed to read input: {0}")]
    Io(String),

    /// Extraction succeeded but produced no text
    #[error("No text content to translate")]
    Empty,
}

/// Errors that can occur while translating a document
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Chunking the document failed
    #[error("Chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    /// A backend failed on one chunk; the whole document fails with it
    #[error("Backend failed on chunk {chunk_index}: {source}")]
    Backend {
        /// Position of the chunk in document order
        chunk_index: usize,
        /// Underlying provider failure
        #[source]
        source: ProviderError,
    },

    /// The backend answered with nothing for a non-empty chunk
    #[error("Backend returned an empty translation for chunk {chunk_index}")]
    EmptyTranslation {
        /// Position of the chunk in document order
        chunk_index: usize,
    },

    /// No backend is registered for the requested tier
    #[error("No translation backend registered for tier '{0}'")]
    MissingBackend(String),

    /// The target language could not be resolved
    #[error("Invalid language: {0}")]
    InvalidLanguage(String),
}

/// Errors surfaced by the job queue
#[derive(Error, Debug)]
pub enum QueueError {
    /// The submission was rejected before a job was created
    #[error("Invalid job configuration: {0}")]
    Configuration(String),

    /// No job with this id exists
    #[error("Job not found: {0}")]
    NotFound(String),

    /// The job store failed
    #[error("Job store error: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for QueueError {
    fn from(error: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", error))
    }
}

impl From<ChunkingError> for QueueError {
    fn from(error: ChunkingError) -> Self {
        Self::Configuration(error.to_string())
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from chunking
    #[error("Chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    /// Error from text extraction
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Error from the job queue
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AppError {
    /// Whether running the same job again could succeed.
    ///
    /// Backend and I/O failures are transient; bad input, bad configuration
    /// and splitter invariant violations fail identically on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(_) | Self::Queue(QueueError::Storage(_)) | Self::File(_) => true,
            Self::Extraction(ExtractionError::Io(_)) => true,
            Self::Translation(TranslationError::Backend { .. })
            | Self::Translation(TranslationError::EmptyTranslation { .. }) => true,
            Self::Unknown(_) => true,
            _ => false,
        }
    }
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(format!("{:#}", error))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
