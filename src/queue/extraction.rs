/*!
 * Text extraction collaborator.
 *
 * Workers only ever translate plain text. Binary formats belong to an
 * external extractor implementing `TextExtractor`; the built-in one reads
 * inline text and plain-text files.
 */

use async_trait::async_trait;
use log::debug;
use std::path::Path;

use crate::database::JobInput;
use crate::errors::ExtractionError;

/// File extensions `PlainTextExtractor` reads
pub const PLAIN_TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "text"];

/// Plain text pulled out of a job's input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: usize,
}

impl ExtractedText {
    /// Pages are separated by form feeds
    pub fn from_text(text: String) -> Self {
        let page_count = text.matches('\u{000C}').count() + 1;
        Self { text, page_count }
    }
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, input: &JobInput) -> Result<ExtractedText, ExtractionError>;
}

/// Whether a path has an extension `PlainTextExtractor` accepts
pub fn is_plain_text_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| PLAIN_TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, input: &JobInput) -> Result<ExtractedText, ExtractionError> {
        match input {
            JobInput::Text(text) => Ok(ExtractedText::from_text(text.clone())),
            JobInput::File(path) => {
                if !is_plain_text_path(path) {
                    return Err(ExtractionError::Unsupported(path.display().to_string()));
                }

                let text = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| ExtractionError::Io(format!("{}: {}", path.display(), e)))?;
                debug!("Read {} bytes from {}", text.len(), path.display());

                Ok(ExtractedText::from_text(text))
            }
        }
    }
}
