/*!
 * Splitting one section into token-bounded, overlapping chunks.
 *
 * The splitter walks a character cursor over the section. Each window is
 * sized from an estimated chars-per-token ratio, its right edge is pulled
 * back to whitespace when possible, and it is shrunk while its exact token
 * count is over budget, down to a single char. The cursor then steps back by
 * the overlap for the next window. Every iteration advances the cursor by at
 * least one char, which gives the iteration budget.
 */

use log::{debug, warn};

use super::model::{link_chunks, Chunk};
use super::tokens::TokenCounter;
use crate::errors::ChunkingError;

/// Shrunk windows aim slightly under budget so one pass usually suffices
const SHRINK_MARGIN: f64 = 0.95;

/// Extra iterations allowed on top of the computed bound
const ITERATION_SLACK: usize = 10;

/// Settings for one split
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitterConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    /// How far back from a window edge to look for whitespace
    pub boundary_window_chars: usize,
    /// Fixed chars-per-token ratio; measured per section when absent
    pub chars_per_token: Option<f64>,
}

impl SplitterConfig {
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Self {
        Self {
            max_tokens,
            overlap_tokens,
            boundary_window_chars: 50,
            chars_per_token: None,
        }
    }
}

pub struct ChunkSplitter<'a> {
    counter: &'a TokenCounter,
    config: SplitterConfig,
}

/// A window after snapping, trimming and counting
struct Window {
    /// Exclusive end of the untrimmed window, in chars
    end: usize,
    /// Trimmed span, in chars
    start_char: usize,
    end_char: usize,
    tokens: usize,
    /// Whether the window had to shrink below the nominal size
    shrunk: bool,
}

impl<'a> ChunkSplitter<'a> {
    pub fn new(counter: &'a TokenCounter, config: SplitterConfig) -> Self {
        Self { counter, config }
    }

    /// Overlap actually used: 80% of the budget or more is cut to half
    pub fn effective_overlap(&self) -> usize {
        let max_tokens = self.config.max_tokens;
        let overlap = self.config.overlap_tokens;
        if overlap * 5 >= max_tokens * 4 {
            let reduced = max_tokens / 2;
            warn!(
                "Overlap of {} tokens is too large for chunks of {} tokens, reducing it to {}",
                overlap, max_tokens, reduced
            );
            reduced
        } else {
            overlap
        }
    }

    /// Split `section`, whose first byte sits at `section_offset` in the document.
    ///
    /// Returned chunks are linked to each other and carry document byte offsets.
    pub fn split(
        &self,
        section: &str,
        section_index: usize,
        section_offset: usize,
    ) -> Result<Vec<Chunk>, ChunkingError> {
        let body = section.trim();
        if body.is_empty() {
            return Ok(Vec::new());
        }

        let max_tokens = self.config.max_tokens.max(1);
        let total_tokens = self.counter.count(body);
        if total_tokens <= max_tokens {
            let leading = section.len() - section.trim_start().len();
            return Ok(vec![Chunk::new(
                section_index,
                0,
                body.to_string(),
                total_tokens,
                section_offset + leading,
            )]);
        }

        let chars: Vec<char> = section.chars().collect();
        let bounds: Vec<usize> = section
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(section.len()))
            .collect();
        let char_len = chars.len();

        let chars_per_token = self
            .config
            .chars_per_token
            .filter(|ratio| ratio.is_finite() && *ratio > 0.0)
            .unwrap_or(body.chars().count() as f64 / total_tokens as f64);

        let overlap_tokens = self.effective_overlap();
        let chunk_chars = ((max_tokens as f64 * chars_per_token).floor() as usize).max(1);
        let overlap_chars =
            ((overlap_tokens as f64 * chars_per_token).floor() as usize).min(chunk_chars.saturating_sub(1));
        // A window may shrink to one char, so the cursor only provably moves by one
        let limit = char_len + ITERATION_SLACK;

        debug!(
            "Splitting section {} ({} tokens, {} chars): window {} chars, overlap {} chars, limit {} iterations",
            section_index, total_tokens, char_len, chunk_chars, overlap_chars, limit
        );

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut last_emitted_end: Option<usize> = None;
        let mut cursor = 0;

        for _ in 0..limit {
            let window = self.fit_window(section, &chars, &bounds, cursor, chunk_chars, max_tokens);

            if window.start_char < window.end_char {
                let start_byte = section_offset + bounds[window.start_char];
                let end_byte = section_offset + bounds[window.end_char];

                // A window fully inside the previous chunk adds nothing
                if last_emitted_end.is_none_or(|last| end_byte > last) {
                    let content = section[bounds[window.start_char]..bounds[window.end_char]].to_string();
                    chunks.push(Chunk::new(section_index, chunks.len(), content, window.tokens, start_byte));
                    last_emitted_end = Some(end_byte);
                }
            }

            if window.end >= char_len {
                link_chunks(&mut chunks);
                return Ok(chunks);
            }

            // Dense text that forced a shrink gets an overlap measured on the window itself
            let overlap = if window.shrunk && window.tokens > 0 {
                let local_ratio = (window.end_char - window.start_char) as f64 / window.tokens as f64;
                overlap_chars.min((overlap_tokens as f64 * local_ratio).floor() as usize)
            } else {
                overlap_chars
            };

            let mut next = window.end.saturating_sub(overlap);
            if next <= cursor {
                warn!(
                    "Chunk window at char {} in section {} made no progress, advancing to {}",
                    cursor, section_index, window.end
                );
                next = window.end;
            } else {
                // Start the overlap on a nearby word boundary; text without spaces keeps the raw cut
                let horizon = window.end.min(next + self.config.boundary_window_chars);
                if let Some(boundary) =
                    (next..horizon).find(|&p| chars[p - 1].is_whitespace() || chars[p].is_whitespace())
                {
                    next = boundary;
                }
            }
            cursor = next;
        }

        Err(ChunkingError::IterationBoundExceeded { section_index, limit })
    }

    /// Place the window starting at `cursor`, shrinking it while it is over budget.
    ///
    /// Only a one-char window is ever returned over budget.
    fn fit_window(
        &self,
        section: &str,
        chars: &[char],
        bounds: &[usize],
        cursor: usize,
        chunk_chars: usize,
        max_tokens: usize,
    ) -> Window {
        let char_len = chars.len();
        let mut target_len = chunk_chars;

        loop {
            let mut end = (cursor + target_len).min(char_len);
            if end < char_len {
                end = self.snap_to_whitespace(chars, cursor, end);
            }

            let mut start_char = cursor;
            while start_char < end && chars[start_char].is_whitespace() {
                start_char += 1;
            }
            let mut end_char = end;
            while end_char > start_char && chars[end_char - 1].is_whitespace() {
                end_char -= 1;
            }

            let tokens = self.counter.count(&section[bounds[start_char]..bounds[end_char]]);
            if tokens <= max_tokens || target_len <= 1 {
                if tokens > max_tokens {
                    warn!("Single char at {} counts {} tokens, over the budget of {}", cursor, tokens, max_tokens);
                }
                return Window {
                    end,
                    start_char,
                    end_char,
                    tokens,
                    shrunk: target_len < chunk_chars,
                };
            }

            // Re-estimate from this window's own density, strictly smaller each pass
            let scaled = (target_len as f64 * max_tokens as f64 / tokens as f64 * SHRINK_MARGIN).floor() as usize;
            target_len = scaled.min(target_len - 1).max(1);
        }
    }

    /// Pull `end` back onto whitespace within the look-back window
    fn snap_to_whitespace(&self, chars: &[char], cursor: usize, end: usize) -> usize {
        if chars[end].is_whitespace() {
            return end;
        }
        let floor = (cursor + 1).max(end.saturating_sub(self.config.boundary_window_chars));
        (floor..end).rev().find(|&p| chars[p].is_whitespace()).unwrap_or(end)
    }
}
