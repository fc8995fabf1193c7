/*!
 * Section detection.
 *
 * Paragraphs (separated by blank lines) are grouped greedily into sections
 * of at most `target_tokens`. Sections are byte spans that partition the
 * input, so their concatenation is the original text.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use super::tokens::TokenCounter;

/// Markdown headings, `===`/`---` rules and numbered lines
pub static DEFAULT_HEADING_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:#{1,6}\s+|={3,}|-{3,}|\d+\.\s+)").unwrap());

static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n(?:[ \t]*\r?\n)+").unwrap());

/// A contiguous byte range of the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section<'a> {
    pub index: usize,
    /// Byte offset of `text` in the document
    pub start: usize,
    pub text: &'a str,
}

impl Section<'_> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

struct Paragraph {
    /// Start of the paragraph text
    start: usize,
    /// End of the paragraph text, before its trailing separator
    end: usize,
}

fn paragraphs(text: &str) -> Vec<Paragraph> {
    let mut result = Vec::new();
    let mut last = 0;
    for m in PARAGRAPH_BREAK.find_iter(text) {
        result.push(Paragraph { start: last, end: m.start() });
        last = m.end();
    }
    result.push(Paragraph { start: last, end: text.len() });
    result
}

/// Split `text` into token-budgeted sections.
///
/// With a heading pattern, a section is also closed before a heading once it
/// holds at least half of the budget.
pub fn detect_sections<'a>(
    text: &'a str,
    target_tokens: usize,
    heading: Option<&Regex>,
    counter: &TokenCounter,
) -> Vec<Section<'a>> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut bounds = Vec::new();
    let mut current_start = 0;
    let mut current_tokens = 0;
    let mut current_has_content = false;

    for paragraph in paragraphs(text) {
        let content = &text[paragraph.start..paragraph.end];
        if content.trim().is_empty() {
            continue;
        }
        let tokens = counter.count(content);

        if current_has_content {
            let over_budget = current_tokens + tokens > target_tokens;
            let heading_break = heading.is_some_and(|re| re.is_match(content.trim_start()))
                && current_tokens * 2 >= target_tokens;

            if over_budget || heading_break {
                bounds.push((current_start, paragraph.start));
                current_start = paragraph.start;
                current_tokens = 0;
            }
        }

        current_tokens += tokens;
        current_has_content = true;
    }

    if current_start < text.len() {
        bounds.push((current_start, text.len()));
    }

    bounds
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| Section { index, start, text: &text[start..end] })
        .collect()
}
