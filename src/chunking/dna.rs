/*!
 * Chunk DNA: heuristic content metadata.
 *
 * Extraction is a pure function of the chunk text. Batches run on the
 * blocking pool with a bounded number of tasks in flight; a task that
 * panics leaves its chunk with the default DNA instead of failing the batch.
 */

use std::collections::{HashMap, HashSet};

use futures::stream::{self, StreamExt};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use super::model::{Chunk, ChunkDna, StyleCategory};

const MAX_TOPICS: usize = 5;
const MAX_ENTITIES: usize = 10;
const MAX_REFERENCES: usize = 20;
const MIN_TOPIC_CHARS: usize = 5;

static VIETNAMESE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[ạảấầẩẫậắằẳẵặẹẻẽếềểễệỉịọỏốồổỗộớờởỡợụủứừửữựỳỵỷỹđăơư]").unwrap());
static KANA: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u{3040}-\u{30ff}]").unwrap());
static HANGUL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u{ac00}-\u{d7af}]").unwrap());
static HAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u{4e00}-\u{9fa5}]").unwrap());

static STYLE_KEYWORDS: Lazy<Vec<(StyleCategory, Regex)>> = Lazy::new(|| {
    vec![
        (
            StyleCategory::Technical,
            Regex::new(r"(?i)\b(?:algorithm|function|code|implementation|api|database|server|client)s?\b").unwrap(),
        ),
        (
            StyleCategory::Academic,
            Regex::new(r"(?i)\b(?:research|study|studies|hypothesis|methodology|findings|conclusion|abstract)\b")
                .unwrap(),
        ),
        (
            StyleCategory::Narrative,
            Regex::new(r"(?i)\b(?:story|character|narrative|plot|dialogue|scene|chapter)s?\b").unwrap(),
        ),
    ]
});

static FIGURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:figure|image|diagram|chart|graph|illustration|screenshot|img)\b|\bfig\.").unwrap()
});
static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*(?:```|~~~)").unwrap());
static CODE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:fn|def|function|class|import|export|const|let|var|pub|return)\s+[\w:<>.]+.*[(){};=:]\s*$")
        .unwrap()
});

static NUMERIC_REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d+\]").unwrap());
static AUTHOR_YEAR_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([A-Z][a-z]+(?:\s+et\s+al\.)?,\s*\d{4}\)").unwrap());

static CAPITALIZED_PHRASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\p{Lu}[\p{L}'’]+(?:\s+\p{Lu}[\p{L}'’]+)*\b").unwrap());
static ACRONYM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\p{Lu}{2,}\b").unwrap());

static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?。！？]+").unwrap());

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "from", "as", "is",
        "was", "are", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will", "would",
        "could", "should", "may", "might", "must", "can", "this", "that", "these", "those", "it", "its", "they",
        "them", "their", "there", "then", "than", "what", "which", "when", "where", "while", "who", "whom", "whose",
        "about", "above", "after", "again", "against", "before", "below", "because", "between", "during", "every",
        "first", "other", "others", "shall", "since", "still", "through", "under", "until", "within", "without",
        "into", "also", "some", "such", "only", "very", "just", "more", "most", "each", "much", "many", "here",
    ]
    .into_iter()
    .collect()
});

static POSITIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "good", "great", "excellent", "positive", "success", "successful", "benefit", "improve", "improved",
        "effective", "happy", "best", "better", "advantage", "gain", "love", "strong", "win",
    ]
    .into_iter()
    .collect()
});

static NEGATIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "bad", "poor", "negative", "fail", "failed", "failure", "problem", "issue", "risk", "worse", "worst",
        "loss", "difficult", "error", "weak", "sad", "hate", "lose",
    ]
    .into_iter()
    .collect()
});

/// Dominant script of `text` as a language code, `en` when nothing matches
pub fn detect_language(text: &str) -> &'static str {
    // Kana before Han: Japanese text mixes both
    if KANA.is_match(text) {
        "ja"
    } else if HANGUL.is_match(text) {
        "ko"
    } else if HAN.is_match(text) {
        "zh"
    } else if VIETNAMESE.is_match(text) {
        "vi"
    } else {
        "en"
    }
}

fn detect_style(text: &str) -> StyleCategory {
    let mut best = StyleCategory::General;
    let mut best_hits = 0;
    for (style, pattern) in STYLE_KEYWORDS.iter() {
        let hits = pattern.find_iter(text).count();
        if hits > best_hits {
            best = *style;
            best_hits = hits;
        }
    }
    best
}

fn delimiter_count(line: &str) -> usize {
    let pipes = line.matches('|').count();
    let tabs = line.matches('\t').count();
    pipes.max(tabs)
}

/// At least two delimited rows, and one adjacent pair with matching column counts
fn has_table(text: &str) -> bool {
    let rows: Vec<usize> = text.lines().map(delimiter_count).collect();
    if rows.iter().filter(|&&count| count >= 2).count() < 2 {
        return false;
    }
    rows.windows(2)
        .any(|pair| pair[0] >= 2 && pair[1] >= 2 && pair[0].abs_diff(pair[1]) <= 1)
}

fn has_code(text: &str) -> bool {
    CODE_FENCE.is_match(text) || CODE_LINE.is_match(text)
}

fn extract_references(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut references: Vec<(usize, String)> = NUMERIC_REFERENCE
        .find_iter(text)
        .chain(AUTHOR_YEAR_REFERENCE.find_iter(text))
        .map(|m| (m.start(), m.as_str().to_string()))
        .collect();
    references.sort_by_key(|(start, _)| *start);
    references
        .into_iter()
        .filter_map(|(_, reference)| seen.insert(reference.clone()).then_some(reference))
        .take(MAX_REFERENCES)
        .collect()
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty())
}

fn extract_topics(text: &str) -> Vec<String> {
    let mut frequency: HashMap<String, usize> = HashMap::new();
    for word in words(text) {
        let word = word.to_lowercase();
        if word.chars().count() < MIN_TOPIC_CHARS || STOPWORDS.contains(word.as_str()) {
            continue;
        }
        if word.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        *frequency.entry(word).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = frequency.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(MAX_TOPICS).map(|(word, _)| word).collect()
}

fn extract_entities(text: &str) -> Vec<String> {
    let mut matches: Vec<(usize, &str)> = CAPITALIZED_PHRASE
        .find_iter(text)
        .chain(ACRONYM.find_iter(text))
        .map(|m| (m.start(), m.as_str()))
        .collect();
    matches.sort_by_key(|(start, _)| *start);

    let mut seen = HashSet::new();
    let mut entities = Vec::new();
    for (_, entity) in matches {
        // Sentence-initial function words are not entities
        if !entity.contains(char::is_whitespace) && STOPWORDS.contains(entity.to_lowercase().as_str()) {
            continue;
        }
        if seen.insert(entity) {
            entities.push(entity.to_string());
            if entities.len() == MAX_ENTITIES {
                break;
            }
        }
    }
    entities
}

fn sentence_count(text: &str) -> usize {
    SENTENCE_END
        .split(text)
        .filter(|sentence| !sentence.trim().is_empty())
        .count()
}

/// `min(words per sentence / 25, 1) * 5 + lexical diversity * 5`, in `[0, 10]`
fn complexity(text: &str, word_count: usize, sentences: usize) -> u8 {
    if word_count == 0 || sentences == 0 {
        return 0;
    }
    let avg_words_per_sentence = word_count as f64 / sentences as f64;
    let unique: HashSet<String> = text.split_whitespace().map(|w| w.to_lowercase()).collect();
    let diversity = unique.len() as f64 / word_count as f64;

    let score = (avg_words_per_sentence / 25.0).min(1.0) * 5.0 + diversity * 5.0;
    score.round().clamp(0.0, 10.0) as u8
}

fn sentiment(text: &str) -> f32 {
    let mut positive = 0usize;
    let mut negative = 0usize;
    for word in words(text) {
        let word = word.to_lowercase();
        if POSITIVE_WORDS.contains(word.as_str()) {
            positive += 1;
        } else if NEGATIVE_WORDS.contains(word.as_str()) {
            negative += 1;
        }
    }
    if positive + negative == 0 {
        0.5
    } else {
        positive as f32 / (positive + negative) as f32
    }
}

/// Compute the DNA of one chunk
pub fn extract(content: &str) -> ChunkDna {
    let word_count = content.split_whitespace().count();
    let sentences = sentence_count(content);

    ChunkDna {
        language: detect_language(content).to_string(),
        style: detect_style(content),
        has_table: has_table(content),
        has_figure: FIGURE.is_match(content),
        has_code: has_code(content),
        topics: extract_topics(content),
        entities: extract_entities(content),
        references: extract_references(content),
        complexity: complexity(content, word_count, sentences),
        word_count,
        sentence_count: sentences,
        sentiment: sentiment(content),
    }
}

/// Runs DNA extraction over finished chunks with bounded concurrency
#[derive(Debug, Clone, Copy)]
pub struct DnaExtractor {
    concurrency: usize,
}

impl DnaExtractor {
    pub fn new(concurrency: usize) -> Self {
        Self { concurrency: concurrency.max(1) }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Attach DNA to every chunk, in place
    pub async fn extract_batch(&self, chunks: &mut [Chunk]) {
        if chunks.is_empty() {
            return;
        }

        let jobs: Vec<(usize, String)> = chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| (index, chunk.content.clone()))
            .collect();

        let results: Vec<(usize, ChunkDna)> = stream::iter(jobs)
            .map(|(index, content)| async move {
                let dna = match tokio::task::spawn_blocking(move || extract(&content)).await {
                    Ok(dna) => dna,
                    Err(e) => {
                        warn!("DNA extraction failed for chunk {}, using defaults: {}", index, e);
                        ChunkDna::default()
                    }
                };
                (index, dna)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (index, dna) in results {
            chunks[index].dna = Some(dna);
        }

        debug!("Extracted DNA for {} chunks", chunks.len());
    }
}

impl Default for DnaExtractor {
    fn default() -> Self {
        Self::new(8)
    }
}
