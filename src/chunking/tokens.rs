/*!
 * Token counting.
 *
 * `TokenCounter::exact()` counts with the cl100k_base BPE; when the encoder
 * cannot be loaded it degrades to the `ceil(chars / 4)` approximation that
 * `TokenCounter::approximate()` always uses. Counts are memoized in a
 * bounded FIFO cache shared by all clones of a counter.
 */

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, warn};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Default memoization capacity
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

const APPROX_CHARS_PER_TOKEN: usize = 4;

static ENCODER: Lazy<Option<Arc<CoreBPE>>> = Lazy::new(|| match cl100k_base() {
    Ok(bpe) => Some(Arc::new(bpe)),
    Err(e) => {
        warn!("Failed to load cl100k_base encoder, falling back to approximate token counts: {}", e);
        None
    }
});

static SHARED: Lazy<TokenCounter> = Lazy::new(|| TokenCounter::exact(DEFAULT_CACHE_CAPACITY));

/// Process-wide exact counter
pub fn shared() -> &'static TokenCounter {
    &SHARED
}

/// Count tokens with the shared counter
pub fn count_tokens(text: &str) -> usize {
    shared().count(text)
}

/// `ceil(chars / 4)`
pub fn approximate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(APPROX_CHARS_PER_TOKEN)
}

#[derive(Clone)]
enum Encoding {
    Bpe(Arc<CoreBPE>),
    Approximate,
}

/// Insertion-ordered map evicting its oldest entry at capacity
struct FifoCache {
    entries: HashMap<String, usize>,
    order: VecDeque<String>,
    capacity: usize,
}

impl FifoCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn insert(&mut self, text: &str, count: usize) {
        if self.capacity == 0 || self.entries.contains_key(text) {
            return;
        }
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.entries.insert(text.to_string(), count);
        self.order.push_back(text.to_string());
    }
}

/// Memoizing token counter, cheap to clone
#[derive(Clone)]
pub struct TokenCounter {
    encoding: Encoding,
    cache: Arc<RwLock<FifoCache>>,
    hits: Arc<AtomicUsize>,
    misses: Arc<AtomicUsize>,
}

impl TokenCounter {
    /// BPE-backed counter, approximate if the encoder is unavailable
    pub fn exact(cache_capacity: usize) -> Self {
        let encoding = match ENCODER.as_ref() {
            Some(bpe) => Encoding::Bpe(Arc::clone(bpe)),
            None => Encoding::Approximate,
        };
        Self::with_encoding(encoding, cache_capacity)
    }

    /// `ceil(chars / 4)` counter
    pub fn approximate(cache_capacity: usize) -> Self {
        Self::with_encoding(Encoding::Approximate, cache_capacity)
    }

    fn with_encoding(encoding: Encoding, cache_capacity: usize) -> Self {
        Self {
            encoding,
            cache: Arc::new(RwLock::new(FifoCache::new(cache_capacity))),
            hits: Arc::new(AtomicUsize::new(0)),
            misses: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Whether counts come from the BPE encoder
    pub fn is_exact(&self) -> bool {
        matches!(self.encoding, Encoding::Bpe(_))
    }

    /// Count tokens in `text`; deterministic for a given encoding
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        if let Some(count) = self.cache.read().entries.get(text).copied() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return count;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let count = self.encode_len(text);
        self.cache.write().insert(text, count);
        count
    }

    fn encode_len(&self, text: &str) -> usize {
        match &self.encoding {
            Encoding::Approximate => approximate_tokens(text),
            Encoding::Bpe(bpe) => match catch_unwind(AssertUnwindSafe(|| bpe.encode_ordinary(text).len())) {
                Ok(count) => count,
                Err(_) => {
                    warn!("Token encoder failed on a {}-byte input, using approximation", text.len());
                    approximate_tokens(text)
                }
            },
        }
    }

    /// Number of memoized entries
    pub fn cached_entries(&self) -> usize {
        self.cache.read().entries.len()
    }

    /// Get cache statistics: hits, misses and hit rate
    pub fn stats(&self) -> (usize, usize, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        let hit_rate = if total > 0 { hits as f64 / total as f64 } else { 0.0 };

        (hits, misses, hit_rate)
    }

    /// Clear the cache
    pub fn clear(&self) {
        let mut cache = self.cache.write();
        cache.entries.clear();
        cache.order.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        debug!("Token cache cleared");
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("exact", &self.is_exact())
            .field("cached_entries", &self.cached_entries())
            .finish()
    }
}
