//! Bounded in-process cache for retrieval results.
//!
//! Keys are the request-shaping inputs (query, k, boost flags); values are
//! full result lists. The cache is byte-budgeted: entries are charged by
//! their content size and least-recently-used entries are evicted until the
//! budget holds. Results are only cacheable because retrieval is a pure
//! function of its inputs against a pinned corpus generation.

use crate::RetrievedDoc;
use lru::LruCache;

/// Per-entry fixed overhead charged on top of content bytes.
const ENTRY_OVERHEAD: usize = 128;

/// LRU cache of retrieval results with a byte budget.
pub struct QueryCache {
    entries: LruCache<String, CachedEntry>,
    budget_bytes: usize,
    used_bytes: usize,
    hits: u64,
    misses: u64,
}

struct CachedEntry {
    results: Vec<RetrievedDoc>,
    cost: usize,
}

fn cost_of(results: &[RetrievedDoc]) -> usize {
    results
        .iter()
        .map(|r| r.content.len() + r.title.len() + r.unit_id.len() + ENTRY_OVERHEAD)
        .sum::<usize>()
        .max(ENTRY_OVERHEAD)
}

impl QueryCache {
    /// Creates a cache with the given byte budget.
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            budget_bytes,
            used_bytes: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Number of cached requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes currently charged.
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Hit rate over the cache's lifetime.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Builds the cache key for a request shape.
    pub fn key(query: &str, k: usize, use_links: bool, per_statute_cap: usize) -> String {
        format!("{k}|{use_links}|{per_statute_cap}|{query}")
    }

    /// Looks up a request, refreshing its recency.
    pub fn get(&mut self, key: &str) -> Option<Vec<RetrievedDoc>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits += 1;
                Some(entry.results.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Stores a result list, evicting LRU entries to stay within budget.
    ///
    /// An entry larger than the whole budget is not stored.
    pub fn put(&mut self, key: String, results: Vec<RetrievedDoc>) {
        let cost = cost_of(&results);
        if cost > self.budget_bytes {
            return;
        }

        if let Some(old) = self.entries.pop(&key) {
            self.used_bytes -= old.cost;
        }

        while self.used_bytes + cost > self.budget_bytes {
            match self.entries.pop_lru() {
                Some((_, evicted)) => self.used_bytes -= evicted.cost,
                None => break,
            }
        }

        self.used_bytes += cost;
        self.entries.put(key, CachedEntry { results, cost });
    }
}
