//! The hybrid retriever.

use crate::cache::QueryCache;
use crate::{
    MAX_INTERPRETIVE_PER_STATUTE, MAX_TOP_K, Retrieval, RetrievalConfig, RetrievalSource,
    RetrieveError, RetrieveOptions, RetrievedDoc,
};
use lexlink_core::{CorrelationId, DocType, DocumentStore, InterpretationType, LinkStore};
use lexlink_index::{
    DenseIndex, EmbeddingProvider, GenerationPointer, IndexError, LexicalIndex, SearchHit,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Post-boost scores may not exceed this multiple of the best pre-boost
/// fused score.
const BOOST_CEILING: f64 = 3.0;

#[derive(Debug, Clone)]
struct FusedEntry {
    unit_id: String,
    lex: f64,
    dense: f64,
    score: f64,
    source: RetrievalSource,
    boosted_by: Option<f64>,
    interprets_statute: Option<String>,
    interpretation_type: Option<InterpretationType>,
    synthetic: bool,
}

#[derive(Debug, Clone)]
struct BoostInfo {
    statute_id: String,
    boost_factor: f64,
    interpretation_type: InterpretationType,
    year: Option<i32>,
}

/// Fuses lexical and dense search, boosts interpretive cases, and
/// diversifies the final ranking.
pub struct HybridRetriever {
    store: Arc<DocumentStore>,
    links: Arc<LinkStore>,
    lexical: Arc<GenerationPointer<LexicalIndex>>,
    dense: Arc<GenerationPointer<DenseIndex>>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: RetrievalConfig,
    cache: Option<Mutex<QueryCache>>,
}

impl HybridRetriever {
    /// Creates a retriever over the given read-only collaborators.
    pub fn new(
        store: Arc<DocumentStore>,
        links: Arc<LinkStore>,
        lexical: Arc<GenerationPointer<LexicalIndex>>,
        dense: Arc<GenerationPointer<DenseIndex>>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            links,
            lexical,
            dense,
            embedder,
            config,
            cache: None,
        }
    }

    /// Enables the bounded query cache.
    #[must_use]
    pub fn with_cache(mut self, cache: QueryCache) -> Self {
        self.cache = Some(Mutex::new(cache));
        self
    }

    /// The retriever's configuration.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Runs one retrieval.
    pub async fn retrieve(
        &self,
        query: &str,
        opts: RetrieveOptions,
    ) -> Result<Retrieval, RetrieveError> {
        let started = Instant::now();
        let correlation_id = opts.correlation_id.clone().unwrap_or_default();

        // Request validation; everything past this point degrades instead
        // of failing.
        if query.trim().is_empty() {
            return Err(RetrieveError::BadRequest("query must not be empty".into()));
        }
        let k = opts.top_k.unwrap_or(self.config.top_k);
        if k == 0 || k > MAX_TOP_K {
            return Err(RetrieveError::BadRequest(format!(
                "top_k must be in [1, {MAX_TOP_K}], got {k}"
            )));
        }
        let per_statute_cap = opts
            .max_interpretive_per_statute
            .unwrap_or(self.config.max_interpretive_per_statute);
        if per_statute_cap == 0 || per_statute_cap > MAX_INTERPRETIVE_PER_STATUTE {
            return Err(RetrieveError::BadRequest(format!(
                "max_interpretive_per_statute must be in [1, {MAX_INTERPRETIVE_PER_STATUTE}], got {per_statute_cap}"
            )));
        }
        let use_links = opts
            .use_interpretation_links
            .unwrap_or(self.config.use_interpretation_links);

        let cache_key = QueryCache::key(query, k, use_links, per_statute_cap);
        if opts.deadline.is_none() {
            if let Some(cache) = &self.cache {
                let mut cache = cache.lock().unwrap_or_else(|p| p.into_inner());
                if let Some(results) = cache.get(&cache_key) {
                    tracing::debug!(correlation_id = %correlation_id, "query cache hit");
                    return Ok(Retrieval {
                        correlation_id,
                        results,
                        partial: false,
                        warnings: Vec::new(),
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    });
                }
            }
        }

        let deadline = opts.deadline.map(|d| started + d);
        let mut warnings = Vec::new();
        let mut partial = false;

        // Phase 1: concurrent fan-out with per-side timeouts.
        let k_fetch = k.saturating_mul(self.config.fetch_multiplier).max(k);
        let side_timeout = remaining(deadline, self.config.side_timeout);
        let (lex_hits, dense_hits) = self
            .fan_out(query, k_fetch, side_timeout, &mut warnings, &mut partial)
            .await;

        tracing::debug!(
            correlation_id = %correlation_id,
            lex = lex_hits.len(),
            dense = dense_hits.len(),
            "fan-out complete"
        );

        // Phase 2: normalize and fuse.
        let mut entries = self.fuse(lex_hits, dense_hits);
        entries.truncate(self.config.merge_limit);

        // Phases 3–4: interpretation boost, unless disabled or out of time.
        if use_links && !entries.is_empty() {
            if expired(deadline) {
                partial = true;
                warnings.push("deadline expired before interpretation boost".into());
            } else {
                self.apply_interpretation_boost(&mut entries, &correlation_id, &mut warnings);
            }
        }

        // Stable sort: equal scores keep pre-boost order.
        entries.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Phase 5: diversify and materialize.
        let results = self.diversify(entries, k, per_statute_cap, &mut warnings);

        let retrieval = Retrieval {
            correlation_id,
            results,
            partial,
            warnings,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        if !retrieval.partial && retrieval.warnings.is_empty() && opts.deadline.is_none() {
            if let Some(cache) = &self.cache {
                let mut cache = cache.lock().unwrap_or_else(|p| p.into_inner());
                cache.put(cache_key, retrieval.results.clone());
            }
        }

        tracing::info!(
            correlation_id = %retrieval.correlation_id,
            results = retrieval.results.len(),
            partial = retrieval.partial,
            elapsed_ms = retrieval.elapsed_ms,
            "retrieval complete"
        );
        Ok(retrieval)
    }

    /// Runs both sides concurrently. A timeout or failure on either side
    /// yields an empty list for that side, never an error.
    async fn fan_out(
        &self,
        query: &str,
        k_fetch: usize,
        side_timeout: Duration,
        warnings: &mut Vec<String>,
        partial: &mut bool,
    ) -> (Vec<SearchHit>, Vec<SearchHit>) {
        let lexical = self.lexical.load();
        let lex_query = query.to_string();
        let lex_task =
            tokio::task::spawn_blocking(move || lexical.search(&lex_query, k_fetch));

        let dense = self.dense.load();
        let embedder = Arc::clone(&self.embedder);
        let dense_query = query.to_string();
        let dense_task = async move {
            let vector = embedder.embed(&dense_query).await?;
            tokio::task::spawn_blocking(move || dense.search(&vector, k_fetch))
                .await
                .map_err(|e| IndexError::Unavailable(e.to_string()))?
        };

        let (lex_outcome, dense_outcome) = tokio::join!(
            tokio::time::timeout(side_timeout, lex_task),
            tokio::time::timeout(side_timeout, dense_task),
        );

        let lex_hits = match lex_outcome {
            Ok(Ok(hits)) => hits,
            Ok(Err(join_error)) => {
                warnings.push(format!("lexical search failed: {join_error}"));
                Vec::new()
            }
            Err(_) => {
                warnings.push("lexical search timed out".into());
                *partial = true;
                Vec::new()
            }
        };

        let dense_hits = match dense_outcome {
            Ok(Ok(hits)) => hits,
            Ok(Err(error)) => {
                // EmbeddingFailed and friends degrade to lexical-only.
                warnings.push(format!("dense search unavailable: {error}"));
                Vec::new()
            }
            Err(_) => {
                warnings.push("dense search timed out".into());
                *partial = true;
                Vec::new()
            }
        };

        (lex_hits, dense_hits)
    }

    /// Min-max normalizes each side and merges by unit id with the active
    /// fusion weights. The returned list is sorted best-first with a
    /// deterministic id tie-break.
    fn fuse(&self, lex: Vec<SearchHit>, dense: Vec<SearchHit>) -> Vec<FusedEntry> {
        let lex = normalize(lex);
        let dense = normalize(dense);
        let (w_lex, w_dense) = self.config.normalized_weights();

        let mut merged: HashMap<String, FusedEntry> = HashMap::new();
        for hit in lex {
            merged.insert(
                hit.unit_id.clone(),
                FusedEntry {
                    unit_id: hit.unit_id,
                    lex: hit.score,
                    dense: 0.0,
                    score: w_lex * hit.score,
                    source: RetrievalSource::Lexical,
                    boosted_by: None,
                    interprets_statute: None,
                    interpretation_type: None,
                    synthetic: false,
                },
            );
        }
        for hit in dense {
            match merged.get_mut(&hit.unit_id) {
                Some(entry) => {
                    entry.dense = hit.score;
                    entry.score += w_dense * hit.score;
                    entry.source = RetrievalSource::Fused;
                }
                None => {
                    merged.insert(
                        hit.unit_id.clone(),
                        FusedEntry {
                            unit_id: hit.unit_id,
                            lex: 0.0,
                            dense: hit.score,
                            score: w_dense * hit.score,
                            source: RetrievalSource::Dense,
                            boosted_by: None,
                            interprets_statute: None,
                            interpretation_type: None,
                            synthetic: false,
                        },
                    );
                }
            }
        }

        let mut entries: Vec<FusedEntry> = merged.into_values().collect();
        entries.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.unit_id.cmp(&b.unit_id))
        });
        entries
    }

    /// Boosts linked cases already present and injects missing ones.
    fn apply_interpretation_boost(
        &self,
        entries: &mut Vec<FusedEntry>,
        correlation_id: &CorrelationId,
        warnings: &mut Vec<String>,
    ) {
        // Anchor statutes: statute-typed units in the fused head.
        let anchors: Vec<String> = entries
            .iter()
            .take(self.config.anchor_window)
            .filter(|e| {
                self.store
                    .get(&e.unit_id)
                    .map(|d| d.doc_type == DocType::Statute)
                    .unwrap_or(false)
            })
            .map(|e| e.unit_id.clone())
            .collect();

        if anchors.is_empty() {
            tracing::debug!(correlation_id = %correlation_id, "no anchor statutes, skipping boost");
            return;
        }

        let links = self
            .links
            .links_for_statutes(&anchors, self.config.verified_links_only);
        if links.is_empty() {
            tracing::debug!(correlation_id = %correlation_id, "no links for anchors");
            return;
        }

        // One entry per case; the list is ordered boost-descending, so the
        // first link seen for a case is its strongest.
        let mut boost_map: Vec<(String, BoostInfo)> = Vec::new();
        let mut seen_cases = std::collections::HashSet::new();
        for link in links {
            if seen_cases.insert(link.case_id.clone()) {
                boost_map.push((
                    link.case_id.clone(),
                    BoostInfo {
                        statute_id: link.statute_id.clone(),
                        boost_factor: link.boost_factor,
                        interpretation_type: link.interpretation_type,
                        year: link.year,
                    },
                ));
            }
        }

        let max_pre_boost = entries.first().map(|e| e.score).unwrap_or(0.0);
        let score_ceiling = BOOST_CEILING * max_pre_boost;
        let top_window = entries.len().min(10);
        let mean_top: f64 = if top_window == 0 {
            0.0
        } else {
            entries[..top_window].iter().map(|e| e.score).sum::<f64>() / top_window as f64
        };

        let by_id: HashMap<String, usize> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.unit_id.clone(), i))
            .collect();

        let mut boosted = 0usize;
        let mut injected: Vec<(FusedEntry, BoostInfo)> = Vec::new();

        for (case_id, info) in boost_map {
            if let Some(&idx) = by_id.get(&case_id) {
                let entry = &mut entries[idx];
                entry.score = (entry.score * info.boost_factor).min(score_ceiling);
                entry.boosted_by = Some(info.boost_factor);
                entry.interprets_statute = Some(info.statute_id.clone());
                entry.interpretation_type = Some(info.interpretation_type);
                boosted += 1;
            } else {
                match self.store.get(&case_id) {
                    Some(_) => {
                        let score =
                            self.config.synthetic_penalty * mean_top * info.boost_factor;
                        injected.push((
                            FusedEntry {
                                unit_id: case_id,
                                lex: 0.0,
                                dense: 0.0,
                                score,
                                source: RetrievalSource::InterpretationLink,
                                boosted_by: Some(info.boost_factor),
                                interprets_statute: Some(info.statute_id.clone()),
                                interpretation_type: Some(info.interpretation_type),
                                synthetic: true,
                            },
                            info,
                        ));
                    }
                    None => {
                        warnings.push(format!("linked case {case_id} missing from store"));
                    }
                }
            }
        }

        // Injections among themselves: stronger boost first, then more
        // recent decisions.
        injected.sort_by(|(_, a), (_, b)| {
            b.boost_factor
                .partial_cmp(&a.boost_factor)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.year.unwrap_or(i32::MIN).cmp(&a.year.unwrap_or(i32::MIN)))
        });

        let injected_count = injected.len();
        entries.extend(injected.into_iter().map(|(entry, _)| entry));

        tracing::debug!(
            correlation_id = %correlation_id,
            anchors = anchors.len(),
            boosted,
            injected = injected_count,
            "interpretation boost applied"
        );
    }

    /// Walks the ranked list capping interpretive cases per anchor statute,
    /// and materializes up to `k` results.
    fn diversify(
        &self,
        entries: Vec<FusedEntry>,
        k: usize,
        per_statute_cap: usize,
        warnings: &mut Vec<String>,
    ) -> Vec<RetrievedDoc> {
        let mut per_statute: HashMap<String, usize> = HashMap::new();
        let mut results = Vec::with_capacity(k);

        for entry in entries {
            if let Some(statute_id) = &entry.interprets_statute {
                let count = per_statute.entry(statute_id.clone()).or_default();
                if *count >= per_statute_cap {
                    continue;
                }
                *count += 1;
            }

            match self.store.get(&entry.unit_id) {
                Some(doc) => {
                    let content = if doc.full_text.trim().is_empty() {
                        doc.title.clone()
                    } else {
                        doc.full_text.clone()
                    };
                    results.push(RetrievedDoc {
                        unit_id: entry.unit_id,
                        doc_type: doc.doc_type,
                        title: doc.title.clone(),
                        content,
                        citation: doc.citation.clone(),
                        year: doc.year,
                        score: entry.score,
                        source: entry.source,
                        lex_score: entry.lex,
                        dense_score: entry.dense,
                        boosted_by: entry.boosted_by,
                        interprets_statute: entry.interprets_statute,
                        interpretation_type: entry.interpretation_type,
                        synthetic: entry.synthetic,
                    });
                }
                None => {
                    warnings.push(format!("indexed unit {} missing from store", entry.unit_id));
                }
            }

            if results.len() >= k {
                break;
            }
        }

        results
    }
}

/// Min-max scales scores into `[0, 1]`; a constant list maps to all-1.0.
fn normalize(mut hits: Vec<SearchHit>) -> Vec<SearchHit> {
    if hits.is_empty() {
        return hits;
    }
    let min = hits.iter().map(|h| h.score).fold(f64::INFINITY, f64::min);
    let max = hits.iter().map(|h| h.score).fold(f64::NEG_INFINITY, f64::max);

    if (max - min).abs() < f64::EPSILON {
        for hit in &mut hits {
            hit.score = 1.0;
        }
    } else {
        for hit in &mut hits {
            hit.score = (hit.score - min) / (max - min);
        }
    }
    hits
}

fn remaining(deadline: Option<Instant>, side_timeout: Duration) -> Duration {
    match deadline {
        Some(deadline) => deadline
            .saturating_duration_since(Instant::now())
            .min(side_timeout),
        None => side_timeout,
    }
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_scales_to_unit_interval() {
        let hits = normalize(vec![
            SearchHit::new("a", 2.0),
            SearchHit::new("b", 6.0),
            SearchHit::new("c", 4.0),
        ]);
        assert_eq!(hits[0].score, 0.0);
        assert_eq!(hits[1].score, 1.0);
        assert_eq!(hits[2].score, 0.5);
    }

    #[test]
    fn test_normalize_constant_scores() {
        let hits = normalize(vec![SearchHit::new("a", 3.0), SearchHit::new("b", 3.0)]);
        assert!(hits.iter().all(|h| h.score == 1.0));
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize(Vec::new()).is_empty());
    }

    #[test]
    fn test_normalized_weights_renormalize_reserved_signal() {
        let config = RetrievalConfig::default();
        let (w_lex, w_dense) = config.normalized_weights();
        assert!((w_lex - 0.5).abs() < 1e-9);
        assert!((w_dense - 0.5).abs() < 1e-9);
    }

    fn bare_retriever() -> HybridRetriever {
        use lexlink_index::{DenseIndexBuilder, HashingEmbedding, LexicalIndexBuilder};
        HybridRetriever::new(
            Arc::new(lexlink_core::DocumentStore::new()),
            Arc::new(LinkStore::new()),
            Arc::new(GenerationPointer::new(LexicalIndexBuilder::new().build())),
            Arc::new(GenerationPointer::new(DenseIndexBuilder::new(4).build())),
            Arc::new(HashingEmbedding::new(4)),
            RetrievalConfig::default(),
        )
    }

    #[test]
    fn test_fuse_merges_shared_unit() {
        let retriever = bare_retriever();
        let fused = retriever.fuse(
            vec![SearchHit::new("a", 1.0), SearchHit::new("b", 0.5)],
            vec![SearchHit::new("a", 0.9)],
        );
        let a = fused.iter().find(|e| e.unit_id == "a").unwrap();
        assert_eq!(a.source, RetrievalSource::Fused);
        assert!(a.lex > 0.0 && a.dense > 0.0);
    }

    proptest::proptest! {
        /// Normalized scores always land in [0, 1].
        #[test]
        fn prop_normalize_bounds(scores in proptest::collection::vec(0.0f64..1000.0, 1..50)) {
            let hits: Vec<SearchHit> = scores
                .iter()
                .enumerate()
                .map(|(i, &s)| SearchHit::new(format!("u{i}"), s))
                .collect();
            let normalized = normalize(hits);
            for hit in normalized {
                proptest::prop_assert!((0.0..=1.0).contains(&hit.score));
            }
        }

        /// Fusion monotonicity: a result dominating another on both raw
        /// components ranks above it before boosting.
        #[test]
        fn prop_fusion_monotone(
            base in proptest::collection::vec((0.0f64..100.0, 0.0f64..100.0), 2..20),
            bump_lex in 0.001f64..50.0,
            bump_dense in 0.001f64..50.0,
        ) {
            let mut lex_hits = Vec::new();
            let mut dense_hits = Vec::new();
            for (i, (l, d)) in base.iter().enumerate() {
                lex_hits.push(SearchHit::new(format!("u{i}"), *l));
                dense_hits.push(SearchHit::new(format!("u{i}"), *d));
            }
            // "dom" dominates u0 on both sides.
            let (l0, d0) = base[0];
            lex_hits.push(SearchHit::new("dom", l0 + bump_lex));
            dense_hits.push(SearchHit::new("dom", d0 + bump_dense));

            let retriever = bare_retriever();
            let fused = retriever.fuse(lex_hits, dense_hits);
            let pos = |id: &str| fused.iter().position(|e| e.unit_id == id).unwrap();
            proptest::prop_assert!(pos("dom") < pos("u0"));
        }
    }
}
