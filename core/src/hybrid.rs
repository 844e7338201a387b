//! Fusion of the lexical ranking with an externally computed semantic ranking.

use crate::ranking::RankingEngine;
use crate::DocId;
use anyhow::Result;
use std::collections::HashMap;

/// Source of (doc_id, similarity) pairs keyed by the same id space as the index.
///
/// The core never computes embeddings; implementors wrap whatever does.
pub trait SemanticRanker {
    fn semantic_search(&self, query: &str, k: usize) -> Result<Vec<(DocId, f64)>>;
}

/// A ranking the caller already computed, e.g. sent along with a request.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedRanking {
    hits: Vec<(DocId, f64)>,
}

impl PrecomputedRanking {
    pub fn new(mut hits: Vec<(DocId, f64)>) -> Self {
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Self { hits }
    }
}

impl SemanticRanker for PrecomputedRanking {
    fn semantic_search(&self, _query: &str, k: usize) -> Result<Vec<(DocId, f64)>> {
        Ok(self.hits.iter().take(k).cloned().collect())
    }
}

/// Sum scores per doc_id (absent = 0) and keep the best `k`, ties by doc_id.
pub fn merge_by_score_sum(lexical: &[(DocId, f64)], semantic: &[(DocId, f64)], k: usize) -> Vec<DocId> {
    let mut combined: HashMap<&DocId, f64> = HashMap::new();
    for (doc_id, score) in lexical.iter().chain(semantic) {
        *combined.entry(doc_id).or_insert(0.0) += score;
    }
    let mut merged: Vec<(&DocId, f64)> = combined.into_iter().collect();
    merged.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    merged.into_iter().take(k).map(|(d, _)| d.clone()).collect()
}

/// Lexical top-k fused with semantic top-k. A failing semantic ranker
/// degrades to the lexical list alone.
pub fn hybrid_retrieve(engine: &RankingEngine, semantic: &dyn SemanticRanker, query: &str, k: usize) -> Vec<DocId> {
    if k == 0 {
        return Vec::new();
    }
    let lexical = engine.scored(query, k);
    let sem = match semantic.semantic_search(query, k) {
        Ok(hits) => hits,
        Err(e) => {
            tracing::warn!(error = %e, "semantic ranker failed; using lexical ranking only");
            Vec::new()
        }
    };
    merge_by_score_sum(&lexical, &sem, k)
}
