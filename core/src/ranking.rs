use crate::config::{LexicalScoring, RankingConfig};
use crate::graph::WebGraph;
use crate::index::InvertedIndex;
use crate::persist::{load_docs, load_meta, ArtifactPaths, FORMAT_VERSION};
use crate::tokenizer::tokenize;
use crate::vector::{tf_weight, NORM_EPSILON};
use crate::{DocId, Document};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One ranked search result, as handed to the UI and the verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDoc {
    pub doc_id: DocId,
    pub title: String,
    pub content: String,
    pub source: String,
    pub score: f64,
    /// Lexical relevance before weighting.
    pub text_score: f64,
    /// Weighted authority + hub + log-degree contribution.
    pub graph_score: f64,
    pub url: String,
    pub publish_date: String,
}

struct Scored {
    doc_id: DocId,
    score: f64,
    text_score: f64,
    graph_score: f64,
}

/// Read-only view over a built index, graph and document store.
pub struct RankingEngine {
    index: InvertedIndex,
    graph: WebGraph,
    docs: HashMap<DocId, Document>,
    config: RankingConfig,
}

impl RankingEngine {
    pub fn new(mut index: InvertedIndex, graph: WebGraph, docs: HashMap<DocId, Document>, config: RankingConfig) -> Self {
        if !index.is_finalized() {
            index.finalize();
        }
        Self { index, graph, docs, config }
    }

    /// Load a built snapshot. Index and graph are required; the document store is not.
    pub fn load(paths: &ArtifactPaths, config: RankingConfig) -> Result<Self> {
        let index = InvertedIndex::load(&paths.index()).context("loading inverted index")?;
        let graph = WebGraph::load(&paths.graph()).context("loading web graph")?;
        let docs = match load_docs(paths) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "document store unavailable; results will carry ids and scores only");
                HashMap::new()
            }
        };
        match load_meta(paths) {
            Ok(meta) => {
                if meta.version != FORMAT_VERSION {
                    tracing::warn!(found = meta.version, expected = FORMAT_VERSION, "snapshot format version differs");
                }
                tracing::info!(created_at = %meta.created_at, edges = meta.num_edges, "snapshot metadata");
            }
            Err(e) => tracing::debug!(error = %e, "no snapshot metadata"),
        }
        tracing::info!(num_docs = index.num_docs(), nodes = graph.node_count(), stored = docs.len(), "ranking engine ready");
        Ok(Self::new(index, graph, docs, config))
    }

    pub fn index(&self) -> &InvertedIndex { &self.index }

    pub fn graph(&self) -> &WebGraph { &self.graph }

    pub fn config(&self) -> &RankingConfig { &self.config }

    pub fn document(&self, doc_id: &str) -> Option<&Document> { self.docs.get(doc_id) }

    /// Cosine between the query's TF-IDF vector and each matching document's.
    fn cosine_scores(&self, terms: &[String]) -> HashMap<DocId, f64> {
        let mut q_tf: HashMap<&str, u32> = HashMap::new();
        for t in terms {
            *q_tf.entry(t.as_str()).or_insert(0) += 1;
        }
        let q_weights: Vec<(&str, f64, f64)> = q_tf
            .into_iter()
            .filter_map(|(term, tf)| {
                let idf = self.index.idf(term);
                (idf > 0.0).then(|| (term, tf_weight(tf) * idf, idf))
            })
            .collect();
        let q_norm = q_weights.iter().map(|(_, w, _)| w * w).sum::<f64>().sqrt();
        if q_norm < NORM_EPSILON {
            return HashMap::new();
        }

        let mut dots: HashMap<DocId, f64> = HashMap::new();
        for (term, w_q, idf) in &q_weights {
            if let Some(plist) = self.index.postings(term) {
                for (doc_id, p) in plist {
                    *dots.entry(doc_id.clone()).or_insert(0.0) += w_q * tf_weight(p.tf) * idf;
                }
            }
        }
        dots.into_iter()
            .map(|(doc_id, dot)| {
                let cos = dot / (q_norm * self.index.doc_norm(&doc_id));
                (doc_id, cos)
            })
            .collect()
    }

    /// Summed raw tf over query terms, scaled by the best candidate.
    fn term_frequency_scores(&self, terms: &[String]) -> HashMap<DocId, f64> {
        let mut sums: HashMap<DocId, f64> = HashMap::new();
        for t in terms {
            if let Some(plist) = self.index.postings(t) {
                for (doc_id, p) in plist {
                    *sums.entry(doc_id.clone()).or_insert(0.0) += p.tf as f64;
                }
            }
        }
        let max = sums.values().copied().fold(0.0, f64::max);
        if max <= 0.0 {
            return HashMap::new();
        }
        sums.into_iter().map(|(d, s)| (d, s / max)).collect()
    }

    /// (authority, hub, ln(1 + in + out)); zeros for documents outside the graph.
    pub fn graph_signals(&self, doc_id: &str) -> (f64, f64, f64) {
        let deg = self.graph.degree(doc_id).total() as f64;
        (self.graph.authority(doc_id), self.graph.hub(doc_id), deg.ln_1p())
    }

    fn score(&self, query: &str, top_k: usize) -> Vec<Scored> {
        if top_k == 0 {
            return Vec::new();
        }
        let terms = tokenize(query);
        if terms.is_empty() {
            return Vec::new();
        }
        let lexical = match self.config.lexical {
            LexicalScoring::Cosine => self.cosine_scores(&terms),
            LexicalScoring::TermFrequency => self.term_frequency_scores(&terms),
        };

        let w = &self.config.weights;
        let mut scored: Vec<Scored> = lexical
            .into_iter()
            .map(|(doc_id, text_score)| {
                let (a, h, d) = self.graph_signals(&doc_id);
                let graph_score = w.beta * a + w.gamma * h + w.delta * d;
                Scored { score: w.alpha * text_score + graph_score, doc_id, text_score, graph_score }
            })
            .filter(|s| self.config.min_score <= 0.0 || s.score > self.config.min_score)
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.doc_id.cmp(&b.doc_id)));
        scored.truncate(top_k);
        tracing::debug!(query, terms = terms.len(), hits = scored.len(), "ranked");
        scored
    }

    /// Top `top_k` (doc_id, final score) pairs.
    pub fn scored(&self, query: &str, top_k: usize) -> Vec<(DocId, f64)> {
        self.score(query, top_k).into_iter().map(|s| (s.doc_id, s.score)).collect()
    }

    /// Top `top_k` results with their stored document fields.
    pub fn rank(&self, query: &str, top_k: usize) -> Vec<RankedDoc> {
        self.score(query, top_k)
            .into_iter()
            .map(|s| {
                let (title, content, source, url, publish_date) = match self.docs.get(&s.doc_id) {
                    Some(d) => (d.title.clone(), d.content.clone(), d.source.clone(), d.url.clone(), d.publish_date.clone()),
                    None => Default::default(),
                };
                RankedDoc {
                    title,
                    content,
                    source,
                    url,
                    publish_date,
                    doc_id: s.doc_id,
                    score: s.score,
                    text_score: s.text_score,
                    graph_score: s.graph_score,
                }
            })
            .collect()
    }
}
