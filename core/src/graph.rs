//! Directed document graph: explicit link edges, content-similarity edges, and
//! the link-authority scores (degree, PageRank, HITS) computed over them.
//!
//! Every score is recomputed wholesale by [`WebGraph::compute_scores`]; nothing
//! is updated incrementally.

use crate::config::GraphConfig;
use crate::index::InvertedIndex;
use crate::persist::{load_json, save_json};
use crate::vector::{dot, l2_norm, SparseVector, NORM_EPSILON};
use crate::{DocId, Document};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degree {
    #[serde(rename = "in")]
    pub in_degree: usize,
    #[serde(rename = "out")]
    pub out_degree: usize,
}

impl Degree {
    pub fn total(&self) -> usize { self.in_degree + self.out_degree }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebGraph {
    nodes: BTreeSet<DocId>,
    outgoing: BTreeMap<DocId, BTreeSet<DocId>>,
    // transpose of `outgoing`, only ever written by `add_edge`/`rebuild_incoming`
    incoming: BTreeMap<DocId, BTreeSet<DocId>>,
    degree: BTreeMap<DocId, Degree>,
    authority: BTreeMap<DocId, f64>,
    hub: BTreeMap<DocId, f64>,
    pagerank: Option<BTreeMap<DocId, f64>>,
}

impl WebGraph {
    pub fn new() -> Self { Self::default() }

    /// Link edges, similarity edges (when enabled), then all scores.
    pub fn build(documents: &[Document], index: &InvertedIndex, cfg: &GraphConfig) -> Self {
        let mut g = Self::new();
        let links = g.add_link_edges(documents);
        let similar = if cfg.similarity_edges {
            g.add_similarity_edges_with_min(documents, index, cfg.similarity_threshold, cfg.similarity_k, cfg.min_content_chars)
        } else {
            0
        };
        g.compute_scores(cfg);
        tracing::info!(nodes = g.nodes.len(), link_edges = links, similarity_edges = similar, "web graph built");
        g
    }

    pub fn add_node(&mut self, doc_id: &str) {
        if !self.nodes.contains(doc_id) {
            self.nodes.insert(doc_id.to_string());
        }
    }

    /// Insert `from -> to`. Self-edges and duplicates are ignored.
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return false;
        }
        self.add_node(from);
        self.add_node(to);
        let inserted = self.outgoing.entry(from.to_string()).or_default().insert(to.to_string());
        if inserted {
            self.incoming.entry(to.to_string()).or_default().insert(from.to_string());
        }
        inserted
    }

    /// Resolve each document's outgoing links through an exact URL -> id map.
    /// Links to URLs outside the collection are dropped.
    pub fn add_link_edges(&mut self, documents: &[Document]) -> usize {
        let url_to_id: HashMap<&str, &str> = documents
            .iter()
            .filter(|d| !d.url.is_empty())
            .map(|d| (d.url.as_str(), d.id.as_str()))
            .collect();

        let mut added = 0;
        let mut dangling = 0;
        for doc in documents {
            self.add_node(&doc.id);
            for link in &doc.outgoing_links {
                match url_to_id.get(link.trim()) {
                    Some(target) => {
                        if self.add_edge(&doc.id, target) {
                            added += 1;
                        }
                    }
                    None => dangling += 1,
                }
            }
        }
        tracing::debug!(added, dangling, "link edges resolved");
        added
    }

    pub fn add_similarity_edges(&mut self, documents: &[Document], index: &InvertedIndex, threshold: f64, k: usize) -> usize {
        let min = GraphConfig::default().min_content_chars;
        self.add_similarity_edges_with_min(documents, index, threshold, k, min)
    }

    /// Connect each sufficiently long document to its `k` most similar peers
    /// whose TF-IDF cosine exceeds `threshold`.
    pub fn add_similarity_edges_with_min(
        &mut self,
        documents: &[Document],
        index: &InvertedIndex,
        threshold: f64,
        k: usize,
        min_content_chars: usize,
    ) -> usize {
        if k == 0 {
            return 0;
        }
        let vectors: Vec<(&DocId, SparseVector, f64)> = documents
            .iter()
            .filter(|d| d.content.chars().count() > min_content_chars)
            .map(|d| {
                let v = index.vectorize(&d.text());
                let n = l2_norm(&v);
                (&d.id, v, n)
            })
            .filter(|(_, _, n)| *n > NORM_EPSILON)
            .collect();

        let mut added = 0;
        for (i, (id_a, va, na)) in vectors.iter().enumerate() {
            self.add_node(id_a);
            let mut candidates: Vec<(f64, &DocId)> = vectors
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, (id_b, vb, nb))| (dot(va, vb) / (na * nb), *id_b))
                .filter(|(sim, _)| *sim > threshold)
                .collect();
            candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
            for (_, id_b) in candidates.into_iter().take(k) {
                if self.add_edge(id_a, id_b) {
                    added += 1;
                }
            }
        }
        tracing::debug!(qualifying = vectors.len(), added, "similarity edges added");
        added
    }

    /// Re-derive `incoming` from `outgoing`.
    fn rebuild_incoming(&mut self) {
        self.incoming.clear();
        for (src, targets) in &self.outgoing {
            for dst in targets {
                self.incoming.entry(dst.clone()).or_default().insert(src.clone());
            }
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DocId> { self.nodes.iter() }

    pub fn node_count(&self) -> usize { self.nodes.len() }

    pub fn edge_count(&self) -> usize { self.outgoing.values().map(|s| s.len()).sum() }

    pub fn contains_node(&self, doc_id: &str) -> bool { self.nodes.contains(doc_id) }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.outgoing.get(from).is_some_and(|s| s.contains(to))
    }

    pub fn outgoing(&self, doc_id: &str) -> impl Iterator<Item = &DocId> {
        self.outgoing.get(doc_id).into_iter().flatten()
    }

    pub fn incoming(&self, doc_id: &str) -> impl Iterator<Item = &DocId> {
        self.incoming.get(doc_id).into_iter().flatten()
    }

    fn out_len(&self, doc_id: &str) -> usize { self.outgoing.get(doc_id).map_or(0, |s| s.len()) }

    fn in_len(&self, doc_id: &str) -> usize { self.incoming.get(doc_id).map_or(0, |s| s.len()) }

    /// In/out edge counts, straight from the edge sets.
    pub fn degree(&self, doc_id: &str) -> Degree {
        Degree { in_degree: self.in_len(doc_id), out_degree: self.out_len(doc_id) }
    }

    /// Power iteration from the uniform vector. Dangling nodes leak their mass.
    pub fn pagerank(&self, damping: f64, max_iter: usize, tol: f64) -> BTreeMap<DocId, f64> {
        let n = self.nodes.len();
        if n == 0 {
            return BTreeMap::new();
        }
        let nf = n as f64;
        let base = (1.0 - damping) / nf;
        let mut score: BTreeMap<DocId, f64> = self.nodes.iter().map(|id| (id.clone(), 1.0 / nf)).collect();

        for iter in 0..max_iter {
            let next: BTreeMap<DocId, f64> = self
                .nodes
                .iter()
                .map(|id| {
                    let inflow: f64 = self
                        .incoming(id)
                        .map(|m| score[m] / self.out_len(m) as f64)
                        .sum();
                    (id.clone(), base + damping * inflow)
                })
                .collect();
            let delta: f64 = next.iter().map(|(id, v)| (v - score[id]).abs()).sum();
            score = next;
            if delta < tol {
                tracing::debug!(iterations = iter + 1, delta, "pagerank converged");
                break;
            }
        }
        score
    }

    /// Mutually reinforcing authority/hub scores, each L2-normalized per iteration.
    pub fn hits(&self, max_iter: usize, tol: f64) -> (BTreeMap<DocId, f64>, BTreeMap<DocId, f64>) {
        let n = self.nodes.len();
        if n == 0 {
            return (BTreeMap::new(), BTreeMap::new());
        }
        let init = 1.0 / (n as f64).sqrt();
        let mut auth: BTreeMap<DocId, f64> = self.nodes.iter().map(|id| (id.clone(), init)).collect();
        let mut hub = auth.clone();

        for iter in 0..max_iter {
            let mut new_auth: BTreeMap<DocId, f64> = self
                .nodes
                .iter()
                .map(|id| (id.clone(), self.incoming(id).map(|m| hub[m]).sum::<f64>()))
                .collect();
            normalize_l2(&mut new_auth);
            let mut new_hub: BTreeMap<DocId, f64> = self
                .nodes
                .iter()
                .map(|id| (id.clone(), self.outgoing(id).map(|t| new_auth[t]).sum::<f64>()))
                .collect();
            normalize_l2(&mut new_hub);

            let delta: f64 = new_auth.iter().map(|(id, v)| (v - auth[id]).abs()).sum();
            auth = new_auth;
            hub = new_hub;
            if delta < tol {
                tracing::debug!(iterations = iter + 1, delta, "hits converged");
                break;
            }
        }
        (auth, hub)
    }

    /// Recompute degree, PageRank, authority and hub for every node.
    pub fn compute_scores(&mut self, cfg: &GraphConfig) {
        self.degree = self.nodes.iter().map(|id| (id.clone(), self.degree(id))).collect();
        self.pagerank = Some(self.pagerank(cfg.damping, cfg.pagerank_max_iter, cfg.tolerance));
        let (authority, hub) = self.hits(cfg.hits_max_iter, cfg.tolerance);
        self.authority = authority;
        self.hub = hub;
    }

    /// Stored authority; 0 for unknown nodes.
    pub fn authority(&self, doc_id: &str) -> f64 { self.authority.get(doc_id).copied().unwrap_or(0.0) }

    pub fn hub(&self, doc_id: &str) -> f64 { self.hub.get(doc_id).copied().unwrap_or(0.0) }

    pub fn pagerank_score(&self, doc_id: &str) -> f64 {
        self.pagerank.as_ref().and_then(|p| p.get(doc_id)).copied().unwrap_or(0.0)
    }

    /// Stored degree (as of the last `compute_scores`); zero for unknown nodes.
    pub fn stored_degree(&self, doc_id: &str) -> Degree { self.degree.get(doc_id).copied().unwrap_or_default() }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_json(path, &GraphFile::from(self))?;
        tracing::info!(path = %path.display(), nodes = self.nodes.len(), edges = self.edge_count(), "graph saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file: GraphFile = load_json(path)?;
        let g = Self::from(file);
        tracing::info!(path = %path.display(), nodes = g.nodes.len(), edges = g.edge_count(), "graph loaded");
        Ok(g)
    }
}

fn normalize_l2(v: &mut BTreeMap<DocId, f64>) {
    let norm = v.values().map(|x| x * x).sum::<f64>().sqrt();
    if norm > NORM_EPSILON {
        for x in v.values_mut() {
            *x /= norm;
        }
    }
}

#[derive(Serialize, Deserialize)]
struct GraphFile {
    #[serde(default)]
    nodes: Vec<DocId>,
    #[serde(default)]
    outgoing: BTreeMap<DocId, Vec<DocId>>,
    #[serde(default)]
    incoming: BTreeMap<DocId, Vec<DocId>>,
    #[serde(default)]
    degree: BTreeMap<DocId, Degree>,
    #[serde(default)]
    authority: BTreeMap<DocId, f64>,
    #[serde(default)]
    hub: BTreeMap<DocId, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pagerank: Option<BTreeMap<DocId, f64>>,
}

impl From<&WebGraph> for GraphFile {
    fn from(g: &WebGraph) -> Self {
        let lists = |m: &BTreeMap<DocId, BTreeSet<DocId>>| -> BTreeMap<DocId, Vec<DocId>> {
            m.iter().map(|(k, v)| (k.clone(), v.iter().cloned().collect())).collect()
        };
        GraphFile {
            nodes: g.nodes.iter().cloned().collect(),
            outgoing: lists(&g.outgoing),
            incoming: lists(&g.incoming),
            degree: g.degree.clone(),
            authority: g.authority.clone(),
            hub: g.hub.clone(),
            pagerank: g.pagerank.clone(),
        }
    }
}

impl From<GraphFile> for WebGraph {
    fn from(file: GraphFile) -> Self {
        let mut g = WebGraph::new();
        for id in &file.nodes {
            g.add_node(id);
        }
        for (src, targets) in &file.outgoing {
            g.add_node(src);
            for dst in targets {
                g.add_edge(src, dst);
            }
        }
        // incoming is derived; the stored copy is only informational
        g.rebuild_incoming();
        g.degree = g.nodes.iter().map(|id| (id.clone(), g.degree(id))).collect();
        g.authority = file.authority;
        g.hub = file.hub;
        g.pagerank = file.pagerank;
        g
    }
}
