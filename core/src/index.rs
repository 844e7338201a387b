use crate::persist::{load_json, save_json};
use crate::tokenizer::{tokenize, tokenize_with_positions};
use crate::vector::{tf_weight, SparseVector, NORM_EPSILON};
use crate::{DocId, Document};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    #[serde(default)]
    pub tf: u32,
    /// Token offsets of the term inside the document, ascending.
    #[serde(default)]
    pub positions: Vec<u32>,
}

/// Term -> doc -> posting, plus the per-document statistics needed for cosine scoring.
///
/// The idf cache and document norms belong to the instance; any mutation clears
/// them until [`InvertedIndex::finalize`] runs again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvertedIndex {
    postings: HashMap<String, HashMap<DocId, Posting>>,
    doc_lengths: HashMap<DocId, u32>,
    doc_norms: HashMap<DocId, f64>,
    idf: HashMap<String, f64>,
    num_docs: u32,
    finalized: bool,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Rebuild from scratch over `documents` and finalize.
    pub fn build(&mut self, documents: &[Document]) {
        *self = Self::default();
        for doc in documents {
            self.add_document(&doc.id, &doc.text());
        }
        self.finalize();
        tracing::info!(num_docs = self.num_docs, num_terms = self.postings.len(), "inverted index built");
    }

    /// Index one document. A doc_id seen before has its old postings replaced.
    pub fn add_document(&mut self, doc_id: &str, text: &str) {
        if self.doc_lengths.contains_key(doc_id) {
            tracing::debug!(doc_id, "replacing previously indexed document");
            self.remove_document(doc_id);
        }
        self.invalidate();

        let tokens = tokenize_with_positions(text);
        if tokens.is_empty() {
            tracing::debug!(doc_id, "document has no indexable terms");
        }
        self.doc_lengths.insert(doc_id.to_string(), tokens.len() as u32);
        for (term, pos) in tokens {
            let posting = self.postings.entry(term).or_default().entry(doc_id.to_string()).or_default();
            posting.tf += 1;
            posting.positions.push(pos as u32);
        }
        self.num_docs = self.doc_lengths.len() as u32;
    }

    fn remove_document(&mut self, doc_id: &str) {
        self.postings.retain(|_, plist| {
            plist.remove(doc_id);
            !plist.is_empty()
        });
        self.doc_lengths.remove(doc_id);
        self.num_docs = self.doc_lengths.len() as u32;
    }

    fn invalidate(&mut self) {
        self.idf.clear();
        self.doc_norms.clear();
        self.finalized = false;
    }

    /// Fill the idf cache and the per-document TF-IDF norms.
    pub fn finalize(&mut self) {
        let n = self.num_docs as f64;
        self.idf = self
            .postings
            .iter()
            .map(|(term, plist)| (term.clone(), ((n + 1.0) / (plist.len() as f64 + 1.0)).ln() + 1.0))
            .collect();

        let mut sq: HashMap<&str, Vec<f64>> = HashMap::with_capacity(self.doc_lengths.len());
        for (term, plist) in &self.postings {
            let idf = self.idf[term];
            for (doc_id, p) in plist {
                let w = tf_weight(p.tf) * idf;
                sq.entry(doc_id.as_str()).or_default().push(w * w);
            }
        }
        // summed in sorted order so the norm does not depend on hash iteration
        self.doc_norms = self
            .doc_lengths
            .keys()
            .map(|doc_id| {
                let norm = match sq.get_mut(doc_id.as_str()) {
                    Some(parts) => {
                        parts.sort_by(f64::total_cmp);
                        parts.iter().sum::<f64>().sqrt()
                    }
                    None => 0.0,
                };
                (doc_id.clone(), norm.max(NORM_EPSILON))
            })
            .collect();
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool { self.finalized }

    pub fn num_docs(&self) -> u32 { self.num_docs }

    pub fn num_terms(&self) -> usize { self.postings.len() }

    pub fn doc_ids(&self) -> impl Iterator<Item = &DocId> { self.doc_lengths.keys() }

    pub fn terms(&self) -> impl Iterator<Item = &String> { self.postings.keys() }

    pub fn doc_length(&self, doc_id: &str) -> Option<u32> { self.doc_lengths.get(doc_id).copied() }

    /// Cached idf; 0 for terms the index has never seen (or before finalize).
    pub fn idf(&self, term: &str) -> f64 { self.idf.get(term).copied().unwrap_or(0.0) }

    /// Norm of the document's TF-IDF vector, never below the epsilon floor.
    pub fn doc_norm(&self, doc_id: &str) -> f64 {
        self.doc_norms.get(doc_id).copied().unwrap_or(NORM_EPSILON)
    }

    pub fn postings(&self, term: &str) -> Option<&HashMap<DocId, Posting>> { self.postings.get(term) }

    /// doc_id -> tf for `term`; empty for unknown terms.
    pub fn search_postings(&self, term: &str) -> HashMap<DocId, u32> {
        self.postings
            .get(term)
            .map(|plist| plist.iter().map(|(d, p)| (d.clone(), p.tf)).collect())
            .unwrap_or_default()
    }

    pub fn positions(&self, term: &str, doc_id: &str) -> &[u32] {
        self.postings
            .get(term)
            .and_then(|plist| plist.get(doc_id))
            .map(|p| p.positions.as_slice())
            .unwrap_or(&[])
    }

    /// TF-IDF weight of `term` in `doc_id`.
    pub fn weight(&self, term: &str, doc_id: &str) -> f64 {
        let tf = self.postings.get(term).and_then(|plist| plist.get(doc_id)).map_or(0, |p| p.tf);
        tf_weight(tf) * self.idf(term)
    }

    /// TF-IDF vector of arbitrary text under this index's idf. Unknown terms are dropped.
    pub fn vectorize(&self, text: &str) -> SparseVector {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for term in tokenize(text) {
            *counts.entry(term).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .filter_map(|(term, tf)| {
                let idf = self.idf(&term);
                (idf > 0.0).then(|| (term, tf_weight(tf) * idf))
            })
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_json(path, &IndexFile::from(self))?;
        tracing::info!(path = %path.display(), num_terms = self.postings.len(), "index saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file: IndexFile = load_json(path)?;
        let index = Self::from(file);
        tracing::info!(path = %path.display(), num_docs = index.num_docs, num_terms = index.postings.len(), "index loaded");
        Ok(index)
    }
}

/// On-disk shape. Older files store a bare tf per posting and omit the caches.
#[derive(Serialize, Deserialize)]
struct IndexFile {
    index: BTreeMap<String, BTreeMap<String, PostingRepr>>,
    #[serde(default)]
    doc_lengths: BTreeMap<String, u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    doc_norms: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    idf: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    num_docs: Option<u32>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PostingRepr {
    Full(Posting),
    Count(u32),
}

impl From<&InvertedIndex> for IndexFile {
    fn from(ix: &InvertedIndex) -> Self {
        let index = ix
            .postings
            .iter()
            .map(|(term, plist)| {
                let plist = plist.iter().map(|(d, p)| (d.clone(), PostingRepr::Full(p.clone()))).collect();
                (term.clone(), plist)
            })
            .collect();
        IndexFile {
            index,
            doc_lengths: ix.doc_lengths.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            doc_norms: ix.finalized.then(|| ix.doc_norms.iter().map(|(k, v)| (k.clone(), *v)).collect()),
            idf: ix.finalized.then(|| ix.idf.iter().map(|(k, v)| (k.clone(), *v)).collect()),
            num_docs: Some(ix.num_docs),
        }
    }
}

impl From<IndexFile> for InvertedIndex {
    fn from(file: IndexFile) -> Self {
        let mut ix = InvertedIndex::default();
        for (term, plist) in file.index {
            let plist: HashMap<DocId, Posting> = plist
                .into_iter()
                .map(|(d, repr)| {
                    let p = match repr {
                        PostingRepr::Full(mut p) => {
                            if p.tf == 0 {
                                p.tf = p.positions.len() as u32;
                            }
                            p
                        }
                        PostingRepr::Count(tf) => Posting { tf, positions: Vec::new() },
                    };
                    (d, p)
                })
                .filter(|(_, p)| p.tf > 0)
                .collect();
            if !plist.is_empty() {
                ix.postings.insert(term, plist);
            }
        }
        ix.doc_lengths = file.doc_lengths.into_iter().collect();

        // every posted document needs a length entry
        let mut missing: HashMap<DocId, u32> = HashMap::new();
        for plist in ix.postings.values() {
            for (d, p) in plist {
                if !ix.doc_lengths.contains_key(d) {
                    *missing.entry(d.clone()).or_insert(0) += p.tf;
                }
            }
        }
        if !missing.is_empty() {
            tracing::warn!(count = missing.len(), "index file lacks doc_lengths for posted documents; deriving from tf");
            ix.doc_lengths.extend(missing);
        }

        ix.num_docs = file.num_docs.unwrap_or(0).max(ix.doc_lengths.len() as u32);
        match (file.idf, file.doc_norms) {
            (Some(idf), Some(norms)) => {
                ix.idf = idf.into_iter().collect();
                ix.doc_norms = norms.into_iter().map(|(k, v)| (k, v.max(NORM_EPSILON))).collect();
                for d in ix.doc_lengths.keys() {
                    ix.doc_norms.entry(d.clone()).or_insert(NORM_EPSILON);
                }
                ix.finalized = true;
            }
            _ => ix.finalize(),
        }
        ix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_adding_a_doc_replaces_counts() {
        let mut ix = InvertedIndex::new();
        ix.add_document("1", "news news");
        ix.add_document("1", "news");
        ix.finalize();
        assert_eq!(ix.search_postings("news").get("1"), Some(&1));
        assert_eq!(ix.num_docs(), 1);
    }

    #[test]
    fn mutation_clears_caches() {
        let mut ix = InvertedIndex::new();
        ix.add_document("1", "alpha");
        ix.finalize();
        assert!(ix.idf("alpha") > 0.0);
        ix.add_document("2", "beta");
        assert!(!ix.is_finalized());
        assert_eq!(ix.idf("alpha"), 0.0);
    }

    #[test]
    fn legacy_file_shape_loads() {
        let json = r#"{"index": {"tehran": {"0": 2, "1": 1}}, "doc_lengths": {"0": 3, "1": 4}, "num_docs": 2}"#;
        let file: IndexFile = serde_json::from_str(json).unwrap();
        let ix = InvertedIndex::from(file);
        assert!(ix.is_finalized());
        assert_eq!(ix.search_postings("tehran").get("0"), Some(&2));
        assert!(ix.positions("tehran", "0").is_empty());
        let expected = (3.0f64 / 3.0).ln() + 1.0;
        assert!((ix.idf("tehran") - expected).abs() < 1e-12);
    }

    #[test]
    fn missing_doc_lengths_are_derived() {
        let json = r#"{"index": {"x": {"a": {"tf": 2, "positions": [0, 4]}}}}"#;
        let file: IndexFile = serde_json::from_str(json).unwrap();
        let ix = InvertedIndex::from(file);
        assert_eq!(ix.doc_length("a"), Some(2));
        assert_eq!(ix.num_docs(), 1);
        assert_eq!(ix.positions("x", "a"), &[0, 4]);
    }

    #[test]
    fn tf_defaults_to_position_count() {
        let json = r#"{"index": {"x": {"a": {"positions": [0, 4]}, "b": {}}}, "doc_lengths": {"a": 5}}"#;
        let file: IndexFile = serde_json::from_str(json).unwrap();
        let ix = InvertedIndex::from(file);
        assert_eq!(ix.search_postings("x").get("a"), Some(&2));
        // neither tf nor positions: nothing to index
        assert!(!ix.search_postings("x").contains_key("b"));
        assert_eq!(ix.doc_length("b"), None);
    }
}
