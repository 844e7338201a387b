use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Static engine configuration, optionally read from a TOML file.
///
/// Every field has a default so a partial file (or none at all) is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub graph: GraphConfig,
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: EngineConfig = toml::from_str(s).context("parsing engine config")?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&s).with_context(|| format!("in {}", path.display()))
    }

    /// Load from `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

/// Linear fusion coefficients. They need not sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankWeights {
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_beta")]
    pub beta: f64,
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    #[serde(default = "default_delta")]
    pub delta: f64,
}

fn default_alpha() -> f64 { 0.6 }
fn default_beta() -> f64 { 0.2 }
fn default_gamma() -> f64 { 0.1 }
fn default_delta() -> f64 { 0.1 }

impl Default for RankWeights {
    fn default() -> Self {
        Self { alpha: default_alpha(), beta: default_beta(), gamma: default_gamma(), delta: default_delta() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LexicalScoring {
    /// Cosine between query and document TF-IDF vectors.
    #[default]
    Cosine,
    /// Summed raw tf over query terms, divided by the best candidate's sum.
    TermFrequency,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default)]
    pub weights: RankWeights,
    #[serde(default)]
    pub lexical: LexicalScoring,
    /// Candidates must score strictly above this to be returned (ignored when 0).
    #[serde(default)]
    pub min_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_true")]
    pub similarity_edges: bool,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_similarity_k")]
    pub similarity_k: usize,
    /// Documents need strictly more content characters than this to get similarity edges.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
    #[serde(default = "default_damping")]
    pub damping: f64,
    #[serde(default = "default_pagerank_max_iter")]
    pub pagerank_max_iter: usize,
    #[serde(default = "default_hits_max_iter")]
    pub hits_max_iter: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_true() -> bool { true }
fn default_similarity_threshold() -> f64 { 0.3 }
fn default_similarity_k() -> usize { 5 }
fn default_min_content_chars() -> usize { 50 }
fn default_damping() -> f64 { 0.85 }
fn default_pagerank_max_iter() -> usize { 100 }
fn default_hits_max_iter() -> usize { 50 }
fn default_tolerance() -> f64 { 1e-6 }

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            similarity_edges: default_true(),
            similarity_threshold: default_similarity_threshold(),
            similarity_k: default_similarity_k(),
            min_content_chars: default_min_content_chars(),
            damping: default_damping(),
            pagerank_max_iter: default_pagerank_max_iter(),
            hits_max_iter: default_hits_max_iter(),
            tolerance: default_tolerance(),
        }
    }
}
