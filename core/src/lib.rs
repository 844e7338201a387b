pub mod config;
pub mod document;
pub mod graph;
pub mod hybrid;
pub mod index;
pub mod persist;
pub mod ranking;
pub mod tokenizer;
pub mod vector;

/// Document identifiers are normalized to strings at the ingestion boundary,
/// whatever type the corpus used for them.
pub type DocId = String;

pub use config::{EngineConfig, GraphConfig, LexicalScoring, RankWeights, RankingConfig};
pub use document::Document;
pub use graph::{Degree, WebGraph};
pub use hybrid::{hybrid_retrieve, merge_by_score_sum, PrecomputedRanking, SemanticRanker};
pub use index::{InvertedIndex, Posting};
pub use ranking::{RankedDoc, RankingEngine};
