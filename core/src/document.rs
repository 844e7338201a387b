use crate::DocId;
use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A normalized news document, as consumed by the index and graph builders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub url: String,
    pub title: String,
    pub content: String,
    pub outgoing_links: Vec<String>,
    pub source: String,
    pub publish_date: String,
}

impl Document {
    /// Title and content joined the way both the index and the graph see them.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }
}

/// Loosely-typed record as produced by the crawler/cleaner.
#[derive(Debug, Deserialize)]
struct InputDoc {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    outgoing_links: Option<Vec<String>>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    publish_date: Option<String>,
}

lazy_static! {
    static ref CONTROL: Regex = Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").expect("valid regex");
    static ref SPACES: Regex = Regex::new(r"[ \t]+").expect("valid regex");
    static ref BLANK_LINES: Regex = Regex::new(r"\n\s*\n+").expect("valid regex");
}

/// Remove control characters and collapse whitespace runs. Idempotent.
pub fn clean_text(text: &str) -> String {
    let s = CONTROL.replace_all(text, "");
    let s = SPACES.replace_all(&s, " ");
    let s = BLANK_LINES.replace_all(&s, "\n\n");
    s.trim().to_string()
}

/// Accept string ids and integer ids; anything else is not an id.
fn normalize_id(v: &serde_json::Value) -> Option<DocId> {
    match v {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) if n.is_u64() || n.is_i64() => Some(n.to_string()),
        _ => None,
    }
}

/// Accumulates documents while enforcing id and URL uniqueness.
#[derive(Default)]
pub struct Corpus {
    docs: Vec<Document>,
    seen_ids: HashSet<DocId>,
    seen_urls: HashSet<String>,
}

impl Corpus {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    pub fn into_documents(self) -> Vec<Document> { self.docs }

    /// Ingest one raw JSON record. Returns whether it was kept.
    pub fn push_value(&mut self, value: serde_json::Value, default_source: &str) -> bool {
        let raw: InputDoc = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed document");
                return false;
            }
        };
        let Some(id) = raw.id.as_ref().and_then(normalize_id) else {
            tracing::warn!(url = raw.url.as_deref().unwrap_or(""), "skipping document without a usable id");
            return false;
        };
        let source = raw.source.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| default_source.to_string());
        let doc = Document {
            id,
            url: raw.url.unwrap_or_default().trim().to_string(),
            title: clean_text(raw.title.as_deref().unwrap_or("")),
            content: clean_text(raw.content.as_deref().unwrap_or("")),
            outgoing_links: raw.outgoing_links.unwrap_or_default(),
            source,
            publish_date: raw.publish_date.unwrap_or_default(),
        };
        self.push(doc)
    }

    /// Add an already-typed document. Duplicate ids and duplicate non-empty URLs are no-ops.
    pub fn push(&mut self, doc: Document) -> bool {
        if self.seen_ids.contains(&doc.id) {
            tracing::warn!(doc_id = %doc.id, "duplicate document id, keeping first");
            return false;
        }
        if !doc.url.is_empty() && !self.seen_urls.insert(doc.url.clone()) {
            tracing::debug!(url = %doc.url, "duplicate url, skipping");
            return false;
        }
        self.seen_ids.insert(doc.id.clone());
        self.docs.push(doc);
        true
    }

    pub fn load_json(&mut self, file: &Path) -> Result<()> {
        let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
        let json: serde_json::Value = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parsing {}", file.display()))?;
        let source = source_hint(file);
        match json {
            serde_json::Value::Array(arr) => {
                for v in arr {
                    self.push_value(v, &source);
                }
            }
            v @ serde_json::Value::Object(_) => {
                self.push_value(v, &source);
            }
            _ => tracing::warn!(file = %file.display(), "expected a JSON array or object"),
        }
        Ok(())
    }

    pub fn load_jsonl(&mut self, file: &Path) -> Result<()> {
        let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
        let source = source_hint(file);
        for (lineno, line) in BufReader::new(f).lines().enumerate() {
            let line = line.with_context(|| format!("reading {}", file.display()))?;
            if line.trim().is_empty() { continue; }
            match serde_json::from_str::<serde_json::Value>(&line) {
                Ok(v) => { self.push_value(v, &source); }
                Err(e) => tracing::warn!(file = %file.display(), line = lineno + 1, error = %e, "skipping unparsable line"),
            }
        }
        Ok(())
    }

    /// Load a `.json` / `.jsonl` file, or every such file under a directory in path order.
    pub fn load_path(&mut self, input: &Path) -> Result<()> {
        for file in corpus_files(input)? {
            if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                self.load_jsonl(&file)?;
            } else {
                self.load_json(&file)?;
            }
        }
        Ok(())
    }
}

fn source_hint(file: &Path) -> String {
    file.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string()
}

fn corpus_files(input: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        anyhow::bail!("corpus path {} does not exist", input.display());
    }
    Ok(files)
}

/// Load and normalize a document collection from a file or directory.
pub fn load_corpus(input: &Path) -> Result<Vec<Document>> {
    let mut corpus = Corpus::new();
    corpus.load_path(input)?;
    tracing::info!(num_docs = corpus.len(), input = %input.display(), "corpus loaded");
    Ok(corpus.into_documents())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_and_string_ids_normalize() {
        let mut c = Corpus::new();
        assert!(c.push_value(json!({"id": 7, "url": "u1", "title": "t"}), "src"));
        assert!(c.push_value(json!({"id": "abc", "url": "u2"}), "src"));
        let docs = c.into_documents();
        assert_eq!(docs[0].id, "7");
        assert_eq!(docs[1].id, "abc");
    }

    #[test]
    fn missing_or_bad_id_is_skipped() {
        let mut c = Corpus::new();
        assert!(!c.push_value(json!({"url": "u1"}), "src"));
        assert!(!c.push_value(json!({"id": 1.5, "url": "u2"}), "src"));
        assert!(!c.push_value(json!({"id": "", "url": "u3"}), "src"));
        assert!(!c.push_value(json!({"id": "x", "title": 3}), "src"));
        assert!(c.is_empty());
    }

    #[test]
    fn duplicate_url_and_id_are_noops() {
        let mut c = Corpus::new();
        assert!(c.push_value(json!({"id": "a", "url": "https://n/1", "title": "first"}), "s"));
        assert!(!c.push_value(json!({"id": "b", "url": "https://n/1", "title": "second"}), "s"));
        assert!(!c.push_value(json!({"id": "a", "url": "https://n/2"}), "s"));
        let docs = c.into_documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "first");
    }

    #[test]
    fn source_falls_back_to_hint() {
        let mut c = Corpus::new();
        c.push_value(json!({"id": "a"}), "isna_clean");
        c.push_value(json!({"id": "b", "source": "tabnak"}), "isna_clean");
        let docs = c.into_documents();
        assert_eq!(docs[0].source, "isna_clean");
        assert_eq!(docs[1].source, "tabnak");
    }

    #[test]
    fn clean_text_strips_controls_and_collapses() {
        assert_eq!(clean_text("  a\u{0007}b \t c\n\n\n\nd  "), "ab c\n\nd");
        let once = clean_text("x  y\n \n z");
        assert_eq!(clean_text(&once), once);
    }
}
