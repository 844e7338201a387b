use crate::{DocId, Document};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: usize,
    pub num_edges: usize,
    pub created_at: String,
    pub version: u32,
}

/// Layout of one built corpus snapshot on disk.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub root: PathBuf,
}

impl ArtifactPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn index(&self) -> PathBuf { self.root.join("index.json") }
    pub fn graph(&self) -> PathBuf { self.root.join("graph.json") }
    pub fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
    }
    Ok(())
}

pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer(&mut w, value).with_context(|| format!("writing {}", path.display()))?;
    w.flush()?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let value = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}

pub fn save_docs(paths: &ArtifactPaths, docs: &HashMap<DocId, Document>) -> Result<()> {
    let path = paths.docs();
    ensure_parent(&path)?;
    let mut f = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let bytes = bincode::serialize(docs)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_docs(paths: &ArtifactPaths) -> Result<HashMap<DocId, Document>> {
    let path = paths.docs();
    let mut f = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let docs = bincode::deserialize(&buf).with_context(|| format!("decoding {}", path.display()))?;
    Ok(docs)
}

pub fn save_meta(paths: &ArtifactPaths, meta: &MetaFile) -> Result<()> {
    let path = paths.meta();
    ensure_parent(&path)?;
    let mut f = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes()).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn load_meta(paths: &ArtifactPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let mut f = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf).with_context(|| format!("parsing {}", path.display()))?;
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docs_store_survives_bincode() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path().join("nested"));
        let mut docs = HashMap::new();
        docs.insert(
            "1".to_string(),
            Document {
                id: "1".into(),
                url: "https://www.isna.ir/news/1".into(),
                title: "عنوان".into(),
                content: "متن خبر".into(),
                outgoing_links: vec!["https://www.isna.ir/news/2".into()],
                source: "isna".into(),
                publish_date: "1402/01/01".into(),
            },
        );
        save_docs(&paths, &docs).unwrap();
        assert_eq!(load_docs(&paths).unwrap(), docs);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        assert!(load_docs(&paths).is_err());
        assert!(load_json::<serde_json::Value>(&paths.index()).is_err());
    }

    #[test]
    fn meta_round_trips_and_names_the_file_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path().join("snap"));
        let err = load_meta(&paths).unwrap_err();
        assert!(format!("{err:#}").contains("meta.json"));

        let meta = MetaFile {
            num_docs: 3,
            num_terms: 12,
            num_edges: 2,
            created_at: "2024-03-01T08:30:00Z".into(),
            version: FORMAT_VERSION,
        };
        save_meta(&paths, &meta).unwrap();
        assert_eq!(load_meta(&paths).unwrap(), meta);
    }
}
