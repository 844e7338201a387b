use anyhow::anyhow;
use khabar_core::config::{GraphConfig, RankingConfig};
use khabar_core::hybrid::{hybrid_retrieve, PrecomputedRanking, SemanticRanker};
use khabar_core::persist::{save_docs, ArtifactPaths};
use khabar_core::{DocId, Document, InvertedIndex, RankingEngine, WebGraph};
use std::collections::HashMap;

fn doc(id: &str, title: &str, content: &str, links: &[&str]) -> Document {
    Document {
        id: id.into(),
        url: format!("https://www.tabnak.ir/fa/news/{id}"),
        title: title.into(),
        content: content.into(),
        outgoing_links: links.iter().map(|l| format!("https://www.tabnak.ir/fa/news/{l}")).collect(),
        source: "tabnak".into(),
        publish_date: "1402-05-01".into(),
    }
}

fn engine_for(docs: &[Document]) -> RankingEngine {
    let mut index = InvertedIndex::new();
    index.build(docs);
    let graph = WebGraph::build(docs, &index, &GraphConfig::default());
    let store: HashMap<DocId, Document> = docs.iter().map(|d| (d.id.clone(), d.clone())).collect();
    RankingEngine::new(index, graph, store, RankingConfig::default())
}

#[test]
fn tehran_example_returns_both_documents() {
    let docs = vec![
        doc("A", "", "تهران شهر بزرگ است", &[]),
        doc("B", "", "تهران پایتخت ایران است", &[]),
    ];
    let engine = engine_for(&docs);
    let results = engine.rank("تهران", 10);

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.score > 0.0 && r.text_score > 0.0));
    assert!((results[0].text_score - results[1].text_score).abs() < 1e-12);
    // equal everywhere, so the id decides
    assert_eq!(results[0].doc_id, "A");
    assert_eq!(results[1].doc_id, "B");
    assert_eq!(results[0].source, "tabnak");
    assert_eq!(results[0].content, "تهران شهر بزرگ است");
}

#[test]
fn authority_breaks_lexical_ties() {
    let docs = vec![
        doc("A", "", "تهران شهر بزرگ است", &[]),
        doc("B", "", "تهران پایتخت ایران است", &[]),
        doc("C", "", "اقتصاد", &["B"]),
    ];
    let engine = engine_for(&docs);
    let results = engine.rank("تهران", 10);
    assert_eq!(results[0].doc_id, "B");
    assert!(results[0].graph_score > results[1].graph_score);
}

#[test]
fn empty_and_unknown_queries_return_nothing() {
    let engine = engine_for(&[doc("A", "", "تهران شهر بزرگ است", &[])]);
    assert!(engine.rank("", 10).is_empty());
    assert!(engine.rank("   ", 10).is_empty());
    assert!(engine.rank("است و در", 10).is_empty());
    assert!(engine.rank("شیراز", 10).is_empty());
}

#[test]
fn never_returns_documents_without_a_matching_term() {
    // "hub" and "star" carry strong graph signals but never mention the query
    let docs = vec![
        doc("hub", "", "اخبار روز", &["star", "x"]),
        doc("star", "", "ورزش", &["hub"]),
        doc("x", "", "قیمت نفت", &["star"]),
        doc("y", "", "نفت و گاز", &[]),
    ];
    let engine = engine_for(&docs);
    let results = engine.rank("نفت", 10);
    let ids: Vec<&str> = results.iter().map(|r| r.doc_id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"x") && ids.contains(&"y"));
    for r in &results {
        assert!(engine.index().search_postings("نفت").contains_key(&r.doc_id));
    }
}

#[test]
fn unknown_query_terms_are_ignored() {
    let docs = vec![doc("A", "", "تهران شهر بزرگ است", &[]), doc("B", "", "اصفهان", &[])];
    let engine = engine_for(&docs);
    let plain = engine.scored("تهران", 10);
    let noisy = engine.scored("تهران zzzunknown", 10);
    assert_eq!(plain, noisy);
}

#[test]
fn querying_with_a_document_text_scores_it_as_identical() {
    let text = "نتایج انتخابات شورای شهر اعلام شد";
    let docs = vec![doc("1", "", text, &[]), doc("2", "", "شورای امنیت سازمان ملل", &[])];
    let engine = engine_for(&docs);
    let results = engine.rank(text, 10);
    assert_eq!(results[0].doc_id, "1");
    assert!((results[0].text_score - 1.0).abs() < 1e-9);
}

#[test]
fn top_k_truncates_in_score_order() {
    let docs: Vec<Document> = (0..5)
        .map(|i| doc(&format!("d{i}"), "", &"بورس ".repeat(i + 1), &[]))
        .collect();
    let engine = engine_for(&docs);
    let all = engine.scored("بورس", 10);
    let top2 = engine.scored("بورس", 2);
    assert_eq!(all.len(), 5);
    assert_eq!(top2, all[..2].to_vec());
    assert!(all.windows(2).all(|w| w[0].1 >= w[1].1));
}

#[test]
fn engine_loads_from_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::new(dir.path());
    let docs = vec![
        doc("A", "پایتخت", "تهران شهر بزرگ است", &["B"]),
        doc("B", "", "تهران پایتخت ایران است", &[]),
    ];
    let mut index = InvertedIndex::new();
    index.build(&docs);
    let graph = WebGraph::build(&docs, &index, &GraphConfig::default());
    index.save(&paths.index()).unwrap();
    graph.save(&paths.graph()).unwrap();
    save_docs(&paths, &docs.iter().map(|d| (d.id.clone(), d.clone())).collect()).unwrap();

    let engine = RankingEngine::load(&paths, RankingConfig::default()).unwrap();
    let results = engine.rank("پایتخت", 5);
    assert_eq!(results.len(), 2);
    let a = results.iter().find(|r| r.doc_id == "A").unwrap();
    assert_eq!(a.url, "https://www.tabnak.ir/fa/news/A");
    assert_eq!(a.publish_date, "1402-05-01");
}

#[test]
fn engine_without_graph_is_not_ready() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::new(dir.path());
    let mut index = InvertedIndex::new();
    index.build(&[doc("A", "", "تهران", &[])]);
    index.save(&paths.index()).unwrap();
    assert!(RankingEngine::load(&paths, RankingConfig::default()).is_err());
}

#[test]
fn engine_without_doc_store_still_ranks() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::new(dir.path());
    let docs = vec![doc("A", "", "تهران", &[])];
    let mut index = InvertedIndex::new();
    index.build(&docs);
    index.save(&paths.index()).unwrap();
    WebGraph::build(&docs, &index, &GraphConfig::default()).save(&paths.graph()).unwrap();

    let engine = RankingEngine::load(&paths, RankingConfig::default()).unwrap();
    let results = engine.rank("تهران", 5);
    assert_eq!(results.len(), 1);
    assert!(results[0].title.is_empty());
}

struct Failing;

impl SemanticRanker for Failing {
    fn semantic_search(&self, _query: &str, _k: usize) -> anyhow::Result<Vec<(DocId, f64)>> {
        Err(anyhow!("embedding service unreachable"))
    }
}

#[test]
fn hybrid_retrieve_fuses_semantic_hits() {
    let docs = vec![
        doc("A", "", "تهران شهر بزرگ است", &[]),
        doc("B", "", "تهران پایتخت ایران است", &[]),
        doc("C", "", "اقتصاد ایران", &[]),
    ];
    let engine = engine_for(&docs);
    let semantic = PrecomputedRanking::new(vec![("C".into(), 5.0), ("B".into(), 0.01)]);
    let ids = hybrid_retrieve(&engine, &semantic, "تهران", 2);
    // C never matches lexically but wins on the semantic side
    assert_eq!(ids[0], "C");
    assert_eq!(ids[1], "B");
}

#[test]
fn hybrid_retrieve_degrades_to_lexical() {
    let docs = vec![doc("A", "", "تهران شهر بزرگ است", &[]), doc("B", "", "تهران پایتخت ایران است", &[])];
    let engine = engine_for(&docs);
    let ids = hybrid_retrieve(&engine, &Failing, "تهران", 5);
    let lexical: Vec<DocId> = engine.scored("تهران", 5).into_iter().map(|(d, _)| d).collect();
    assert_eq!(ids, lexical);
    assert!(hybrid_retrieve(&engine, &Failing, "", 5).is_empty());
}
