use criterion::{criterion_group, criterion_main, Criterion};
use khabar_core::graph::WebGraph;
use khabar_core::tokenizer::tokenize;

const SAMPLE: &str = "به گزارش خبرگزاری ایسنا، قیمت نفت در بازارهای جهانی امروز افزایش یافت. \
    Oil prices rose on Monday as traders weighed supply risks in the Middle East. \
    وزیر نفت گفت تولید کشور در سال ۱۴۰۲ به بالاترین سطح خود رسیده است.";

fn bench_tokenize(c: &mut Criterion) {
    let text = SAMPLE.repeat(64);
    c.bench_function("tokenize_mixed_news", |b| b.iter(|| tokenize(&text)));
}

fn bench_pagerank(c: &mut Criterion) {
    let mut g = WebGraph::new();
    for i in 0..500u32 {
        for step in [1u32, 7, 31] {
            g.add_edge(&i.to_string(), &((i + step) % 500).to_string());
        }
    }
    c.bench_function("pagerank_500_nodes", |b| b.iter(|| g.pagerank(0.85, 100, 1e-6)));
    c.bench_function("hits_500_nodes", |b| b.iter(|| g.hits(50, 1e-6)));
}

criterion_group!(benches, bench_tokenize, bench_pagerank);
criterion_main!(benches);
