use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nxsearch::config::{EngineConfig, SearchParams};
use nxsearch::Engine;
use tempfile::TempDir;

const WORDS: &[&str] = &[
    "the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog", "cat", "mouse",
];

fn document(id: u64, word_count: usize) -> String {
    (0..word_count)
        .map(|i| WORDS[(id as usize + i) % WORDS.len()])
        .collect::<Vec<_>>()
        .join(" ")
}

fn fresh_index(dir: &TempDir) -> nxsearch::Index {
    let config = EngineConfig::resolve(Some(dir.path().to_path_buf()));
    let engine = Engine::open(config).unwrap();
    engine
        .index_create("bench", serde_json::json!({}))
        .unwrap()
}

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_add");
    for doc_len in [20usize, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(doc_len), &doc_len, |b, &doc_len| {
            let dir = TempDir::new().unwrap();
            let mut index = fresh_index(&dir);
            let mut id = 1u64;
            b.iter(|| {
                index.add(id, &document(id, doc_len)).unwrap();
                id += 1;
            });
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let mut index = fresh_index(&dir);
    for id in 1..=2000u64 {
        index.add(id, &document(id, 50)).unwrap();
    }

    let mut group = c.benchmark_group("index_search");
    for query in ["fox", "fox AND dog", "(fox OR cat) AND NOT mouse"] {
        group.bench_function(query, |b| {
            b.iter(|| {
                let resp = index.search(black_box(query), &SearchParams::default()).unwrap();
                black_box(resp.result_count());
            });
        });
    }
    group.finish();
}

fn bench_fuzzy_search(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let mut index = fresh_index(&dir);
    for id in 1..=500u64 {
        index.add(id, &document(id, 50)).unwrap();
    }
    let params = SearchParams {
        fuzzymatch: true,
        ..SearchParams::default()
    };

    c.bench_function("fuzzy_search_single_miss", |b| {
        b.iter(|| {
            let resp = index.search(black_box("fx"), &params).unwrap();
            black_box(resp.result_count());
        });
    });
}

criterion_group!(benches, bench_add, bench_search, bench_fuzzy_search);
criterion_main!(benches);
