use agrama::bm25::Bm25Index;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn corpus_index(n: usize) -> Bm25Index {
    let index = Bm25Index::default();
    for i in 0..n {
        let content = format!(
            "function handleRequest{i}(context) {{ return context.resolve({i}); }}"
        );
        index.add_document(i as u64, format!("file{i}.js"), &content).unwrap();
    }
    index
}

fn bench_add_document(c: &mut Criterion) {
    let index = Bm25Index::default();
    let mut i = 0u64;
    c.bench_function("bm25_add_document", |b| {
        b.iter(|| {
            index
                .add_document(i, "bench.js", "function handleRequest(context) { return context; }")
                .unwrap();
            i += 1;
        })
    });
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("bm25_search");
    for size in [100, 1_000, 10_000] {
        let index = corpus_index(size);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(index.search("handleRequest context", 10)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_add_document, bench_search);
criterion_main!(benches);
