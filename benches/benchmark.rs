//! Benchmarks for collaborative text values.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use collabtext::{Element, Text, TextDocument};
use serde_json::json;

fn sample_text(len: usize) -> Text {
    let mut elements = Vec::with_capacity(len);
    for i in 0..len {
        if i % 50 == 49 {
            elements.push(Element::embedded(json!({"img": i})));
        } else {
            elements.push(Element::from((b'a' + (i % 26) as u8) as char));
        }
    }
    Text::from(elements)
}

fn bench_from_str(c: &mut Criterion) {
    let source = "A beautiful sunset over the ocean with golden light. ".repeat(20);
    c.bench_function("from_str", |b| b.iter(|| black_box(Text::from(source.as_str()))));
}

fn bench_insert_char(c: &mut Criterion) {
    c.bench_function("detached_insert_char", |b| {
        let mut text = Text::from("Hello");
        let mut pos = 5usize;
        b.iter(|| {
            text.insert_at(pos, [Element::from('x')]).unwrap();
            pos += 1;
        })
    });
}

fn bench_views(c: &mut Criterion) {
    let mut group = c.benchmark_group("views");

    for len in [100, 1_000, 10_000].iter() {
        let text = sample_text(*len);

        group.bench_with_input(BenchmarkId::new("string_cold", len), len, |b, _| {
            b.iter(|| {
                // Rebuild to start from an empty cache
                let fresh = Text::from(text.elements().to_vec());
                black_box(fresh.as_str().len())
            })
        });

        group.bench_with_input(BenchmarkId::new("spans_cold", len), len, |b, _| {
            b.iter(|| {
                let fresh = Text::from(text.elements().to_vec());
                black_box(fresh.spans().len())
            })
        });

        group.bench_with_input(BenchmarkId::new("string_cached", len), len, |b, _| {
            b.iter(|| black_box(text.as_str().len()))
        });
    }
    group.finish();
}

fn bench_change_block_char(c: &mut Criterion) {
    c.bench_function("change_block_insert_char", |b| {
        let mut doc = TextDocument::new();
        doc.put_text(&["body"], &Text::from("Hello")).unwrap();

        let mut pos = 5usize;
        b.iter(|| {
            doc.change(|block| block.insert_str(&["body"], pos, "x"))
                .unwrap();
            pos += 1;
        })
    });
}

fn bench_bound_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("bound_view");

    for len in [100, 1_000].iter() {
        let mut doc = TextDocument::new();
        doc.put_text(&["body"], &sample_text(*len)).unwrap();
        let bytes = doc.save();

        group.bench_with_input(BenchmarkId::new("hydrate", len), len, |b, _| {
            b.iter(|| {
                // Fresh document each time to skip the view cache
                let mut d = TextDocument::from_bytes(&bytes).unwrap();
                black_box(d.text(&["body"]).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    c.bench_function("merge_concurrent_inserts", |b| {
        let mut base = TextDocument::new();
        base.put_text(&["body"], &Text::from("A test prompt")).unwrap();
        let bytes = base.save();

        b.iter(|| {
            let mut client_a = TextDocument::from_bytes(&bytes).unwrap();
            let mut client_b = TextDocument::from_bytes(&bytes).unwrap();
            client_a
                .change(|block| block.insert_str(&["body"], 0, "left "))
                .unwrap();
            client_b
                .change(|block| block.insert_str(&["body"], 13, " right"))
                .unwrap();
            client_a.merge(&mut client_b).unwrap();
            black_box(client_a.text(&["body"]).unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_from_str,
    bench_insert_char,
    bench_views,
    bench_change_block_char,
    bench_bound_view,
    bench_merge,
);
criterion_main!(benches);
