//! Search benchmarks for the lexical and dense indexes.

use criterion::{Criterion, criterion_group, criterion_main};
use lexlink_core::{DocType, IndexUnit};
use lexlink_index::{DenseIndexBuilder, LexicalIndexBuilder};
use std::hint::black_box;

fn synthetic_unit(i: usize) -> IndexUnit {
    let vocab = [
        "misrepresentation", "contract", "damages", "liability", "disclosure", "fiduciary",
        "negligence", "remedy", "rescission", "warranty", "statute", "provision",
    ];
    let text: Vec<&str> = (0..60).map(|j| vocab[(i * 7 + j * 3) % vocab.len()]).collect();
    IndexUnit {
        unit_id: format!("unit_{i}"),
        doc_type: DocType::Statute,
        title: format!("Section {i}"),
        text: text.join(" "),
        citation: None,
        court: None,
        year: None,
        para_no: None,
    }
}

fn bench_lexical_search(c: &mut Criterion) {
    let mut builder = LexicalIndexBuilder::new();
    for i in 0..2_000 {
        builder.add(synthetic_unit(i));
    }
    let index = builder.build();

    c.bench_function("lexical_search_2k_docs", |b| {
        b.iter(|| black_box(index.search(black_box("misrepresentation contract damages"), 200)))
    });
}

fn bench_dense_search(c: &mut Criterion) {
    const DIM: usize = 256;
    let mut builder = DenseIndexBuilder::new(DIM);
    for i in 0..2_000 {
        let vector: Vec<f32> = (0..DIM).map(|j| ((i * 31 + j * 17) % 101) as f32 / 101.0).collect();
        builder.add(format!("unit_{i}"), &vector).unwrap();
    }
    let index = builder.build();
    let query: Vec<f32> = (0..DIM).map(|j| (j % 13) as f32 / 13.0).collect();

    c.bench_function("dense_search_2k_vectors", |b| {
        b.iter(|| black_box(index.search(black_box(&query), 200).unwrap()))
    });
}

criterion_group!(benches, bench_lexical_search, bench_dense_search);
criterion_main!(benches);
