// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the postwerk-document crate: record extraction over
// a large synthetic label text, and page classification.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use postwerk_document::classify::select_pages;
use postwerk_document::extract_records;
use postwerk_document::fixtures::label_lines;

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Extract 600 records (twenty full sheets) from one block of text.
fn bench_extract_records(c: &mut Criterion) {
    let text = (0..600)
        .map(|n| label_lines(n).join("\n"))
        .collect::<Vec<_>>()
        .join("\n");

    c.bench_function("extract_records (600 labels)", |b| {
        b.iter(|| {
            let extraction = extract_records(black_box(&text));
            black_box(extraction.records().len());
        });
    });
}

/// Classify 600 page texts, half of them labels.
fn bench_select_pages(c: &mut Criterion) {
    let pages: Vec<String> = (0..600)
        .map(|n| {
            if n % 2 == 0 {
                label_lines(n).join("\n")
            } else {
                format!("Packing Slip\nOrder {n}\nItem: Widget x 1")
            }
        })
        .collect();

    c.bench_function("select_pages (600 pages)", |b| {
        b.iter(|| black_box(select_pages(black_box(&pages), true)));
    });
}

criterion_group!(benches, bench_extract_records, bench_select_pages);
criterion_main!(benches);
