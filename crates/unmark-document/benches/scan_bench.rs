// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the unmark-document crate: interpreting and
// scanning a text-heavy synthetic page, then redacting its watermarks.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use unmark_core::Rgb;
use unmark_document::testing::{PdfBuilder, cjk_text, image_op, text_op};
use unmark_document::{FixedColor, PatternCatalog, PdfDocument, Redactor, scan};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Sixty lines of body text, a footer watermark in both languages, and a
/// QR stamp in the bottom-right corner.
fn watermarked_page() -> Vec<u8> {
    let mut content = String::new();
    for line in 0..60 {
        let y = 760.0 - line as f32 * 12.0;
        content.push_str(&text_op(
            72.0,
            y,
            10.0,
            "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod",
        ));
    }
    content.push_str(&text_op(300.0, 20.0, 8.0, "Scanned with CamScanner"));
    content.push_str(&cjk_text(420.0, 20.0, 8.0, "扫描全能王"));
    content.push_str(&image_op("Qr", 532.0, 20.0, 60.0, 60.0));
    PdfBuilder::new().page(&content).build()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_scan_page(c: &mut Criterion) {
    let bytes = watermarked_page();
    let doc = PdfDocument::from_bytes(&bytes).expect("fixture loads");
    let patterns = PatternCatalog::default().select(true, true);

    c.bench_function("interpret + scan (60 lines)", |b| {
        b.iter(|| {
            let page = doc.load_page(1).expect("fixture page decodes");
            black_box(scan(&page, black_box(&patterns)));
        });
    });

    let page = doc.load_page(1).expect("fixture page decodes");
    let matches = scan(&page, &patterns);
    let redactor = Redactor::new(Rgb::WHITE);
    let sampler = FixedColor(Rgb::WHITE);

    c.bench_function("redact (3 matches)", |b| {
        b.iter(|| black_box(redactor.redact(&page, black_box(&matches), &sampler)));
    });
}

criterion_group!(benches, bench_scan_page);
criterion_main!(benches);
