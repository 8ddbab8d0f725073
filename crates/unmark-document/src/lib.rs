// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// unmark-document: PDF-side processing for unmark.
//
// Provides the pattern catalog, a page model decoded from content streams,
// the watermark scanner, the redaction engine, and page-preserving merging.

pub mod catalog;
pub mod geometry;
pub mod normalize;
pub mod page;
pub mod pdf;
pub mod redact;
pub mod scanner;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export the primary items so callers can use `unmark_document::PdfDocument` etc.
pub use catalog::{Pattern, PatternCatalog};
pub use page::{ContentElement, Page};
pub use pdf::merge::{merge, merge_bytes};
pub use pdf::reader::PdfDocument;
pub use redact::image::DocumentSampler;
pub use redact::{ColorSampler, FixedColor, PageRedaction, Redactor};
pub use scanner::{Match, MatchTarget, scan};
