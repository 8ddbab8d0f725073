// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF document: load and classify input bytes, hand out decoded pages, take
// back rewritten content streams, and serialise the result using `lopdf`.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, instrument, warn};
use unmark_core::error::{Result, UnmarkError};

use super::interpret;
use crate::page::Page;
use crate::redact::image::DocumentSampler;

/// How far into the file the `%PDF-` header may start.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// A loaded PDF, mutated in place by redaction.
///
/// Wraps `lopdf::Document`; the page model handed out by [`load_page`] is a
/// read-only snapshot, and edits come back through
/// [`replace_page_content`].
///
/// [`load_page`]: PdfDocument::load_page
/// [`replace_page_content`]: PdfDocument::replace_page_content
pub struct PdfDocument {
    document: Document,
}

impl PdfDocument {
    // -- Construction ---------------------------------------------------------

    /// Load a PDF from bytes already in memory.
    ///
    /// Bytes that are not a PDF at all are [`UnmarkError::InvalidInput`];
    /// a PDF that uses encryption or whose cross-reference data cannot be
    /// read is [`UnmarkError::UnsupportedStructure`].
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(UnmarkError::InvalidInput("input is empty".into()));
        }
        let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
        if !window.windows(5).any(|w| w == b"%PDF-") {
            return Err(UnmarkError::InvalidInput("input is not a PDF (no %PDF- header)".into()));
        }
        let document = Document::load_mem(data).map_err(|err| {
            let message = err.to_string();
            let lower = message.to_lowercase();
            let encrypted = ["encrypt", "decrypt", "password"].iter().any(|k| lower.contains(k))
                || trailer_declares_encryption(data);
            if encrypted {
                UnmarkError::UnsupportedStructure(format!("encrypted PDF: {message}"))
            } else if lower.contains("xref") || lower.contains("trailer") {
                UnmarkError::UnsupportedStructure(format!("malformed cross-reference data: {message}"))
            } else {
                UnmarkError::InvalidInput(format!("failed to load PDF: {message}"))
            }
        })?;

        if document.trailer.get(b"Encrypt").is_ok() {
            warn!("Rejecting encrypted PDF");
            return Err(UnmarkError::UnsupportedStructure("encrypted PDF".into()));
        }

        let has_page_tree = document
            .catalog()
            .ok()
            .and_then(|catalog| catalog.get(b"Pages").ok())
            .is_some();
        if !has_page_tree {
            return Err(UnmarkError::UnsupportedStructure("document has no page tree".into()));
        }

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self { document })
    }

    pub(crate) fn from_document(document: Document) -> Self {
        Self { document }
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// `(page number, page object)` pairs in page order.
    pub fn page_ids(&self) -> Vec<(u32, ObjectId)> {
        self.document.get_pages().into_iter().collect()
    }

    pub fn inner(&self) -> &Document {
        &self.document
    }

    // -- Pages ----------------------------------------------------------------

    /// Decode page `number` (1-indexed).
    pub fn load_page(&self, number: u32) -> Result<Page> {
        let pages = self.document.get_pages();
        let page_id = *pages.get(&number).ok_or_else(|| {
            UnmarkError::InvalidInput(format!(
                "page {} out of range (document has {} pages)",
                number,
                pages.len()
            ))
        })?;
        interpret::load_page(&self.document, number, page_id)
    }

    /// Decode the page behind a known page object.
    pub fn load_page_by_id(&self, number: u32, page_id: ObjectId) -> Result<Page> {
        interpret::load_page(&self.document, number, page_id)
    }

    /// Background colour sampler over this document's images.
    pub fn sampler(&self, ring_px: u32) -> DocumentSampler<'_> {
        DocumentSampler::new(&self.document, ring_px)
    }

    // -- Mutation -------------------------------------------------------------

    /// Point a page at a new, single content stream.
    ///
    /// The old streams are left in place for other pages that may share them
    /// and are dropped by [`PdfDocument::to_bytes`] if nothing references them.
    pub fn replace_page_content(&mut self, page_id: ObjectId, content: Vec<u8>) -> Result<()> {
        let stream_id = self
            .document
            .add_object(Object::Stream(Stream::new(Dictionary::new(), content)));
        let page = self
            .document
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| UnmarkError::Pdf(format!("cannot update page {page_id:?}: {err}")))?;
        page.set("Contents", Object::Reference(stream_id));
        Ok(())
    }

    /// Compress every stream (the size-reduction pass of a batch job).
    pub fn compress(&mut self) {
        self.document.compress();
        debug!("streams compressed");
    }

    /// Drop unreferenced objects and serialise.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let pruned = self.document.prune_objects();
        if !pruned.is_empty() {
            debug!(objects = pruned.len(), "unreferenced objects pruned");
        }
        let mut output = Vec::new();
        self.document
            .save_to(&mut output)
            .map_err(|err| UnmarkError::Pdf(format!("failed to serialise PDF: {}", err)))?;
        debug!(output_bytes = output.len(), "PDF serialised");
        Ok(output)
    }
}

/// Whether the trailer dictionary or cross-reference stream dictionary of
/// a file lopdf could not load names an `/Encrypt` entry.
///
/// Only dictionaries that end in `trailer` or carry `/Type /XRef` are
/// inspected, so page text that mentions the key does not count.
fn trailer_declares_encryption(data: &[u8]) -> bool {
    trailer_dictionaries(data)
        .chain(xref_stream_dictionaries(data))
        .any(|dict| find(dict, b"/Encrypt").is_some())
}

/// Text between each `trailer` keyword and the following `startxref`.
fn trailer_dictionaries(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    positions(data, b"trailer").map(move |start| {
        let rest = &data[start..];
        let end = find(rest, b"startxref").unwrap_or(rest.len());
        &rest[..end]
    })
}

/// The dictionary of every object declaring `/Type /XRef`, up to its `stream`.
fn xref_stream_dictionaries(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    positions(data, b"/XRef").filter_map(move |at| {
        let start = rfind(&data[..at], b"obj")?;
        let rest = &data[start..];
        let end = find(rest, b"stream").unwrap_or(rest.len());
        Some(&rest[..end])
    })
}

fn positions<'a>(data: &'a [u8], needle: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    data.windows(needle.len())
        .enumerate()
        .filter(move |(_, w)| *w == needle)
        .map(|(i, _)| i)
}

fn find(data: &[u8], needle: &[u8]) -> Option<usize> {
    data.windows(needle.len()).position(|w| w == needle)
}

fn rfind(data: &[u8], needle: &[u8]) -> Option<usize> {
    data.windows(needle.len()).rposition(|w| w == needle)
}
