// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Merge engine: concatenate the pages of several documents into a new one.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, info, instrument, warn};
use unmark_core::error::{Result, UnmarkError};

use super::dict_of;
use super::reader::PdfDocument;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Parent chains longer than this are treated as broken.
const MAX_TREE_DEPTH: usize = 32;

/// Load every input, then merge. A single unreadable input fails the whole
/// merge with [`UnmarkError::InvalidInput`] and nothing is produced.
#[instrument(skip_all, fields(inputs = inputs.len()))]
pub fn merge_bytes(inputs: &[&[u8]]) -> Result<PdfDocument> {
    let documents = inputs
        .iter()
        .enumerate()
        .map(|(index, bytes)| {
            PdfDocument::from_bytes(bytes).map_err(|err| {
                UnmarkError::InvalidInput(format!("merge input #{}: {}", index + 1, err))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    merge(&documents)
}

/// Concatenate the pages of `documents` in order, keeping each document's
/// own page order.
#[instrument(skip_all, fields(documents = documents.len()))]
pub fn merge(documents: &[PdfDocument]) -> Result<PdfDocument> {
    if documents.is_empty() {
        return Err(UnmarkError::InvalidInput("nothing to merge".into()));
    }
    info!(
        total_pages = documents.iter().map(PdfDocument::page_count).sum::<usize>(),
        "Merging PDFs"
    );

    let mut target = Document::with_version(
        documents
            .iter()
            .map(|d| d.inner().version.as_str())
            .max()
            .unwrap_or("1.5"),
    );
    let pages_id = target.new_object_id();
    let mut kids = Vec::new();

    for (index, source) in documents.iter().enumerate() {
        let mut copier = PageCopier::new(source.inner());
        for (number, page_id) in source.page_ids() {
            let copied = copier.copy_page(&mut target, page_id).map_err(|err| {
                UnmarkError::InvalidInput(format!("merge input #{} page {}: {}", index + 1, number, err))
            })?;
            if let Ok(Object::Dictionary(page)) = target.get_object_mut(copied) {
                page.set("Parent", Object::Reference(pages_id));
            }
            kids.push(Object::Reference(copied));
        }
        debug!(document = index + 1, objects = copier.memo.len(), "document pages copied");
    }

    let count = kids.len() as i64;
    target.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = target.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    target.trailer.set("Root", catalog_id);

    debug!(pages = count, "Merge complete");
    Ok(PdfDocument::from_document(target))
}

/// Copies pages out of one source document.
///
/// Every source object is copied at most once; the id is reserved before the
/// object's children are visited, which also ends reference cycles.
struct PageCopier<'a> {
    source: &'a Document,
    memo: HashMap<ObjectId, ObjectId>,
}

impl<'a> PageCopier<'a> {
    fn new(source: &'a Document) -> Self {
        Self {
            source,
            memo: HashMap::new(),
        }
    }

    fn copy_page(&mut self, target: &mut Document, page_id: ObjectId) -> Result<ObjectId> {
        let page = dict_of(self.source, page_id)
            .ok_or_else(|| UnmarkError::InvalidInput(format!("page object {page_id:?} is missing")))?;

        let new_id = match self.memo.get(&page_id) {
            Some(id) => *id,
            None => {
                let id = target.new_object_id();
                self.memo.insert(page_id, id);
                id
            }
        };

        let mut copy = Dictionary::new();
        for (key, value) in page.iter() {
            if key == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.copy(target, value));
        }
        for key in INHERITABLE {
            if copy.has(key) {
                continue;
            }
            if let Some(value) = self.inherited(page, key) {
                copy.set(key.to_vec(), self.copy(target, value));
            }
        }

        target.objects.insert(new_id, Object::Dictionary(copy));
        Ok(new_id)
    }

    /// Unresolved value of `key` on the nearest ancestor that has it.
    fn inherited(&self, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        let mut node = page;
        for _ in 0..MAX_TREE_DEPTH {
            let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
            node = dict_of(self.source, parent)?;
            if let Ok(value) = node.get(key) {
                return Some(value);
            }
        }
        None
    }

    fn copy(&mut self, target: &mut Document, object: &Object) -> Object {
        match object {
            Object::Reference(id) => Object::Reference(self.copy_reference(target, *id)),
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dict(target, dict)),
            Object::Array(items) => Object::Array(items.iter().map(|item| self.copy(target, item)).collect()),
            Object::Stream(stream) => {
                let mut copied = Stream::new(self.copy_dict(target, &stream.dict), stream.content.clone());
                copied.allows_compression = stream.allows_compression;
                Object::Stream(copied)
            }
            other => other.clone(),
        }
    }

    /// Page tree nodes lose their `/Parent` link; the caller rebuilds the
    /// tree. Any other `/Parent` (annotations, form fields) is copied.
    fn copy_dict(&mut self, target: &mut Document, dict: &Dictionary) -> Dictionary {
        let tree_node = matches!(
            dict.get(b"Type").and_then(Object::as_name),
            Ok(b"Page" | b"Pages")
        );
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            if tree_node && key == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.copy(target, value));
        }
        copy
    }

    fn copy_reference(&mut self, target: &mut Document, id: ObjectId) -> ObjectId {
        if let Some(mapped) = self.memo.get(&id) {
            return *mapped;
        }
        let new_id = target.new_object_id();
        self.memo.insert(id, new_id);

        let copied = match self.source.objects.get(&id) {
            Some(object) => self.copy(target, object),
            None => {
                warn!(?id, "Cannot resolve reference, using Null");
                Object::Null
            }
        };
        target.objects.insert(new_id, copied);
        new_id
    }
}
