// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF plumbing on top of `lopdf`: loading, page interpretation, and merging.

pub mod font;
pub mod interpret;
pub mod merge;
pub mod reader;

use lopdf::{Dictionary, Document, Object, ObjectId};

/// Reference chains longer than this are treated as broken.
const MAX_REFERENCE_DEPTH: usize = 32;

/// Follow indirect references until a direct object is reached.
///
/// Dangling references resolve to themselves.
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    let mut current = object;
    for _ in 0..MAX_REFERENCE_DEPTH {
        match current {
            Object::Reference(id) => match doc.objects.get(id) {
                Some(target) => current = target,
                None => return current,
            },
            _ => return current,
        }
    }
    current
}

/// Dictionary behind an object id, if it is one.
pub fn dict_of(doc: &Document, id: ObjectId) -> Option<&Dictionary> {
    doc.objects
        .get(&id)
        .map(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
}

/// Look up a page attribute, walking up the page tree for inheritable keys
/// (`Resources`, `MediaBox`, `CropBox`, `Rotate`).
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = dict_of(doc, page_id)?;
    for _ in 0..MAX_REFERENCE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = dict_of(doc, parent)?;
    }
    None
}
