// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Glyph excision: rewrite text-showing operations without some of their
// glyphs, keeping every other glyph where it was.
//
// A removed glyph's advance becomes a `TJ` adjustment of the same width, so
// the glyphs after it are not pulled left.

use std::collections::BTreeSet;
use std::fmt;

use lopdf::content::Operation;
use lopdf::{Object, StringFormat};

use crate::page::{Glyph, TextRun};

/// Why a set of glyphs could not be excised.
#[derive(Debug, Clone, PartialEq)]
pub enum ExcisionError {
    /// A glyph to remove was shown at font size zero, so its advance cannot
    /// be expressed as a `TJ` adjustment.
    ZeroFontSize { op_index: usize },
    /// The glyph records no longer line up with the operation's operands.
    OperandMismatch { op_index: usize },
}

impl fmt::Display for ExcisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroFontSize { op_index } => {
                write!(f, "text at operation {op_index} uses font size zero")
            }
            Self::OperandMismatch { op_index } => {
                write!(f, "operation {op_index} does not match its decoded glyphs")
            }
        }
    }
}

/// Rewritten operations for every text-showing operation of `run` that drew
/// one of the `removed` glyphs, as `(operation index, replacement)` pairs.
///
/// Either every affected operation is rewritten or none is.
pub fn excise(
    operations: &[Operation],
    run: &TextRun,
    removed: &BTreeSet<usize>,
) -> Result<Vec<(usize, Vec<Operation>)>, ExcisionError> {
    let affected: BTreeSet<usize> = removed
        .iter()
        .filter_map(|&g| run.glyphs.get(g))
        .map(|g| g.op_index)
        .collect();

    affected
        .into_iter()
        .map(|op_index| {
            let glyphs: Vec<(usize, &Glyph)> = run
                .glyphs
                .iter()
                .enumerate()
                .filter(|(_, g)| g.op_index == op_index)
                .collect();
            let operation = operations
                .get(op_index)
                .ok_or(ExcisionError::OperandMismatch { op_index })?;
            rewrite(op_index, operation, &glyphs, removed).map(|ops| (op_index, ops))
        })
        .collect()
}

fn rewrite(
    op_index: usize,
    operation: &Operation,
    glyphs: &[(usize, &Glyph)],
    removed: &BTreeSet<usize>,
) -> Result<Vec<Operation>, ExcisionError> {
    let mismatch = ExcisionError::OperandMismatch { op_index };
    let operands = &operation.operands;

    // The shown items, and any state the operator set before showing them.
    let (items, mut prefix): (Vec<Object>, Vec<Operation>) = match operation.operator.as_str() {
        "Tj" => (vec![operands.first().ok_or(mismatch.clone())?.clone()], Vec::new()),
        "'" => (
            vec![operands.first().ok_or(mismatch.clone())?.clone()],
            vec![Operation::new("T*", vec![])],
        ),
        "\"" => {
            let (Some(aw), Some(ac), Some(shown)) = (operands.first(), operands.get(1), operands.get(2)) else {
                return Err(mismatch);
            };
            (
                vec![shown.clone()],
                vec![
                    Operation::new("Tw", vec![aw.clone()]),
                    Operation::new("Tc", vec![ac.clone()]),
                    Operation::new("T*", vec![]),
                ],
            )
        }
        "TJ" => match operands.first() {
            Some(Object::Array(items)) => (items.clone(), Vec::new()),
            _ => return Err(mismatch),
        },
        _ => return Err(mismatch),
    };

    let mut array = TjArray::default();
    for (item_index, item) in items.iter().enumerate() {
        match item {
            Object::String(bytes, format) => {
                let mut in_item: Vec<&(usize, &Glyph)> =
                    glyphs.iter().filter(|(_, g)| g.item == item_index).collect();
                in_item.sort_by_key(|(_, g)| g.bytes.start);

                let mut kept_from = 0;
                for (glyph_index, glyph) in in_item {
                    if glyph.bytes.end > bytes.len() || glyph.bytes.start < kept_from {
                        return Err(mismatch);
                    }
                    if !removed.contains(glyph_index) {
                        continue;
                    }
                    if glyph.font_size == 0.0 {
                        return Err(ExcisionError::ZeroFontSize { op_index });
                    }
                    array.push_string(&bytes[kept_from..glyph.bytes.start], *format);
                    array.push_adjustment(-glyph.advance * 1000.0 / glyph.font_size);
                    kept_from = glyph.bytes.end;
                }
                array.push_string(&bytes[kept_from..], *format);
            }
            Object::Integer(_) | Object::Real(_) => {
                if let Some(n) = crate::geometry::number(item) {
                    array.push_adjustment(n);
                }
            }
            _ => return Err(mismatch),
        }
    }

    prefix.push(Operation::new("TJ", vec![Object::Array(array.finish())]));
    Ok(prefix)
}

/// Builds a `TJ` operand, merging adjacent adjustments.
#[derive(Default)]
struct TjArray {
    items: Vec<Object>,
    pending: f32,
}

impl TjArray {
    fn push_string(&mut self, bytes: &[u8], format: StringFormat) {
        if bytes.is_empty() {
            return;
        }
        self.flush();
        self.items.push(Object::String(bytes.to_vec(), format));
    }

    fn push_adjustment(&mut self, n: f32) {
        self.pending += n;
    }

    fn flush(&mut self) {
        if self.pending != 0.0 {
            self.items.push(Object::Real(self.pending));
            self.pending = 0.0;
        }
    }

    fn finish(mut self) -> Vec<Object> {
        self.flush();
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::ContentElement;
    use crate::pdf::interpret::load_page;
    use crate::testing::{PdfBuilder, load_first_page};
    use lopdf::content::Content;

    fn only_run(page: &crate::page::Page) -> &TextRun {
        page.text_runs().next().map(|(_, run)| run).unwrap()
    }

    fn reinterpret(page: &crate::page::Page, ops: Vec<Operation>) -> crate::page::Page {
        let bytes = Content { operations: ops }.encode().unwrap();
        let mut doc = PdfBuilder::new().page("").into_document();
        let (_, id) = doc.get_pages().into_iter().next().unwrap();
        doc.change_page_content(id, bytes).unwrap();
        let reloaded = load_page(&doc, 1, id).unwrap();
        assert_eq!(reloaded.bounds, page.bounds);
        reloaded
    }

    fn apply(page: &crate::page::Page, edits: Vec<(usize, Vec<Operation>)>) -> Vec<Operation> {
        let mut ops = Vec::new();
        for (index, op) in page.operations.iter().enumerate() {
            match edits.iter().find(|(i, _)| *i == index) {
                Some((_, replacement)) => ops.extend(replacement.iter().cloned()),
                None => ops.push(op.clone()),
            }
        }
        ops
    }

    #[test]
    fn middle_glyphs_go_and_neighbours_stay_put() {
        let page = load_first_page(
            PdfBuilder::new().page("BT /F1 10 Tf 72 700 Td (Page 1 CamScanner end) Tj ET\n"),
        );
        let run = only_run(&page);
        let removed: BTreeSet<usize> = (7..17).collect();
        let edits = excise(&page.operations, run, &removed).unwrap();
        assert_eq!(edits.len(), 1);

        let after = reinterpret(&page, apply(&page, edits));
        let kept = only_run(&after);
        assert!(!kept.content.contains("CamScanner"));
        assert!(kept.content.starts_with("Page 1"));
        assert!(kept.content.ends_with("end"));

        // "end" starts where it did before.
        let before_e = run.glyphs[18].bbox;
        let after_e = kept.glyphs[kept.glyphs.len() - 3].bbox;
        assert!((before_e.x0 - after_e.x0).abs() < 1e-3);
    }

    #[test]
    fn tj_arrays_keep_their_own_adjustments() {
        let page = load_first_page(
            PdfBuilder::new().page("BT /F1 10 Tf 72 700 Td [(ab) -200 (CamScanner) 100 (cd)] TJ ET\n"),
        );
        let run = only_run(&page);
        let removed: BTreeSet<usize> = (2..12).collect();
        let edits = excise(&page.operations, run, &removed).unwrap();
        let tj = &edits[0].1[0];
        assert_eq!(tj.operator, "TJ");
        let Object::Array(items) = &tj.operands[0] else { panic!("TJ operand is not an array") };
        // (ab) then one merged adjustment then (cd).
        assert_eq!(items.len(), 3);
        let Object::Real(n) = items[1] else { panic!("expected a merged adjustment") };
        // -200, ten 5pt glyphs (-500 each), +100.
        assert!((n - (-200.0 - 5000.0 + 100.0)).abs() < 1e-2);

        let after = reinterpret(&page, apply(&page, edits));
        let kept = only_run(&after);
        assert!((kept.glyphs[2].bbox.x0 - run.glyphs[12].bbox.x0).abs() < 1e-3);
    }

    #[test]
    fn quote_operators_keep_their_line_moves() {
        let page = load_first_page(PdfBuilder::new().page(
            "BT /F1 10 Tf 12 TL 72 700 Td (top) Tj 2 1 (CamScanner) \" ET\n",
        ));
        let run = only_run(&page);
        let removed: BTreeSet<usize> = (3..13).collect();
        let edits = excise(&page.operations, run, &removed).unwrap();
        let ops: Vec<&str> = edits[0].1.iter().map(|o| o.operator.as_str()).collect();
        assert_eq!(ops, ["Tw", "Tc", "T*", "TJ"]);
    }

    #[test]
    fn zero_font_size_cannot_be_excised() {
        let page = load_first_page(PdfBuilder::new().page("BT /F1 0 Tf 72 700 Td (CamScanner) Tj ET\n"));
        let run = only_run(&page);
        let removed: BTreeSet<usize> = (0..10).collect();
        assert_eq!(
            excise(&page.operations, run, &removed).err(),
            Some(ExcisionError::ZeroFontSize { op_index: 3 })
        );
    }

    #[test]
    fn stale_glyph_records_are_detected() {
        let page = load_first_page(PdfBuilder::new().page("BT /F1 10 Tf 72 700 Td (CamScanner) Tj ET\n"));
        let run = only_run(&page);
        let mut ops = page.operations.clone();
        ops[3] = Operation::new("Tj", vec![Object::string_literal("Cam")]);
        let removed: BTreeSet<usize> = (0..10).collect();
        assert_eq!(
            excise(&ops, run, &removed).err(),
            Some(ExcisionError::OperandMismatch { op_index: 3 })
        );
        assert!(matches!(page.elements[0], ContentElement::Text(_)));
    }
}
