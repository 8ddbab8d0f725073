// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Redaction engine: turn a page's matches into an edited content stream.
//
// Text is excised glyph by glyph, stamp images are dropped, and whatever
// cannot be removed is painted over. A page never fails as a whole because
// of one awkward match; that match is covered and reported instead.

pub mod image;
pub mod text;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use lopdf::Object;
use lopdf::content::{Content, Operation};
use tracing::{debug, instrument, warn};
use unmark_core::types::{RedactionResult, RedactionWarning};
use unmark_core::{Rect, Rgb};

use crate::geometry::UNIT_SQUARE;
use crate::page::{ContentElement, ImagePlacement, Page, TextRun};
use crate::scanner::{Match, MatchTarget};

/// Source of a background colour to paint over part of an image.
pub trait ColorSampler: Sync {
    /// Colour around user-space `region` inside `image`, if the image can
    /// be decoded.
    fn sample_around(&self, image: &ImagePlacement, region: &Rect) -> Option<Rgb>;
}

/// Always answers with one colour.
#[derive(Debug, Clone, Copy)]
pub struct FixedColor(pub Rgb);

impl ColorSampler for FixedColor {
    fn sample_around(&self, _image: &ImagePlacement, _region: &Rect) -> Option<Rgb> {
        Some(self.0)
    }
}

/// The outcome of redacting one page.
#[derive(Debug, Clone)]
pub struct PageRedaction {
    /// New content stream, `None` when the page is left untouched.
    pub content: Option<Vec<u8>>,
    pub result: RedactionResult,
}

/// Operation-level edits, applied in one pass.
#[derive(Debug, Default)]
struct EditPlan {
    /// Operation index to its replacement (empty to delete).
    replace: BTreeMap<usize, Vec<Operation>>,
    /// Operations to paint right after an operation.
    insert_after: BTreeMap<usize, Vec<Operation>>,
}

impl EditPlan {
    fn is_empty(&self) -> bool {
        self.replace.is_empty() && self.insert_after.is_empty()
    }

    fn remove(&mut self, ops: std::ops::Range<usize>) {
        for index in ops {
            self.replace.insert(index, Vec::new());
        }
    }

    fn paint_after(&mut self, index: usize, ops: Vec<Operation>) {
        self.insert_after.entry(index).or_default().extend(ops);
    }

    fn apply(self, operations: &[Operation]) -> Vec<Operation> {
        let mut out = Vec::with_capacity(operations.len());
        for (index, op) in operations.iter().enumerate() {
            match self.replace.get(&index) {
                Some(replacement) => out.extend(replacement.iter().cloned()),
                None => out.push(op.clone()),
            }
            if let Some(extra) = self.insert_after.get(&index) {
                out.extend(extra.iter().cloned());
            }
        }
        out
    }
}

/// Removes matches from pages.
#[derive(Debug, Clone)]
pub struct Redactor {
    fallback_fill: Rgb,
}

impl Redactor {
    /// `fallback_fill` paints covers when no background can be sampled.
    pub fn new(fallback_fill: Rgb) -> Self {
        Self { fallback_fill }
    }

    /// Remove every match on `page`.
    ///
    /// Pages without matches come back untouched. Matches that cannot be
    /// excised are covered and show up as
    /// [`RedactionWarning::PartialRedaction`].
    #[instrument(skip_all, fields(page = page.number, matches = matches.len()))]
    pub fn redact(&self, page: &Page, matches: &[Match], sampler: &dyn ColorSampler) -> PageRedaction {
        let mut result = RedactionResult::for_page(page.number);
        if matches.is_empty() {
            return PageRedaction { content: None, result };
        }

        let mut plan = EditPlan::default();

        // Whole images first, so covers are not painted onto removed stamps.
        let mut removed_images = BTreeSet::new();
        for m in matches.iter().filter(|m| m.target == MatchTarget::Placement) {
            if let Some(ContentElement::Image(image)) = page.elements.get(m.element) {
                plan.remove(image.ops.clone());
                removed_images.insert(m.element);
                result.removed += 1;
            }
        }

        // Glyph ranges to excise, per text run.
        let mut excisions: HashMap<usize, Vec<&Match>> = HashMap::new();
        for m in matches {
            match &m.target {
                MatchTarget::Glyphs { .. } => excisions.entry(m.element).or_default().push(m),
                MatchTarget::BakedText { run, .. } => excisions.entry(*run).or_default().push(m),
                MatchTarget::Placement => {}
            }
        }

        let mut runs: Vec<usize> = excisions.keys().copied().collect();
        runs.sort_unstable();
        for run_index in runs {
            let Some(ContentElement::Text(run)) = page.elements.get(run_index) else {
                continue;
            };
            let run_matches = &excisions[&run_index];
            let removed: BTreeSet<usize> = run_matches
                .iter()
                .flat_map(|m| match &m.target {
                    MatchTarget::Glyphs { range } | MatchTarget::BakedText { range, .. } => range.clone(),
                    MatchTarget::Placement => 0..0,
                })
                .collect();

            let excised = match text::excise(&page.operations, run, &removed) {
                Ok(edits) => {
                    for (index, replacement) in edits {
                        plan.replace.insert(index, replacement);
                    }
                    true
                }
                Err(reason) => {
                    warn!(page = page.number, run = run_index, %reason, "glyph excision failed, covering instead");
                    for m in run_matches.iter().filter(|m| matches!(m.target, MatchTarget::Glyphs { .. })) {
                        self.cover_text(page, run_index, run, m, sampler, &mut plan, &mut result, &reason.to_string());
                    }
                    false
                }
            };

            for m in run_matches {
                match m.target {
                    MatchTarget::Glyphs { .. } if excised => result.removed += 1,
                    MatchTarget::BakedText { .. } if !removed_images.contains(&m.element) => {
                        self.cover_raster(page, m, sampler, &mut plan, &mut result);
                    }
                    _ => {}
                }
            }
        }

        if plan.is_empty() {
            return PageRedaction { content: None, result };
        }

        let operations = plan.apply(&page.operations);
        match (Content { operations }).encode() {
            Ok(bytes) => {
                debug!(
                    removed = result.removed,
                    covered = result.covered,
                    bytes = bytes.len(),
                    "page content rewritten"
                );
                PageRedaction {
                    content: Some(bytes),
                    result,
                }
            }
            Err(err) => {
                warn!(page = page.number, %err, "cannot encode redacted content, page left as is");
                let mut skipped = RedactionResult::for_page(page.number);
                skipped.warnings.push(RedactionWarning::PageSkipped {
                    page: page.number,
                    reason: format!("content stream could not be re-encoded: {err}"),
                });
                PageRedaction {
                    content: None,
                    result: skipped,
                }
            }
        }
    }

    /// Paint over a text match in user space, after its text object ends.
    #[allow(clippy::too_many_arguments)]
    fn cover_text(
        &self,
        page: &Page,
        run_index: usize,
        run: &TextRun,
        m: &Match,
        sampler: &dyn ColorSampler,
        plan: &mut EditPlan,
        result: &mut RedactionResult,
        reason: &str,
    ) {
        let Some(to_user) = run.ctm.inverse() else {
            // A singular CTM draws nothing, so there is nothing to hide.
            result.removed += 1;
            return;
        };
        let (cx, cy) = m.bbox.center();
        let fill = page
            .image_beneath(run_index, cx, cy)
            .and_then(|(_, image)| sampler.sample_around(image, &m.bbox))
            .unwrap_or(self.fallback_fill);

        let mut ops = vec![
            Operation::new("q", vec![]),
            Operation::new("cm", to_user.to_operands()),
        ];
        ops.extend(fill_rect(fill, &m.bbox));
        ops.push(Operation::new("Q", vec![]));
        plan.paint_after(run.end_op, ops);

        result.covered += 1;
        result.warnings.push(RedactionWarning::PartialRedaction {
            page: page.number,
            region: m.bbox,
            reason: format!("covered instead of removed: {reason}"),
        });
    }

    /// Paint over watermark pixels inside a raster, in the raster's own space.
    fn cover_raster(
        &self,
        page: &Page,
        m: &Match,
        sampler: &dyn ColorSampler,
        plan: &mut EditPlan,
        result: &mut RedactionResult,
    ) {
        let Some(ContentElement::Image(image)) = page.elements.get(m.element) else {
            return;
        };
        let Some(unit) = image
            .matrix
            .inverse()
            .and_then(|inv| inv.transform_rect(&m.bbox).intersection(&UNIT_SQUARE))
        else {
            return;
        };
        let fill = sampler.sample_around(image, &m.bbox).unwrap_or(self.fallback_fill);

        // Right after `Do` the CTM is still the image's placement matrix.
        let mut ops = vec![Operation::new("q", vec![])];
        ops.extend(fill_rect(fill, &unit));
        ops.push(Operation::new("Q", vec![]));
        plan.paint_after(image.paint_op(), ops);

        result.covered += 1;
        result.warnings.push(RedactionWarning::PartialRedaction {
            page: page.number,
            region: m.bbox,
            reason: "watermark is part of a page image; covered with its background colour".into(),
        });
    }
}

fn fill_rect(fill: Rgb, rect: &Rect) -> Vec<Operation> {
    vec![
        Operation::new(
            "rg",
            vec![Object::Real(fill.0), Object::Real(fill.1), Object::Real(fill.2)],
        ),
        Operation::new(
            "re",
            vec![
                Object::Real(rect.x0),
                Object::Real(rect.y0),
                Object::Real(rect.width()),
                Object::Real(rect.height()),
            ],
        ),
        Operation::new("f", vec![]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PatternCatalog;
    use crate::scanner::scan;
    use crate::testing::{BG_PIXEL, PdfBuilder, cjk_text, image_op, load_first_page, text_op};
    use unmark_core::types::WatermarkClass;

    const GREY: FixedColor = FixedColor(Rgb(0.5, 0.5, 0.5));

    fn all_patterns() -> Vec<crate::catalog::Pattern> {
        PatternCatalog::default().select(true, true)
    }

    /// Redact the first page and decode the result again.
    fn redact_and_reload(builder: PdfBuilder) -> (Page, PageRedaction, Page) {
        let mut doc = builder.into_document();
        let (number, id) = doc.get_pages().into_iter().next().unwrap();
        let page = crate::pdf::interpret::load_page(&doc, number, id).unwrap();
        let matches = scan(&page, &all_patterns());
        let redaction = Redactor::new(Rgb::WHITE).redact(&page, &matches, &GREY);
        if let Some(content) = &redaction.content {
            doc.change_page_content(id, content.clone()).unwrap();
        }
        let after = crate::pdf::interpret::load_page(&doc, number, id).unwrap();
        (page, redaction, after)
    }

    #[test]
    fn pages_without_matches_are_untouched() {
        let page = load_first_page(PdfBuilder::new().page(&text_op(72.0, 700.0, 12.0, "Plain page")));
        let redaction = Redactor::new(Rgb::WHITE).redact(&page, &[], &GREY);
        assert!(redaction.content.is_none());
        assert_eq!(redaction.result.total(), 0);
    }

    #[test]
    fn every_variant_is_excised_without_residue() {
        let catalog = PatternCatalog::default();
        let variants = catalog.patterns_for(WatermarkClass::TextWatermark);
        assert_eq!(variants.len(), 5);

        for pattern in variants {
            let crate::catalog::Pattern::Text(variant) = pattern else {
                panic!("text class holds a region pattern")
            };
            let watermark = if variant.text.is_ascii() {
                text_op(300.0, 30.0, 10.0, &variant.text)
            } else {
                cjk_text(300.0, 30.0, 12.0, &variant.text)
            };
            let content = format!("{}{watermark}", text_op(72.0, 700.0, 12.0, "Keep this line"));
            let (before, redaction, after) = redact_and_reload(PdfBuilder::new().page(&content));

            assert_eq!(scan(&before, &all_patterns()).len(), 1, "{}", variant.text);
            assert_eq!(redaction.result.removed, 1, "{}", variant.text);
            assert!(!redaction.result.is_partial(), "{}", variant.text);
            assert!(scan(&after, &all_patterns()).is_empty(), "{}", variant.text);
            assert!(after.text().contains("Keep this line"), "{}", variant.text);
        }
    }

    #[test]
    fn qr_stamp_is_dropped_and_other_images_kept() {
        let content = format!(
            "{}{}",
            image_op("Bg", 0.0, 0.0, 612.0, 792.0),
            image_op("Qr", 532.0, 20.0, 60.0, 60.0)
        );
        let (_, redaction, after) = redact_and_reload(PdfBuilder::new().page(&content));
        assert_eq!(redaction.result.removed, 1);
        let names: Vec<_> = after.images().map(|(_, i)| i.name.clone().unwrap()).collect();
        assert_eq!(names, ["Bg"]);
    }

    #[test]
    fn baked_watermark_is_covered_and_reported() {
        let content = format!(
            "{}BT 3 Tr /F1 10 Tf 300 30 Td (CamScanner) Tj ET\n",
            image_op("Bg", 0.0, 0.0, 612.0, 792.0)
        );
        let (_, redaction, after) = redact_and_reload(PdfBuilder::new().page(&content));
        assert_eq!(redaction.result.covered, 1);
        assert!(redaction.result.is_partial());
        assert!(matches!(
            redaction.result.warnings[0],
            RedactionWarning::PartialRedaction { page: 1, .. }
        ));

        // The cover is painted straight after the raster, in its unit space.
        let paint = after.operations.iter().position(|op| op.operator == "Do").unwrap();
        let ops: Vec<&str> = after.operations[paint + 1..paint + 6]
            .iter()
            .map(|op| op.operator.as_str())
            .collect();
        assert_eq!(ops, ["q", "rg", "re", "f", "Q"]);
        let width = crate::geometry::number(&after.operations[paint + 3].operands[2]).unwrap();
        assert!(width > 0.0 && width < 1.0);
        // The invisible text layer is gone too.
        assert!(!after.text().contains("CamScanner"));
    }

    #[test]
    fn unexcisable_text_falls_back_to_a_cover() {
        let content = format!(
            "{}BT /F1 0 Tf 72 30 Td (CamScanner) Tj ET\nBT /F1 10 Tf 300 30 Td (CamScanner) Tj ET\n",
            image_op("Bg", 0.0, 0.0, 612.0, 792.0)
        );
        let builder = PdfBuilder::new().page(&content);
        let mut doc = builder.into_document();
        let (number, id) = doc.get_pages().into_iter().next().unwrap();
        let page = crate::pdf::interpret::load_page(&doc, number, id).unwrap();

        // Force a zero-size match onto the first run; the scanner drops it as
        // having no area, so build it by hand.
        let mut matches = scan(&page, &all_patterns());
        assert_eq!(matches.len(), 1);
        let pattern = matches[0].pattern.clone();
        matches.push(Match {
            page: 1,
            element: 1,
            pattern,
            bbox: Rect::new(72.0, 28.0, 122.0, 38.0),
            target: MatchTarget::Glyphs { range: 0..10 },
        });

        let redaction = Redactor::new(Rgb::WHITE).redact(&page, &matches, &GREY);
        assert_eq!(redaction.result.removed, 1);
        assert_eq!(redaction.result.covered, 1);
        assert!(redaction.result.is_partial());

        doc.change_page_content(id, redaction.content.unwrap()).unwrap();
        let after = crate::pdf::interpret::load_page(&doc, number, id).unwrap();
        // The cover sits right after the first text object.
        let et = after.operations.iter().position(|op| op.operator == "ET").unwrap();
        assert_eq!(after.operations[et + 1].operator, "q");
        assert_eq!(after.operations[et + 2].operator, "cm");
        let rg: Vec<f32> = after.operations[et + 3]
            .operands
            .iter()
            .filter_map(crate::geometry::number)
            .collect();
        assert_eq!(rg, [0.5, 0.5, 0.5]);
    }

    #[test]
    fn fallback_fill_is_used_when_nothing_can_be_sampled() {
        struct Nothing;
        impl ColorSampler for Nothing {
            fn sample_around(&self, _: &ImagePlacement, _: &Rect) -> Option<Rgb> {
                None
            }
        }
        let content = format!(
            "{}BT 3 Tr /F1 10 Tf 300 30 Td (CamScanner) Tj ET\n",
            image_op("Bg", 0.0, 0.0, 612.0, 792.0)
        );
        let page = load_first_page(PdfBuilder::new().page(&content));
        let matches = scan(&page, &PatternCatalog::default().patterns_for(WatermarkClass::TextWatermark).to_vec());
        let fill = Rgb::from_u8(BG_PIXEL[0], 0, 0);
        let redaction = Redactor::new(fill).redact(&page, &matches, &Nothing);
        let ops = Content::decode(redaction.content.as_deref().unwrap()).unwrap().operations;
        let rg = ops.iter().find(|op| op.operator == "rg").unwrap();
        assert_eq!(crate::geometry::number(&rg.operands[0]), Some(fill.0));
    }
}
