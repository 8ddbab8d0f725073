// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page content scanner: find watermark occurrences among a page's elements.
//
// Read-only over the page. Text runs are normalized with a char-to-glyph map
// so that a matched substring resolves back to the glyphs that drew it;
// images are tested against region heuristics in display space.

use std::cmp::Reverse;
use std::ops::Range;

use tracing::{debug, trace};
use unmark_core::Rect;

use crate::catalog::{Pattern, RegionHeuristic, TextPattern};
use crate::normalize::normalize_mapped;
use crate::page::{ContentElement, ImagePlacement, Page, TextRun};

/// What a match points at, and so how it gets removed.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchTarget {
    /// Glyphs `range` of the text run at the match's element index.
    Glyphs { range: Range<usize> },
    /// The whole image at the match's element index.
    Placement,
    /// Watermark pixels inside the image at the match's element index, found
    /// through the invisible text layer drawn over it (glyphs `range` of the
    /// text run at index `run`).
    BakedText { run: usize, range: Range<usize> },
}

/// One watermark occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub page: u32,
    /// Index into [`Page::elements`].
    pub element: usize,
    pub pattern: Pattern,
    /// User-space box, clipped to the page.
    pub bbox: Rect,
    pub target: MatchTarget,
}

/// Find every occurrence of `patterns` on `page`, top-to-bottom then
/// left-to-right as the page is displayed.
pub fn scan(page: &Page, patterns: &[Pattern]) -> Vec<Match> {
    let text_patterns: Vec<&TextPattern> = patterns
        .iter()
        .filter_map(|p| match p {
            Pattern::Text(text) => Some(text),
            Pattern::Region(_) => None,
        })
        .collect();
    let region_patterns: Vec<&RegionHeuristic> = patterns
        .iter()
        .filter_map(|p| match p {
            Pattern::Region(region) => Some(region),
            Pattern::Text(_) => None,
        })
        .collect();

    let mut matches = Vec::new();
    for (index, element) in page.elements.iter().enumerate() {
        match element {
            ContentElement::Text(run) if !text_patterns.is_empty() => {
                scan_run(page, index, run, &text_patterns, &mut matches);
            }
            ContentElement::Image(image) if !region_patterns.is_empty() => {
                scan_image(page, index, image, &region_patterns, &mut matches);
            }
            ContentElement::Text(_) | ContentElement::Image(_) => {}
            // Known watermarks are never vector art.
            ContentElement::Vector(_) => {}
        }
    }

    matches.sort_by(|a, b| {
        let (da, db) = (page.to_display(&a.bbox), page.to_display(&b.bbox));
        da.y0
            .total_cmp(&db.y0)
            .then(da.x0.total_cmp(&db.x0))
            .then(a.element.cmp(&b.element))
    });

    if !matches.is_empty() {
        debug!(page = page.number, matches = matches.len(), "watermarks found");
    }
    matches
}

fn scan_run(page: &Page, index: usize, run: &TextRun, patterns: &[&TextPattern], out: &mut Vec<Match>) {
    let mapped = normalize_mapped(run.content.chars().zip(run.char_glyphs.iter().copied()));
    let haystack: Vec<char> = mapped.iter().map(|(c, _)| *c).collect();

    // (start, length, pattern) of every occurrence of every pattern.
    let mut candidates: Vec<(usize, usize, &TextPattern)> = Vec::new();
    for pattern in patterns {
        let needle: Vec<char> = pattern.normalized.chars().collect();
        if needle.is_empty() || needle.len() > haystack.len() {
            continue;
        }
        for start in 0..=haystack.len() - needle.len() {
            if haystack[start..start + needle.len()] == needle[..] {
                candidates.push((start, needle.len(), pattern));
            }
        }
    }
    // Leftmost first, longest first at the same start; then drop overlaps.
    candidates.sort_by_key(|(start, len, _)| (*start, Reverse(*len)));

    let mut taken_until = 0;
    for (start, len, pattern) in candidates {
        if start < taken_until {
            continue;
        }
        let glyphs: Vec<usize> = mapped[start..start + len].iter().filter_map(|(_, g)| *g).collect();
        let (Some(first), Some(last)) = (glyphs.iter().min(), glyphs.iter().max()) else {
            continue;
        };
        let range = *first..*last + 1;
        let Some(bbox) = run.glyph_bbox(range.clone()).and_then(|b| page.clip(&b)) else {
            trace!(page = page.number, pattern = %pattern.text, "match lies off the page");
            continue;
        };
        taken_until = start + len;

        let over_raster = run.glyphs[range.clone()]
            .iter()
            .all(|g| g.invisible)
            .then(|| {
                let (cx, cy) = bbox.center();
                page.image_beneath(index, cx, cy)
            })
            .flatten();

        let found = match over_raster {
            Some((image_index, image)) => Match {
                page: page.number,
                element: image_index,
                pattern: Pattern::Text(pattern.clone()),
                bbox: bbox.intersection(&image.bbox).unwrap_or(bbox),
                target: MatchTarget::BakedText { run: index, range },
            },
            None => Match {
                page: page.number,
                element: index,
                pattern: Pattern::Text(pattern.clone()),
                bbox,
                target: MatchTarget::Glyphs { range },
            },
        };
        out.push(found);
    }
}

fn scan_image(
    page: &Page,
    index: usize,
    image: &ImagePlacement,
    patterns: &[&RegionHeuristic],
    out: &mut Vec<Match>,
) {
    let Some(bbox) = page.clip(&image.bbox) else {
        return;
    };
    let display = page.to_display(&bbox);
    let (width, height) = page.display_size();

    if let Some(heuristic) = patterns.iter().find(|h| h.matches(&display, width, height)) {
        out.push(Match {
            page: page.number,
            element: index,
            pattern: Pattern::Region((*heuristic).clone()),
            bbox,
            target: MatchTarget::Placement,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PatternCatalog;
    use crate::testing::{PdfBuilder, cjk_text, image_op, load_first_page, text_op};
    use unmark_core::types::WatermarkClass;

    fn text_patterns() -> Vec<Pattern> {
        PatternCatalog::default().patterns_for(WatermarkClass::TextWatermark).to_vec()
    }

    fn qr_patterns() -> Vec<Pattern> {
        PatternCatalog::default().patterns_for(WatermarkClass::QrcodeWatermark).to_vec()
    }

    #[test]
    fn every_catalog_variant_alone_gives_one_match() {
        for pattern in text_patterns() {
            let Pattern::Text(variant) = &pattern else { unreachable!() };
            let content = if variant.language == "zh" {
                cjk_text(300.0, 30.0, 12.0, &variant.text)
            } else {
                text_op(300.0, 30.0, 10.0, &variant.text)
            };
            let page = load_first_page(PdfBuilder::new().page(&content));
            let matches = scan(&page, &text_patterns());
            assert_eq!(matches.len(), 1, "variant {:?}", variant.text);
            assert_eq!(matches[0].pattern.label(), variant.text);
        }
    }

    #[test]
    fn longest_variant_wins_over_contained_one() {
        let page = load_first_page(PdfBuilder::new().page(&text_op(300.0, 30.0, 10.0, "Scanned with CamScanner")));
        let matches = scan(&page, &text_patterns());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].pattern.label(), "Scanned with CamScanner");
        assert_eq!(matches[0].target, MatchTarget::Glyphs { range: 0..23 });
    }

    #[test]
    fn case_and_width_are_folded() {
        let page = load_first_page(PdfBuilder::new().page(&text_op(72.0, 400.0, 10.0, "Invoice -- CAMSCANNER")));
        let matches = scan(&page, &text_patterns());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].target, MatchTarget::Glyphs { range: 11..21 });
    }

    #[test]
    fn repeated_occurrences_are_separate_matches_in_reading_order() {
        let content = format!(
            "{}{}{}",
            text_op(72.0, 30.0, 10.0, "CamScanner"),
            text_op(72.0, 760.0, 10.0, "CamScanner CamScanner"),
            cjk_text(300.0, 400.0, 12.0, "扫描全能王"),
        );
        let page = load_first_page(PdfBuilder::new().page(&content));
        let matches = scan(&page, &text_patterns());
        assert_eq!(matches.len(), 4);
        // Top of the page first, then left to right.
        assert_eq!(matches[0].element, 1);
        assert_eq!(matches[1].element, 1);
        assert!(matches[0].bbox.x0 < matches[1].bbox.x0);
        assert_eq!(matches[2].pattern.label(), "扫描全能王");
        assert_eq!(matches[3].element, 0);
    }

    #[test]
    fn ordinary_text_has_no_matches() {
        let page = load_first_page(PdfBuilder::new().page(&text_op(72.0, 700.0, 12.0, "Quarterly report")));
        assert!(scan(&page, &text_patterns()).is_empty());
        assert!(scan(&page, &[]).is_empty());
    }

    #[test]
    fn chinese_variants_are_distinct() {
        let page = load_first_page(PdfBuilder::new().page(&cjk_text(72.0, 700.0, 12.0, "全能扫描王")));
        let matches = scan(&page, &text_patterns());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].pattern.label(), "全能扫描王");
    }

    #[test]
    fn off_page_text_is_discarded() {
        let page = load_first_page(PdfBuilder::new().page(&text_op(-500.0, 30.0, 10.0, "CamScanner")));
        assert!(scan(&page, &text_patterns()).is_empty());
    }

    #[test]
    fn qr_region_depends_on_corner() {
        let top_left = load_first_page(PdfBuilder::new().page(&image_op("Qr", 20.0, 712.0, 60.0, 60.0)));
        assert!(scan(&top_left, &qr_patterns()).is_empty());

        let bottom_right = load_first_page(PdfBuilder::new().page(&image_op("Qr", 532.0, 20.0, 60.0, 60.0)));
        let matches = scan(&bottom_right, &qr_patterns());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].target, MatchTarget::Placement);
        assert_eq!(matches[0].pattern.label(), "qrcode");
    }

    #[test]
    fn qr_region_follows_page_rotation() {
        // A half turn shows the user-space top-left corner at the bottom right.
        let rotated = load_first_page(PdfBuilder::new().page_with(
            &image_op("Qr", 20.0, 712.0, 60.0, 60.0),
            [0.0, 0.0, 612.0, 792.0],
            180,
        ));
        assert_eq!(scan(&rotated, &qr_patterns()).len(), 1);
    }

    #[test]
    fn large_background_image_is_not_a_qr_code() {
        let page = load_first_page(PdfBuilder::new().page(&image_op("Bg", 0.0, 0.0, 612.0, 792.0)));
        assert!(scan(&page, &qr_patterns()).is_empty());
    }

    #[test]
    fn invisible_text_over_a_raster_targets_the_raster() {
        let content = format!(
            "{}BT 3 Tr /F1 10 Tf 300 30 Td (CamScanner) Tj ET\n",
            image_op("Bg", 0.0, 0.0, 612.0, 792.0)
        );
        let page = load_first_page(PdfBuilder::new().page(&content));
        let matches = scan(&page, &text_patterns());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].element, 0);
        assert_eq!(matches[0].target, MatchTarget::BakedText { run: 1, range: 0..10 });
    }

    #[test]
    fn visible_text_over_a_raster_is_still_text() {
        let content = format!("{}{}", image_op("Bg", 0.0, 0.0, 612.0, 792.0), text_op(300.0, 30.0, 10.0, "CamScanner"));
        let page = load_first_page(PdfBuilder::new().page(&content));
        let matches = scan(&page, &text_patterns());
        assert_eq!(matches[0].element, 1);
        assert!(matches!(matches[0].target, MatchTarget::Glyphs { .. }));
    }
}
