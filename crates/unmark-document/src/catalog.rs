// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pattern catalog: the known scanner-app watermarks.
//
// Built once from configuration and shared read-only by every job.

use unmark_core::Rect;
use unmark_core::config::{CatalogConfig, QrHeuristicConfig};
use unmark_core::types::{Operation, WatermarkClass};

use crate::normalize::normalize;

/// Built-in watermark strings and their language tags.
const BUILTIN_TEXT_VARIANTS: &[(&str, &str)] = &[
    ("扫描全能王", "zh"),
    ("全能扫描王", "zh"),
    ("CamScanner", "en"),
    ("Scanned with CamScanner", "en"),
    ("Created by CamScanner", "en"),
];

/// A watermark string.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPattern {
    /// The variant as it is usually printed.
    pub text: String,
    /// [`normalize`]d form used for comparison.
    pub normalized: String,
    pub language: String,
}

impl TextPattern {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            normalized: normalize(&text),
            text,
            language: language.into(),
        }
    }
}

/// Where and how big a QR stamp is, relative to the displayed page.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionHeuristic {
    pub region_left: f32,
    pub region_top: f32,
    pub min_area_fraction: f32,
    pub max_area_fraction: f32,
    pub max_height_fraction: f32,
    pub aspect_tolerance: f32,
}

impl From<&QrHeuristicConfig> for RegionHeuristic {
    fn from(config: &QrHeuristicConfig) -> Self {
        Self {
            region_left: config.region_left,
            region_top: config.region_top,
            min_area_fraction: config.min_area_fraction,
            max_area_fraction: config.max_area_fraction,
            max_height_fraction: config.max_height_fraction,
            aspect_tolerance: config.aspect_tolerance,
        }
    }
}

impl RegionHeuristic {
    /// Test a box given in display space (top-left origin, y down) against a
    /// page of `page_width` × `page_height`.
    pub fn matches(&self, display: &Rect, page_width: f32, page_height: f32) -> bool {
        if display.is_empty() || page_width <= 0.0 || page_height <= 0.0 {
            return false;
        }

        let inside_region = display.x0 >= self.region_left * page_width
            && display.y0 >= self.region_top * page_height
            && display.x1 <= page_width
            && display.y1 <= page_height;

        let area_fraction = display.area() / (page_width * page_height);
        let sized = area_fraction >= self.min_area_fraction
            && area_fraction <= self.max_area_fraction
            && display.height() <= self.max_height_fraction * page_height;

        let aspect = display.width() / display.height();
        let square = (aspect - 1.0).abs() <= self.aspect_tolerance;

        inside_region && sized && square
    }
}

/// A known watermark.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Text(TextPattern),
    Region(RegionHeuristic),
}

impl Pattern {
    /// Short label for logs and reports.
    pub fn label(&self) -> &str {
        match self {
            Pattern::Text(text) => &text.text,
            Pattern::Region(_) => "qrcode",
        }
    }
}

/// Immutable registry of watermark patterns, keyed by class.
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    text: Vec<Pattern>,
    qrcode: Vec<Pattern>,
}

impl Default for PatternCatalog {
    fn default() -> Self {
        Self::new(&CatalogConfig::default())
    }
}

impl PatternCatalog {
    pub fn new(config: &CatalogConfig) -> Self {
        let mut text: Vec<Pattern> = BUILTIN_TEXT_VARIANTS
            .iter()
            .map(|(variant, lang)| Pattern::Text(TextPattern::new(*variant, *lang)))
            .collect();

        for extra in &config.extra_text_variants {
            let pattern = TextPattern::new(extra.text.clone(), extra.language.clone());
            if pattern.normalized.is_empty() {
                continue;
            }
            if !text.iter().any(|p| matches!(p, Pattern::Text(t) if t.normalized == pattern.normalized)) {
                text.push(Pattern::Text(pattern));
            }
        }

        Self {
            text,
            qrcode: vec![Pattern::Region(RegionHeuristic::from(&config.qrcode))],
        }
    }

    pub fn patterns_for(&self, class: WatermarkClass) -> &[Pattern] {
        match class {
            WatermarkClass::TextWatermark => &self.text,
            WatermarkClass::QrcodeWatermark => &self.qrcode,
        }
    }

    /// Patterns an operation should look for. Merging looks for nothing.
    pub fn for_operation(&self, operation: Operation) -> &[Pattern] {
        match operation {
            Operation::RemoveWatermark => self.patterns_for(WatermarkClass::TextWatermark),
            Operation::RemoveQrcode => self.patterns_for(WatermarkClass::QrcodeWatermark),
            Operation::Merge => &[],
        }
    }

    /// Patterns for any combination of classes, in class order.
    pub fn select(&self, text: bool, qrcode: bool) -> Vec<Pattern> {
        let mut patterns = Vec::new();
        if text {
            patterns.extend_from_slice(&self.text);
        }
        if qrcode {
            patterns.extend_from_slice(&self.qrcode);
        }
        patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unmark_core::config::TextVariant;

    #[test]
    fn builtin_text_variants_are_bilingual() {
        let catalog = PatternCatalog::default();
        let texts: Vec<&str> = catalog
            .patterns_for(WatermarkClass::TextWatermark)
            .iter()
            .map(Pattern::label)
            .collect();
        assert!(texts.contains(&"扫描全能王"));
        assert!(texts.contains(&"全能扫描王"));
        assert!(texts.contains(&"Scanned with CamScanner"));
        assert_eq!(texts.len(), 5);
    }

    #[test]
    fn extra_variants_are_deduplicated() {
        let config = CatalogConfig {
            extra_text_variants: vec![
                TextVariant { text: "camscanner".into(), language: "en".into() },
                TextVariant { text: "Made with Example".into(), language: "en".into() },
                TextVariant { text: "   ".into(), language: "en".into() },
            ],
            ..Default::default()
        };
        let catalog = PatternCatalog::new(&config);
        assert_eq!(catalog.patterns_for(WatermarkClass::TextWatermark).len(), 6);
    }

    #[test]
    fn qrcode_class_is_one_region_heuristic() {
        let catalog = PatternCatalog::default();
        let patterns = catalog.patterns_for(WatermarkClass::QrcodeWatermark);
        assert_eq!(patterns.len(), 1);
        assert!(matches!(patterns[0], Pattern::Region(_)));
        assert!(catalog.for_operation(Operation::Merge).is_empty());
    }

    #[test]
    fn heuristic_is_relative_to_page_size() {
        let heuristic = RegionHeuristic::from(&QrHeuristicConfig::default());
        // Letter page, 60pt stamp in the bottom-right corner.
        assert!(heuristic.matches(&Rect::new(540.0, 712.0, 600.0, 772.0), 612.0, 792.0));
        // Same stamp top-left.
        assert!(!heuristic.matches(&Rect::new(12.0, 20.0, 72.0, 80.0), 612.0, 792.0));
        // Same relative spot on an A5 page.
        assert!(heuristic.matches(&Rect::new(370.0, 520.0, 410.0, 560.0), 420.0, 595.0));
    }

    #[test]
    fn heuristic_rejects_wide_or_huge_images() {
        let heuristic = RegionHeuristic::from(&QrHeuristicConfig::default());
        // A footer banner: right place, wrong shape.
        assert!(!heuristic.matches(&Rect::new(420.0, 740.0, 610.0, 770.0), 612.0, 792.0));
        // A square that is far too large for a stamp.
        assert!(!heuristic.matches(&Rect::new(400.0, 560.0, 612.0, 772.0), 612.0, 792.0));
        // A speck.
        assert!(!heuristic.matches(&Rect::new(600.0, 780.0, 602.0, 782.0), 612.0, 792.0));
    }
}
