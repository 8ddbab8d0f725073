// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for unmark.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a processing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the caller wants done with the input document(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    RemoveWatermark,
    RemoveQrcode,
    Merge,
}

impl Operation {
    /// Keyword used on the command line and in reports.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::RemoveWatermark => "remove-watermark",
            Self::RemoveQrcode => "remove-qrcode",
            Self::Merge => "merge",
        }
    }
}

/// The two families of known watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkClass {
    /// Scanner-app branding strings ("CamScanner", "扫描全能王", ...).
    TextWatermark,
    /// The square QR stamp in the bottom-right corner.
    QrcodeWatermark,
}

/// Options for the combined clean-then-merge flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOptions {
    pub remove_text: bool,
    pub remove_qr: bool,
    pub merge: bool,
    /// Drop unreferenced objects and deflate streams before serializing.
    pub compress: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            remove_text: true,
            remove_qr: true,
            merge: true,
            compress: true,
        }
    }
}

/// Lifecycle states of a processing job.
///
/// Redaction jobs go `Loaded -> Scanning -> Redacting -> Finalized`, merge
/// jobs go `Loaded -> Merging -> Finalized`. `Failed` is reachable from any
/// non-terminal state. No state is ever re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Loaded,
    Scanning,
    Redacting,
    Merging,
    Finalized,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Failed)
    }

    /// Whether `self -> next` is an edge of the job state machine.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Loaded, Scanning) | (Loaded, Merging) => true,
            (Scanning, Redacting) => true,
            // A batch job cleans its inputs before merging them.
            (Redacting, Merging) => true,
            (Redacting, Finalized) | (Merging, Finalized) => true,
            _ => false,
        }
    }
}

/// Axis-aligned rectangle in PDF user space (origin bottom-left, y up).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// Build a rectangle from two corners in any order.
    pub fn new(xa: f32, ya: f32, xb: f32, yb: f32) -> Self {
        Self {
            x0: xa.min(xb),
            y0: ya.min(yb),
            x1: xa.max(xb),
            y1: ya.max(yb),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    /// `other` lies fully inside `self` (edges may touch).
    pub fn contains(&self, other: &Rect) -> bool {
        other.x0 >= self.x0 && other.x1 <= self.x1 && other.y0 >= self.y0 && other.y1 <= self.y1
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    /// Overlapping area of two rectangles, `None` when they do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let clipped = Rect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        (!clipped.is_empty()).then_some(clipped)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// An RGB colour with components in `0.0..=1.0`, as PDF `rg` expects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const WHITE: Rgb = Rgb(1.0, 1.0, 1.0);

    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

/// A non-fatal problem met while redacting one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RedactionWarning {
    /// The match could not be cleanly excised; its region was painted over.
    PartialRedaction { page: u32, region: Rect, reason: String },
    /// The page's content stream could not be decoded; it was left untouched.
    PageSkipped { page: u32, reason: String },
}

impl RedactionWarning {
    pub fn page(&self) -> u32 {
        match self {
            Self::PartialRedaction { page, .. } | Self::PageSkipped { page, .. } => *page,
        }
    }
}

/// Per-page redaction counts. Reporting only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedactionResult {
    /// 1-indexed page number.
    pub page: u32,
    /// Matches removed from the content stream.
    pub removed: usize,
    /// Matches painted over instead of removed.
    pub covered: usize,
    pub warnings: Vec<RedactionWarning>,
}

impl RedactionResult {
    pub fn for_page(page: u32) -> Self {
        Self {
            page,
            ..Default::default()
        }
    }

    /// Total matches handled on this page.
    pub fn total(&self) -> usize {
        self.removed + self.covered
    }

    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Summary handed back to the shell after a job finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub operation: Option<Operation>,
    pub files: usize,
    pub pages: usize,
    pub pages_with_matches: usize,
    pub matches_removed: usize,
    pub regions_covered: usize,
    pub page_results: Vec<RedactionResult>,
    /// SHA-256 of each input document, in input order.
    pub input_hashes: Vec<String>,
    pub output_hash: String,
    pub output_bytes: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    /// Total watermarks handled, removed or covered.
    pub fn watermarks(&self) -> usize {
        self.matches_removed + self.regions_covered
    }

    /// Pages where at least one match had to be covered instead of removed.
    pub fn partial_pages(&self) -> Vec<u32> {
        self.page_results
            .iter()
            .filter(|r| r.is_partial())
            .map(|r| r.page)
            .collect()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &RedactionWarning> {
        self.page_results.iter().flat_map(|r| r.warnings.iter())
    }
}

/// A watermark string found by [`ScanReport`] analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextHit {
    pub page: u32,
    pub text: String,
    pub bbox: Rect,
}

/// A QR-like image found by [`ScanReport`] analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageHit {
    pub page: u32,
    /// Top-left corner relative to the displayed page (0..1, y down).
    pub position: (f32, f32),
    /// Placed size in points.
    pub size: (f32, f32),
}

/// A short piece of first-page text, as listed by [`ScanReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    /// Font size in text space units.
    pub size: f32,
}

/// Read-only analysis of a document's watermarks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub pages: usize,
    pub images: usize,
    pub has_text_watermark: bool,
    pub has_qr_watermark: bool,
    pub text_hits: Vec<TextHit>,
    pub image_hits: Vec<ImageHit>,
    /// Spans of 2 to 29 characters on the first page, in content order.
    pub text_details: Vec<TextSpan>,
}
