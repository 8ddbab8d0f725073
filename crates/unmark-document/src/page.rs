// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page model: the decoded content stream of one page and the drawable
// elements derived from it.

use std::ops::Range;

use lopdf::ObjectId;
use lopdf::content::Operation;
use unmark_core::Rect;

use crate::geometry::{Matrix, to_display};

/// One page, decoded.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-indexed page number.
    pub number: u32,
    /// Page object in the owning document.
    pub id: ObjectId,
    /// Visible area (CropBox, else MediaBox) in user space.
    pub bounds: Rect,
    /// `/Rotate`, normalized to 0, 90, 180 or 270.
    pub rotation: i32,
    /// The page's content stream operations, in paint order.
    pub operations: Vec<Operation>,
    /// Elements in paint order; indices are stable element references.
    pub elements: Vec<ContentElement>,
}

impl Page {
    pub fn width(&self) -> f32 {
        self.bounds.width()
    }

    pub fn height(&self) -> f32 {
        self.bounds.height()
    }

    /// Width and height as a viewer shows the page.
    pub fn display_size(&self) -> (f32, f32) {
        if self.rotation % 180 == 0 {
            (self.width(), self.height())
        } else {
            (self.height(), self.width())
        }
    }

    /// A user-space box in display space (top-left origin, y down).
    pub fn to_display(&self, rect: &Rect) -> Rect {
        to_display(rect, &self.bounds, self.rotation)
    }

    /// Clip a box to the page; `None` if it lies entirely off the page.
    pub fn clip(&self, rect: &Rect) -> Option<Rect> {
        self.bounds.intersection(rect)
    }

    pub fn text_runs(&self) -> impl Iterator<Item = (usize, &TextRun)> {
        self.elements.iter().enumerate().filter_map(|(i, e)| match e {
            ContentElement::Text(run) => Some((i, run)),
            _ => None,
        })
    }

    pub fn images(&self) -> impl Iterator<Item = (usize, &ImagePlacement)> {
        self.elements.iter().enumerate().filter_map(|(i, e)| match e {
            ContentElement::Image(image) => Some((i, image)),
            _ => None,
        })
    }

    /// Decoded text of every run, one run per line.
    pub fn text(&self) -> String {
        self.text_runs()
            .map(|(_, run)| run.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The topmost image painted before element `before` that covers the
    /// given point.
    pub fn image_beneath(&self, before: usize, x: f32, y: f32) -> Option<(usize, &ImagePlacement)> {
        self.images()
            .filter(|(i, image)| *i < before && image.bbox.contains_point(x, y))
            .last()
    }
}

/// An atomic drawable unit on a page.
#[derive(Debug, Clone)]
pub enum ContentElement {
    Text(TextRun),
    Image(ImagePlacement),
    Vector(VectorDrawing),
}

impl ContentElement {
    pub fn bbox(&self) -> Rect {
        match self {
            ContentElement::Text(run) => run.bbox,
            ContentElement::Image(image) => image.bbox,
            ContentElement::Vector(vector) => vector.bbox,
        }
    }
}

/// One text object (`BT … ET`).
#[derive(Debug, Clone)]
pub struct TextRun {
    /// Index of the `BT` operation.
    pub begin_op: usize,
    /// Index of the matching `ET` operation.
    pub end_op: usize,
    /// CTM in force for the whole text object.
    pub ctm: Matrix,
    /// Decoded text, with a space inserted where glyphs are visibly apart.
    pub content: String,
    /// For every char of `content`, the glyph it came from.
    pub char_glyphs: Vec<Option<usize>>,
    pub glyphs: Vec<Glyph>,
    pub bbox: Rect,
}

impl TextRun {
    /// Split `content` wherever the font or its size changes.
    ///
    /// Returns each span's text with its font size; inserted spaces join
    /// the span they follow.
    pub fn spans(&self) -> Vec<(String, f32)> {
        let mut spans: Vec<(String, f32)> = Vec::new();
        let mut current: Option<(&str, f32)> = None;
        for (c, glyph) in self.content.chars().zip(self.char_glyphs.iter().copied()) {
            let style = glyph.map(|g| (self.glyphs[g].font.as_str(), self.glyphs[g].font_size));
            match style {
                Some(style) if current != Some(style) => {
                    current = Some(style);
                    spans.push((c.to_string(), style.1));
                }
                _ => {
                    if let Some(last) = spans.last_mut() {
                        last.0.push(c);
                    }
                }
            }
        }
        spans
    }

    pub fn glyph_bbox(&self, range: Range<usize>) -> Option<Rect> {
        self.glyphs[range]
            .iter()
            .map(|g| g.bbox)
            .reduce(|acc, b| acc.union(&b))
    }
}

/// One shown character code.
#[derive(Debug, Clone)]
pub struct Glyph {
    /// Index of the text-showing operation.
    pub op_index: usize,
    /// String slot inside that operation: the array index for `TJ`, 0 for
    /// `Tj`, `'` and `"`.
    pub item: usize,
    /// Byte range of the character code inside the string.
    pub bytes: Range<usize>,
    pub text: String,
    /// Horizontal advance in unscaled text space: `w0·Tfs + Tc (+ Tw)`.
    pub advance: f32,
    /// Font resource name (`F1`), empty when no font was selected.
    pub font: String,
    pub font_size: f32,
    pub bbox: Rect,
    /// Rendering mode 3 or 7 (OCR text layers).
    pub invisible: bool,
}

/// An image XObject `Do` or an inline image.
#[derive(Debug, Clone)]
pub struct ImagePlacement {
    /// `Do`, or `BI` through `EI` for inline images.
    pub ops: Range<usize>,
    /// Resource name (`/Im0`), `None` for inline images.
    pub name: Option<String>,
    pub xobject: Option<ObjectId>,
    /// Maps the image's unit square to user space.
    pub matrix: Matrix,
    pub bbox: Rect,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl ImagePlacement {
    /// Index of the operation that paints the image.
    pub fn paint_op(&self) -> usize {
        self.ops.end.saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorKind {
    Path,
    Shading,
    Form,
}

/// Path painting, shading fills and form XObjects.
#[derive(Debug, Clone)]
pub struct VectorDrawing {
    pub kind: VectorKind,
    pub ops: Range<usize>,
    pub bbox: Rect,
}
