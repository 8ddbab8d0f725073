// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content stream interpreter.
//
// Walks a page's operations once, tracking the graphics and text state, and
// turns them into positioned elements: text runs with per-glyph boxes, image
// placements, and vector drawings.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace};
use unmark_core::Rect;
use unmark_core::error::{Result, UnmarkError};

use super::font::FontInfo;
use super::{inherited, resolve};
use crate::geometry::{Matrix, UNIT_SQUARE, number};
use crate::page::{ContentElement, Glyph, ImagePlacement, Page, TextRun, VectorDrawing, VectorKind};

/// US Letter, used when a page declares no usable box.
const DEFAULT_PAGE_BOX: Rect = Rect {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// Decode one page of `doc` into a [`Page`].
///
/// Fails with [`UnmarkError::UnsupportedStructure`] when the content stream
/// cannot be decoded; the caller decides whether that skips the page or the
/// whole job.
pub fn load_page(doc: &Document, number: u32, page_id: ObjectId) -> Result<Page> {
    let bounds = page_bounds(doc, page_id);
    let rotation = page_rotation(doc, page_id);

    let has_contents = super::dict_of(doc, page_id).is_some_and(|d| d.has(b"Contents"));
    let operations = if has_contents {
        let data = doc.get_page_content(page_id).map_err(|err| {
            UnmarkError::UnsupportedStructure(format!("page {number}: unreadable content stream: {err}"))
        })?;
        Content::decode(&data)
            .map_err(|err| {
                UnmarkError::UnsupportedStructure(format!("page {number}: undecodable content stream: {err}"))
            })?
            .operations
    } else {
        Vec::new()
    };

    let resources = inherited(doc, page_id, b"Resources").and_then(|o| o.as_dict().ok());
    let elements = Interpreter::new(doc, resources, bounds).run(&operations);

    debug!(
        page = number,
        operations = operations.len(),
        elements = elements.len(),
        "page interpreted"
    );

    Ok(Page {
        number,
        id: page_id,
        bounds,
        rotation,
        operations,
        elements,
    })
}

/// CropBox if present, else MediaBox, else US Letter.
pub fn page_bounds(doc: &Document, page_id: ObjectId) -> Rect {
    [b"CropBox".as_slice(), b"MediaBox".as_slice()]
        .into_iter()
        .filter_map(|key| inherited(doc, page_id, key))
        .filter_map(|obj| box_from(doc, obj))
        .next()
        .unwrap_or(DEFAULT_PAGE_BOX)
}

fn box_from(doc: &Document, obj: &Object) -> Option<Rect> {
    let values: Vec<f32> = obj
        .as_array()
        .ok()?
        .iter()
        .filter_map(|v| number(resolve(doc, v)))
        .collect();
    match values.as_slice() {
        [a, b, c, d] => {
            let rect = Rect::new(*a, *b, *c, *d);
            (!rect.is_empty()).then_some(rect)
        }
        _ => None,
    }
}

/// `/Rotate` normalized to 0, 90, 180 or 270.
pub fn page_rotation(doc: &Document, page_id: ObjectId) -> i32 {
    let raw = inherited(doc, page_id, b"Rotate")
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(0);
    let turned = raw.rem_euclid(360) as i32;
    if turned % 90 == 0 { turned } else { 0 }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    font: Option<Vec<u8>>,
    font_size: f32,
    rise: f32,
    render_mode: i64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            font: None,
            font_size: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

struct TextObject {
    begin_op: usize,
    ctm: Matrix,
    tm: Matrix,
    tlm: Matrix,
    glyphs: Vec<Glyph>,
}

struct PathBuilder {
    start: usize,
    bbox: Option<Rect>,
}

impl PathBuilder {
    fn add(&mut self, x: f32, y: f32) {
        let point = Rect::new(x, y, x, y);
        self.bbox = Some(match self.bbox {
            Some(bbox) => bbox.union(&point),
            None => point,
        });
    }
}

struct Interpreter<'a> {
    doc: &'a Document,
    resources: Option<&'a Dictionary>,
    bounds: Rect,
    fonts: HashMap<Vec<u8>, Rc<FontInfo>>,
    fallback_font: Rc<FontInfo>,
    state: GraphicsState,
    saved: Vec<GraphicsState>,
    text: Option<TextObject>,
    path: Option<PathBuilder>,
    elements: Vec<ContentElement>,
}

impl<'a> Interpreter<'a> {
    fn new(doc: &'a Document, resources: Option<&'a Dictionary>, bounds: Rect) -> Self {
        Self {
            doc,
            resources,
            bounds,
            fonts: HashMap::new(),
            fallback_font: Rc::new(FontInfo::default()),
            state: GraphicsState::default(),
            saved: Vec::new(),
            text: None,
            path: None,
            elements: Vec::new(),
        }
    }

    fn run(mut self, ops: &[Operation]) -> Vec<ContentElement> {
        let mut i = 0;
        while i < ops.len() {
            i = self.step(ops, i) + 1;
        }
        if self.text.is_some() {
            self.end_text(ops.len().saturating_sub(1));
        }
        self.elements
    }

    /// Execute `ops[i]`; returns the index of the last operation consumed.
    fn step(&mut self, ops: &[Operation], i: usize) -> usize {
        let op = &ops[i];
        let operands = op.operands.as_slice();
        let num = |k: usize| operands.get(k).and_then(number);

        match op.operator.as_str() {
            "q" => self.saved.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.saved.pop() {
                    self.state = state;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.state.ctm = m.then(&self.state.ctm);
                }
            }

            "BT" => {
                if self.text.is_some() {
                    self.end_text(i.saturating_sub(1));
                }
                self.text = Some(TextObject {
                    begin_op: i,
                    ctm: self.state.ctm,
                    tm: Matrix::IDENTITY,
                    tlm: Matrix::IDENTITY,
                    glyphs: Vec::new(),
                });
            }
            "ET" => self.end_text(i),

            "Tf" => {
                self.state.font = operands.first().and_then(|o| o.as_name().ok()).map(<[u8]>::to_vec);
                if let Some(size) = num(1) {
                    self.state.font_size = size;
                }
            }
            "Tc" => self.state.char_spacing = num(0).unwrap_or(0.0),
            "Tw" => self.state.word_spacing = num(0).unwrap_or(0.0),
            "Tz" => self.state.horizontal_scale = num(0).unwrap_or(100.0) / 100.0,
            "TL" => self.state.leading = num(0).unwrap_or(0.0),
            "Ts" => self.state.rise = num(0).unwrap_or(0.0),
            "Tr" => self.state.render_mode = operands.first().and_then(|o| o.as_i64().ok()).unwrap_or(0),

            "Td" => self.move_line(num(0).unwrap_or(0.0), num(1).unwrap_or(0.0)),
            "TD" => {
                let ty = num(1).unwrap_or(0.0);
                self.state.leading = -ty;
                self.move_line(num(0).unwrap_or(0.0), ty);
            }
            "Tm" => {
                if let (Some(m), Some(text)) = (Matrix::from_operands(operands), self.text.as_mut()) {
                    text.tm = m;
                    text.tlm = m;
                }
            }
            "T*" => self.next_line(),

            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(i, 0, bytes);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(i, 0, bytes);
                }
            }
            "\"" => {
                self.state.word_spacing = num(0).unwrap_or(self.state.word_spacing);
                self.state.char_spacing = num(1).unwrap_or(self.state.char_spacing);
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(i, 0, bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for (item, element) in items.iter().enumerate() {
                        match element {
                            Object::String(bytes, _) => self.show(i, item, bytes),
                            other => {
                                if let Some(adjust) = number(other) {
                                    let tx = -adjust / 1000.0
                                        * self.state.font_size
                                        * self.state.horizontal_scale;
                                    self.advance(tx);
                                }
                            }
                        }
                    }
                }
            }

            "Do" => {
                if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                    self.paint_xobject(i, name);
                }
            }
            "BI" => return self.inline_image(ops, i),

            "m" | "l" => {
                if let (Some(x), Some(y)) = (num(0), num(1)) {
                    self.path_point(i, x, y);
                }
            }
            "c" => {
                for k in [0, 2, 4] {
                    if let (Some(x), Some(y)) = (num(k), num(k + 1)) {
                        self.path_point(i, x, y);
                    }
                }
            }
            "v" | "y" => {
                for k in [0, 2] {
                    if let (Some(x), Some(y)) = (num(k), num(k + 1)) {
                        self.path_point(i, x, y);
                    }
                }
            }
            "re" => {
                if let (Some(x), Some(y), Some(w), Some(h)) = (num(0), num(1), num(2), num(3)) {
                    self.path_point(i, x, y);
                    self.path_point(i, x + w, y + h);
                    self.path_point(i, x + w, y);
                    self.path_point(i, x, y + h);
                }
            }
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                if let Some(path) = self.path.take() {
                    if let Some(bbox) = path.bbox {
                        self.elements.push(ContentElement::Vector(VectorDrawing {
                            kind: VectorKind::Path,
                            ops: path.start..i + 1,
                            bbox,
                        }));
                    }
                }
            }
            "n" => self.path = None,
            "sh" => self.elements.push(ContentElement::Vector(VectorDrawing {
                kind: VectorKind::Shading,
                ops: i..i + 1,
                bbox: self.bounds,
            })),

            other => trace!(operator = other, "operator ignored"),
        }
        i
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        if let Some(text) = self.text.as_mut() {
            text.tlm = Matrix::translate(tx, ty).then(&text.tlm);
            text.tm = text.tlm;
        }
    }

    fn next_line(&mut self) {
        let leading = self.state.leading;
        self.move_line(0.0, -leading);
    }

    fn advance(&mut self, tx: f32) {
        if let Some(text) = self.text.as_mut() {
            text.tm = Matrix::translate(tx, 0.0).then(&text.tm);
        }
    }

    fn current_font(&mut self) -> Rc<FontInfo> {
        let Some(name) = self.state.font.clone() else {
            return Rc::clone(&self.fallback_font);
        };
        if let Some(font) = self.fonts.get(&name) {
            return Rc::clone(font);
        }
        let font = match self.resource(b"Font", &name) {
            Some((_, obj)) => match obj.as_dict() {
                Ok(dict) => Rc::new(FontInfo::load(self.doc, dict)),
                Err(_) => Rc::clone(&self.fallback_font),
            },
            None => {
                debug!(font = %String::from_utf8_lossy(&name), "font resource missing");
                Rc::clone(&self.fallback_font)
            }
        };
        self.fonts.insert(name, Rc::clone(&font));
        font
    }

    /// Lay out one shown string.
    fn show(&mut self, op_index: usize, item: usize, bytes: &[u8]) {
        if self.text.is_none() {
            return;
        }
        let font = self.current_font();
        let state = &self.state;
        let fs = state.font_size;
        let th = state.horizontal_scale;
        let invisible = matches!(state.render_mode, 3 | 7);
        let font_name = state
            .font
            .as_deref()
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .unwrap_or_default();
        let glyph_space = Matrix::new(fs * th, 0.0, 0.0, fs, 0.0, state.rise);

        let Some(text) = self.text.as_mut() else {
            return;
        };
        for (code, range) in font.codes(bytes) {
            let w0 = font.width(code);
            let trm = glyph_space.then(&text.tm).then(&state.ctm);
            let bbox = trm.transform_rect(&Rect::new(0.0, font.descent, w0, font.ascent));
            let mut advance = w0 * fs + state.char_spacing;
            if font.is_word_space(code) {
                advance += state.word_spacing;
            }
            text.glyphs.push(Glyph {
                op_index,
                item,
                bytes: range,
                text: font.decode(code),
                advance,
                font: font_name.clone(),
                font_size: fs,
                bbox,
                invisible,
            });
            text.tm = Matrix::translate(advance * th, 0.0).then(&text.tm);
        }
    }

    fn end_text(&mut self, end_op: usize) {
        let Some(text) = self.text.take() else {
            return;
        };
        if text.glyphs.is_empty() {
            return;
        }

        let mut content = String::new();
        let mut char_glyphs = Vec::new();
        for (index, glyph) in text.glyphs.iter().enumerate() {
            if index > 0 && visibly_apart(&text.glyphs[index - 1], glyph) {
                content.push(' ');
                char_glyphs.push(None);
            }
            for c in glyph.text.chars() {
                content.push(c);
                char_glyphs.push(Some(index));
            }
        }

        let bbox = text
            .glyphs
            .iter()
            .map(|g| g.bbox)
            .reduce(|acc, b| acc.union(&b))
            .unwrap_or_default();

        self.elements.push(ContentElement::Text(TextRun {
            begin_op: text.begin_op,
            end_op,
            ctm: text.ctm,
            content,
            char_glyphs,
            glyphs: text.glyphs,
            bbox,
        }));
    }

    fn paint_xobject(&mut self, op_index: usize, name: &[u8]) {
        let Some((id, obj)) = self.resource(b"XObject", name) else {
            debug!(xobject = %String::from_utf8_lossy(name), "XObject resource missing");
            return;
        };
        let Ok(stream) = obj.as_stream() else {
            return;
        };
        let dict = &stream.dict;
        let ctm = self.state.ctm;

        match dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok()) {
            Some(b"Image") => {
                let dimension = |key: &[u8]| {
                    dict.get(key)
                        .ok()
                        .and_then(|o| resolve(self.doc, o).as_i64().ok())
                        .unwrap_or(0)
                        .max(0) as u32
                };
                self.elements.push(ContentElement::Image(ImagePlacement {
                    ops: op_index..op_index + 1,
                    name: Some(String::from_utf8_lossy(name).into_owned()),
                    xobject: id,
                    matrix: ctm,
                    bbox: ctm.transform_rect(&UNIT_SQUARE),
                    pixel_width: dimension(b"Width"),
                    pixel_height: dimension(b"Height"),
                }));
            }
            Some(b"Form") => {
                let form_matrix = dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|o| resolve(self.doc, o).as_array().ok())
                    .and_then(|values| Matrix::from_operands(values))
                    .unwrap_or(Matrix::IDENTITY);
                let bbox = dict
                    .get(b"BBox")
                    .ok()
                    .and_then(|o| box_from(self.doc, resolve(self.doc, o)))
                    .map(|b| form_matrix.then(&ctm).transform_rect(&b))
                    .unwrap_or(self.bounds);
                self.elements.push(ContentElement::Vector(VectorDrawing {
                    kind: VectorKind::Form,
                    ops: op_index..op_index + 1,
                    bbox,
                }));
            }
            _ => {}
        }
    }

    /// `BI`, plus any trailing `ID`/`EI` operations the parser split off.
    fn inline_image(&mut self, ops: &[Operation], start: usize) -> usize {
        let dict = ops[start].operands.iter().find_map(|o| match o {
            Object::Stream(stream) => Some(&stream.dict),
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        });
        let dimension = |long: &[u8], short: &[u8]| {
            dict.and_then(|d| d.get(long).or_else(|_| d.get(short)).ok())
                .and_then(|o| o.as_i64().ok())
                .unwrap_or(0)
                .max(0) as u32
        };
        let (pixel_width, pixel_height) = (dimension(b"Width", b"W"), dimension(b"Height", b"H"));

        let mut end = start;
        while let Some(next) = ops.get(end + 1) {
            match next.operator.as_str() {
                "ID" => end += 1,
                "EI" => {
                    end += 1;
                    break;
                }
                _ => break,
            }
        }

        let ctm = self.state.ctm;
        self.elements.push(ContentElement::Image(ImagePlacement {
            ops: start..end + 1,
            name: None,
            xobject: None,
            matrix: ctm,
            bbox: ctm.transform_rect(&UNIT_SQUARE),
            pixel_width,
            pixel_height,
        }));
        end
    }

    fn path_point(&mut self, op_index: usize, x: f32, y: f32) {
        let (ux, uy) = self.state.ctm.apply(x, y);
        self.path
            .get_or_insert(PathBuilder {
                start: op_index,
                bbox: None,
            })
            .add(ux, uy);
    }

    /// Named entry of a resource category, with its object id when indirect.
    fn resource(&self, category: &[u8], name: &[u8]) -> Option<(Option<ObjectId>, &'a Object)> {
        let doc = self.doc;
        let entries = resolve(doc, self.resources?.get(category).ok()?).as_dict().ok()?;
        let entry = entries.get(name).ok()?;
        let id = entry.as_reference().ok();
        Some((id, resolve(doc, entry)))
    }
}

/// Whether a space belongs between two consecutive glyphs.
fn visibly_apart(prev: &Glyph, next: &Glyph) -> bool {
    let height = prev.bbox.height().max(next.bbox.height());
    if height <= f32::EPSILON {
        return false;
    }
    let (_, prev_y) = prev.bbox.center();
    let (_, next_y) = next.bbox.center();
    if (prev_y - next_y).abs() > 0.5 * height {
        return true;
    }
    next.bbox.x0 - prev.bbox.x1 > 0.2 * height || next.bbox.x1 < prev.bbox.x0
}
