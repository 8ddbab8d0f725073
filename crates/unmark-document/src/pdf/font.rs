// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font metrics and character-code decoding.
//
// Only what the scanner needs: how many bytes a code takes, how far a code
// advances, and which Unicode text it stands for.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};
use tracing::debug;

use super::resolve;
use crate::geometry::number;

/// Upper bound on codes expanded from one `bfrange` entry.
const MAX_RANGE_SPAN: u32 = 0x1_0000;

/// Width used when a font gives none (glyph space units / 1000).
const FALLBACK_WIDTH: f32 = 0.5;

/// Decoding and metrics for one font resource.
#[derive(Debug, Clone)]
pub struct FontInfo {
    pub base_font: String,
    /// Bytes per character code: 1 for simple fonts, 2 for Type0.
    pub code_len: usize,
    first_char: u32,
    widths: Vec<f32>,
    cid_widths: HashMap<u32, f32>,
    default_width: f32,
    to_unicode: Option<CMap>,
    /// Glyph box extent in text space (fraction of the font size).
    pub ascent: f32,
    pub descent: f32,
}

impl Default for FontInfo {
    fn default() -> Self {
        Self {
            base_font: String::from("unknown"),
            code_len: 1,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: FALLBACK_WIDTH,
            to_unicode: None,
            ascent: 0.8,
            descent: -0.2,
        }
    }
}

impl FontInfo {
    /// Read a font dictionary.
    pub fn load(doc: &Document, font: &Dictionary) -> Self {
        let mut info = FontInfo {
            base_font: font
                .get(b"BaseFont")
                .ok()
                .and_then(|o| o.as_name().ok())
                .map(|n| String::from_utf8_lossy(n).into_owned())
                .unwrap_or_else(|| "unknown".into()),
            ..Default::default()
        };

        let subtype = font.get(b"Subtype").ok().and_then(|o| o.as_name().ok());

        match subtype {
            Some(b"Type0") => {
                info.code_len = 2;
                info.default_width = 1.0;
                let descendant = font
                    .get(b"DescendantFonts")
                    .ok()
                    .map(|o| resolve(doc, o))
                    .and_then(|o| o.as_array().ok())
                    .and_then(|arr| arr.first())
                    .map(|o| resolve(doc, o))
                    .and_then(|o| o.as_dict().ok());
                if let Some(cid_font) = descendant {
                    if let Some(dw) = cid_font.get(b"DW").ok().and_then(number) {
                        info.default_width = dw / 1000.0;
                    }
                    if let Ok(w) = cid_font.get(b"W") {
                        if let Ok(w) = resolve(doc, w).as_array() {
                            info.cid_widths = parse_cid_widths(doc, w);
                        }
                    }
                    info.read_descriptor(doc, cid_font);
                }
            }
            _ => {
                let scale = if subtype == Some(b"Type3".as_slice()) {
                    font.get(b"FontMatrix")
                        .ok()
                        .map(|o| resolve(doc, o))
                        .and_then(|o| o.as_array().ok())
                        .and_then(|m| m.first())
                        .and_then(number)
                        .unwrap_or(0.001)
                } else {
                    0.001
                };
                info.first_char = font
                    .get(b"FirstChar")
                    .ok()
                    .and_then(|o| o.as_i64().ok())
                    .unwrap_or(0)
                    .max(0) as u32;
                if let Ok(widths) = font.get(b"Widths") {
                    if let Ok(widths) = resolve(doc, widths).as_array() {
                        info.widths = widths
                            .iter()
                            .map(|w| number(resolve(doc, w)).unwrap_or(0.0) * scale)
                            .collect();
                    }
                }
                if let Some(missing) = info.read_descriptor(doc, font) {
                    info.default_width = missing * scale;
                }
            }
        }

        if let Ok(obj) = font.get(b"ToUnicode") {
            if let Ok(stream) = resolve(doc, obj).as_stream() {
                let data = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                let cmap = CMap::parse(&data);
                debug!(font = %info.base_font, entries = cmap.len(), "ToUnicode CMap parsed");
                info.to_unicode = Some(cmap);
            }
        }

        info
    }

    /// Reads ascent/descent; returns `/MissingWidth` if present.
    fn read_descriptor(&mut self, doc: &Document, font: &Dictionary) -> Option<f32> {
        let descriptor = font
            .get(b"FontDescriptor")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok())?;
        let ascent = descriptor.get(b"Ascent").ok().and_then(number);
        let descent = descriptor.get(b"Descent").ok().and_then(number);
        if let (Some(a), Some(d)) = (ascent, descent) {
            if a > d && a != 0.0 {
                self.ascent = a / 1000.0;
                self.descent = d.min(0.0) / 1000.0;
            }
        }
        descriptor.get(b"MissingWidth").ok().and_then(number)
    }

    /// Split a shown string into character codes with their byte ranges.
    pub fn codes(&self, bytes: &[u8]) -> Vec<(u32, std::ops::Range<usize>)> {
        let step = self.code_len.max(1);
        (0..bytes.len())
            .step_by(step)
            .map(|start| {
                let end = (start + step).min(bytes.len());
                let code = bytes[start..end]
                    .iter()
                    .fold(0u32, |acc, b| (acc << 8) | *b as u32);
                (code, start..end)
            })
            .collect()
    }

    /// Advance of a code in text space per unit font size.
    pub fn width(&self, code: u32) -> f32 {
        if self.code_len == 2 {
            return self.cid_widths.get(&code).copied().unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .unwrap_or(self.default_width)
    }

    /// Whether word spacing applies to this code (single-byte space only).
    pub fn is_word_space(&self, code: u32) -> bool {
        self.code_len == 1 && code == 32
    }

    /// Unicode text for a code. Unmappable codes decode to U+FFFD.
    pub fn decode(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|cmap| cmap.get(code)) {
            return text.to_string();
        }
        if self.code_len == 1 {
            // Latin-1 is close enough to WinAnsi/Standard for ASCII text.
            return char::from_u32(code).map(String::from).unwrap_or_default();
        }
        String::from('\u{FFFD}')
    }
}

/// `W` array of a CID font: `c [w1 w2 …]` and `c_first c_last w` entries.
fn parse_cid_widths(doc: &Document, w: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < w.len() {
        let Some(first) = number(resolve(doc, &w[i])) else {
            break;
        };
        let first = first.max(0.0) as u32;
        match w.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, width) in list.iter().enumerate() {
                    if let Some(width) = number(resolve(doc, width)) {
                        widths.insert(first + offset as u32, width / 1000.0);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(width)) = (
                    number(last),
                    w.get(i + 2).and_then(|o| number(resolve(doc, o))),
                ) else {
                    break;
                };
                let last = (last.max(0.0) as u32).min(first.saturating_add(MAX_RANGE_SPAN));
                for code in first..=last {
                    widths.insert(code, width / 1000.0);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

/// A parsed ToUnicode CMap (`bfchar` and `bfrange` sections).
#[derive(Debug, Clone, Default)]
pub struct CMap {
    map: HashMap<u32, String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    Word(String),
    ArrayStart,
    ArrayEnd,
}

impl CMap {
    pub fn parse(data: &[u8]) -> Self {
        let tokens = tokenize(data);
        let mut map = HashMap::new();
        let mut i = 0;

        while i < tokens.len() {
            match &tokens[i] {
                Token::Word(w) if w == "beginbfchar" => {
                    i += 1;
                    while i + 1 < tokens.len() {
                        match (&tokens[i], &tokens[i + 1]) {
                            (Token::Hex(src), Token::Hex(dst)) => {
                                if let Some(text) = utf16be(dst) {
                                    map.insert(code_value(src), text);
                                }
                                i += 2;
                            }
                            _ => break,
                        }
                    }
                }
                Token::Word(w) if w == "beginbfrange" => {
                    i += 1;
                    while i + 2 < tokens.len() {
                        let (Token::Hex(lo), Token::Hex(hi)) = (&tokens[i], &tokens[i + 1]) else {
                            break;
                        };
                        let (lo, hi) = (code_value(lo), code_value(hi));
                        let span = hi.saturating_sub(lo).min(MAX_RANGE_SPAN);
                        match &tokens[i + 2] {
                            Token::Hex(dst) => {
                                let units = utf16_units(dst);
                                for offset in 0..=span {
                                    let mut shifted = units.clone();
                                    if let Some(last) = shifted.last_mut() {
                                        *last = last.wrapping_add(offset as u16);
                                    }
                                    if let Ok(text) = String::from_utf16(&shifted) {
                                        map.insert(lo + offset, text);
                                    }
                                }
                                i += 3;
                            }
                            Token::ArrayStart => {
                                i += 3;
                                let mut offset = 0;
                                while i < tokens.len() {
                                    match &tokens[i] {
                                        Token::Hex(dst) => {
                                            if offset <= span {
                                                if let Some(text) = utf16be(dst) {
                                                    map.insert(lo + offset, text);
                                                }
                                            }
                                            offset += 1;
                                            i += 1;
                                        }
                                        Token::ArrayEnd => {
                                            i += 1;
                                            break;
                                        }
                                        _ => break,
                                    }
                                }
                            }
                            _ => break,
                        }
                    }
                }
                _ => i += 1,
            }
        }

        Self { map }
    }

    pub fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes.iter().take(4).fold(0u32, |acc, b| (acc << 8) | *b as u32)
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => *single as u16,
            _ => 0,
        })
        .collect()
}

fn utf16be(bytes: &[u8]) -> Option<String> {
    String::from_utf16(&utf16_units(bytes)).ok()
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                let start = i + 1;
                let end = data[start..]
                    .iter()
                    .position(|b| *b == b'>')
                    .map_or(data.len(), |p| start + p);
                let digits: Vec<u8> = data[start..end]
                    .iter()
                    .copied()
                    .filter(u8::is_ascii_hexdigit)
                    .collect();
                let bytes = digits
                    .chunks(2)
                    .map(|pair| {
                        let hi = hex_value(pair[0]);
                        let lo = pair.get(1).map_or(0, |d| hex_value(*d));
                        (hi << 4) | lo
                    })
                    .collect();
                tokens.push(Token::Hex(bytes));
                i = end + 1;
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b'(' => {
                // Literal strings only appear in CMap headers; skip them.
                let mut depth = 0usize;
                while i < data.len() {
                    match data[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                i += 1;
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !matches!(data[i], b'<' | b'>' | b'[' | b']' | b'(' | b'%')
                {
                    i += 1;
                }
                if i == start {
                    i += 1;
                    continue;
                }
                tokens.push(Token::Word(String::from_utf8_lossy(&data[start..i]).into_owned()));
            }
        }
    }
    tokens
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        b'A'..=b'F' => digit - b'A' + 10,
        _ => 0,
    }
}
