// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic PDFs for tests and benchmarks.
//
// Every document shares one resource dictionary on its page tree node:
// `/F1` (a Helvetica stand-in, every glyph 500 units wide), `/F2` (a Type0
// font whose ToUnicode map covers the Chinese watermark characters), `/Qr`
// (an 8×8 gray image) and `/Bg` (a 4×4 flat RGB image).

use lopdf::{Document, Object, ObjectId, Stream, dictionary};

use crate::page::Page;
use crate::pdf::interpret::load_page;
use crate::pdf::reader::PdfDocument;

/// The colour of every `/Bg` pixel.
pub const BG_PIXEL: [u8; 3] = [238, 232, 214];

/// Characters `/F2` can show, in code order starting at 1.
const CJK_CHARS: [char; 7] = ['扫', '描', '全', '能', '王', '文', '档'];

/// Builds small documents page by page.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    /// A US Letter page inheriting everything from the page tree.
    pub fn page(mut self, content: &str) -> Self {
        let content_id = self.content_stream(content);
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
        });
        self.kids.push(page_id.into());
        self
    }

    /// A page with its own MediaBox and `/Rotate`.
    pub fn page_with(mut self, content: &str, media_box: [f32; 4], rotate: i64) -> Self {
        let content_id = self.content_stream(content);
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "MediaBox" => media_box.iter().map(|v| Object::Real(*v)).collect::<Vec<_>>(),
            "Rotate" => rotate,
        });
        self.kids.push(page_id.into());
        self
    }

    fn content_stream(&mut self, content: &str) -> ObjectId {
        self.doc
            .add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()))
    }

    pub fn into_document(mut self) -> Document {
        let resources = self.resources();
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = self.into_document();
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("in-memory save");
        bytes
    }

    fn resources(&mut self) -> ObjectId {
        let doc = &mut self.doc;

        let helvetica = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "FirstChar" => 32,
            "LastChar" => 126,
            "Widths" => vec![Object::Integer(500); 95],
        });

        let mut cmap = String::from(
            "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
             1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
        );
        cmap.push_str(&format!("{} beginbfchar\n", CJK_CHARS.len()));
        for (index, c) in CJK_CHARS.iter().enumerate() {
            cmap.push_str(&format!("<{:04X}> <{:04X}>\n", index + 1, *c as u32));
        }
        cmap.push_str("endbfchar\nendcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
        let to_unicode = doc.add_object(Stream::new(dictionary! {}, cmap.into_bytes()));

        let cid_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => "SimSun",
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "DW" => 1000,
        });
        let cjk = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "SimSun",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![cid_font.into()],
            "ToUnicode" => to_unicode,
        });

        let qr_pixels: Vec<u8> = (0..64u32)
            .map(|i| if (i / 8 + i % 8) % 2 == 0 { 0 } else { 255 })
            .collect();
        let qr = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 8,
                "Height" => 8,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            qr_pixels,
        ));
        let bg = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 4,
                "Height" => 4,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            BG_PIXEL.repeat(16),
        ));

        doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => helvetica, "F2" => cjk },
            "XObject" => dictionary! { "Qr" => qr, "Bg" => bg },
        })
    }
}

/// A Helvetica text object at `(x, y)`.
pub fn text_op(x: f32, y: f32, size: f32, text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)");
    format!("BT /F1 {size} Tf {x} {y} Td ({escaped}) Tj ET\n")
}

/// A `/F2` text object; `text` may only use the characters `/F2` maps.
pub fn cjk_text(x: f32, y: f32, size: f32, text: &str) -> String {
    let hex: String = text
        .chars()
        .map(|c| {
            let code = CJK_CHARS
                .iter()
                .position(|k| *k == c)
                .unwrap_or_else(|| panic!("no test glyph for {c:?}"));
            format!("{:04X}", code + 1)
        })
        .collect();
    format!("BT /F2 {size} Tf {x} {y} Td <{hex}> Tj ET\n")
}

/// Paint image resource `name` into the box `(x, y, w, h)`.
pub fn image_op(name: &str, x: f32, y: f32, w: f32, h: f32) -> String {
    format!("q {w} 0 0 {h} {x} {y} cm /{name} Do Q\n")
}

pub fn load_first_page(builder: PdfBuilder) -> Page {
    load_first_page_with_doc(builder).1
}

pub fn load_first_page_with_doc(builder: PdfBuilder) -> (Document, Page) {
    let doc = builder.into_document();
    let (number, id) = doc.get_pages().into_iter().next().expect("builder added no pages");
    let page = load_page(&doc, number, id).expect("synthetic page decodes");
    (doc, page)
}

/// Decoded text of page `number` of a saved document.
pub fn page_text(bytes: &[u8], number: u32) -> String {
    PdfDocument::from_bytes(bytes)
        .and_then(|doc| doc.load_page(number))
        .map(|page| page.text())
        .expect("page decodes")
}
