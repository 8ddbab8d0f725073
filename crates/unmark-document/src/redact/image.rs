// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background colour sampling from image XObjects.

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Document, Object, Stream};
use tracing::trace;
use unmark_core::{Rect, Rgb};

use super::ColorSampler;
use crate::geometry::UNIT_SQUARE;
use crate::page::ImagePlacement;

/// Samples the pixels of a document's image XObjects.
pub struct DocumentSampler<'a> {
    doc: &'a Document,
    ring_px: u32,
}

impl<'a> DocumentSampler<'a> {
    pub fn new(doc: &'a Document, ring_px: u32) -> Self {
        Self {
            doc,
            ring_px: ring_px.max(1),
        }
    }
}

impl ColorSampler for DocumentSampler<'_> {
    /// Average colour of a `ring_px` wide band of pixels around `region`.
    fn sample_around(&self, image: &ImagePlacement, region: &Rect) -> Option<Rgb> {
        let id = image.xobject?;
        let stream = self.doc.get_object(id).ok()?.as_stream().ok()?;
        let pixels = decode_pixels(stream, image.pixel_width, image.pixel_height)?;

        let unit = image.matrix.inverse()?.transform_rect(region);
        let unit = unit.intersection(&UNIT_SQUARE)?;
        let color = ring_average(&pixels, &unit, self.ring_px);
        trace!(?id, ?color, "background sampled");
        color
    }
}

/// Decode an image XObject to RGB, for the encodings scanners produce:
/// baseline JPEG and 8-bit RGB or gray samples.
pub fn decode_pixels(stream: &Stream, width: u32, height: u32) -> Option<RgbImage> {
    if width == 0 || height == 0 {
        return None;
    }
    if is_dct(stream) {
        return image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
            .ok()
            .map(|decoded| decoded.to_rgb8());
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    let pixels = width as usize * height as usize;
    if data.len() == pixels * 3 {
        RgbImage::from_raw(width, height, data)
    } else if data.len() == pixels {
        GrayImage::from_raw(width, height, data).map(|gray| DynamicImage::ImageLuma8(gray).to_rgb8())
    } else {
        None
    }
}

fn is_dct(stream: &Stream) -> bool {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => name == b"DCTDecode",
        Ok(Object::Array(filters)) => filters
            .iter()
            .any(|f| f.as_name().is_ok_and(|n| n == b"DCTDecode")),
        _ => false,
    }
}

/// `unit` is in the image's unit square (y up); pixel rows run top-down.
fn ring_average(pixels: &RgbImage, unit: &Rect, ring_px: u32) -> Option<Rgb> {
    let (width, height) = pixels.dimensions();
    let (w, h) = (width as f32, height as f32);

    let inner_x0 = (unit.x0 * w).floor() as i64;
    let inner_x1 = (unit.x1 * w).ceil() as i64;
    let inner_y0 = ((1.0 - unit.y1) * h).floor() as i64;
    let inner_y1 = ((1.0 - unit.y0) * h).ceil() as i64;

    let ring = ring_px as i64;
    let outer_x0 = (inner_x0 - ring).max(0);
    let outer_x1 = (inner_x1 + ring).min(width as i64);
    let outer_y0 = (inner_y0 - ring).max(0);
    let outer_y1 = (inner_y1 + ring).min(height as i64);

    let mut sum = [0u64; 3];
    let mut count = 0u64;
    for y in outer_y0..outer_y1 {
        for x in outer_x0..outer_x1 {
            if (inner_x0..inner_x1).contains(&x) && (inner_y0..inner_y1).contains(&y) {
                continue;
            }
            let pixel = pixels.get_pixel(x as u32, y as u32);
            for (total, channel) in sum.iter_mut().zip(pixel.0) {
                *total += channel as u64;
            }
            count += 1;
        }
    }

    (count > 0).then(|| {
        Rgb::from_u8(
            (sum[0] / count) as u8,
            (sum[1] / count) as u8,
            (sum[2] / count) as u8,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BG_PIXEL, PdfBuilder, image_op, load_first_page_with_doc};

    #[test]
    fn raw_rgb_and_gray_samples_decode() {
        let rgb = Stream::new(lopdf::Dictionary::new(), vec![10, 20, 30, 40, 50, 60]);
        let decoded = decode_pixels(&rgb, 2, 1).unwrap();
        assert_eq!(decoded.get_pixel(1, 0).0, [40, 50, 60]);

        let gray = Stream::new(lopdf::Dictionary::new(), vec![0, 255]);
        let decoded = decode_pixels(&gray, 2, 1).unwrap();
        assert_eq!(decoded.get_pixel(1, 0).0, [255, 255, 255]);

        assert!(decode_pixels(&gray, 3, 3).is_none());
    }

    #[test]
    fn ring_skips_the_region_itself() {
        let mut pixels = RgbImage::from_pixel(10, 10, image::Rgb([200, 100, 50]));
        for y in 4..6 {
            for x in 4..6 {
                pixels.put_pixel(x, y, image::Rgb([0, 0, 0]));
            }
        }
        let color = ring_average(&pixels, &Rect::new(0.4, 0.4, 0.6, 0.6), 2).unwrap();
        assert_eq!(color, Rgb::from_u8(200, 100, 50));

        assert!(ring_average(&pixels, &UNIT_SQUARE, 2).is_none());
    }

    #[test]
    fn samples_the_page_background_image() {
        let (doc, page) = load_first_page_with_doc(PdfBuilder::new().page(&image_op("Bg", 0.0, 0.0, 612.0, 792.0)));
        let (_, image) = page.images().next().unwrap();
        let sampler = DocumentSampler::new(&doc, 1);
        let color = sampler.sample_around(image, &Rect::new(300.0, 300.0, 320.0, 310.0)).unwrap();
        assert_eq!(color, Rgb::from_u8(BG_PIXEL[0], BG_PIXEL[1], BG_PIXEL[2]));
    }
}
