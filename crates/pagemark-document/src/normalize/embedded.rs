// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Embedded-image rasterizer — a pure-Rust page renderer built on `lopdf`.
//
// Each page is painted white and its content stream is walked with the
// graphics state stack tracked. Image XObjects, including those inside Form
// XObjects, are drawn where the CTM puts them. A page that paints text, vector
// paths, shadings or inline images is rejected as a render failure, because
// this renderer would draw it blank. Invisible text (render modes 3 and 7, as
// in OCR layers over scans) is not painting and does not reject the page.
// Build with the `pdfium` feature for full fidelity.

use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use pagemark_core::error::{PagemarkError, Result};
use tracing::{debug, instrument, warn};

use super::rasterizer::{PageBox, PageRasterizer};

/// Nested Form XObjects deeper than this are ignored.
const MAX_FORM_DEPTH: usize = 8;

static NULL_OBJECT: Object = Object::Null;

/// Fallback when a page has no usable /MediaBox (A4 in points).
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 595.0, 842.0];

/// Draws the raster images embedded in each page.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedImageRasterizer;

impl PageRasterizer for EmbeddedImageRasterizer {
    #[instrument(skip_all, fields(bytes_len = pdf.len()))]
    fn rasterize(
        &self,
        pdf: &[u8],
        scale_for: &dyn Fn(PageBox) -> f32,
    ) -> Result<Vec<Result<RgbImage>>> {
        let document = Document::load_mem(pdf)
            .map_err(|err| PagemarkError::PdfLoad(format!("failed to parse PDF: {err}")))?;

        let pages = document.get_pages();
        debug!(pages = pages.len(), "PDF loaded for rasterization");

        Ok(pages
            .iter()
            .map(|(&number, &page_id)| {
                render_page(&document, page_id, scale_for).map_err(|detail| {
                    PagemarkError::PdfRender {
                        page: number as usize,
                        detail,
                    }
                })
            })
            .collect())
    }
}

// -- Geometry -----------------------------------------------------------------

/// 2D affine transform in PDF's `[a b c d e f]` order (row-vector convention).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Affine {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Affine {
    const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() != 6 {
            return None;
        }
        let mut values = [0.0f32; 6];
        for (slot, operand) in values.iter_mut().zip(operands) {
            *slot = number(operand)?;
        }
        let [a, b, c, d, e, f] = values;
        Some(Self { a, b, c, d, e, f })
    }

    /// `self` applied first, then `next`.
    fn then(&self, next: &Self) -> Self {
        Self {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn invert(&self) -> Option<Self> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f32::EPSILON {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Self {
            a,
            b,
            c,
            d,
            e: -(self.e * a + self.f * c),
            f: -(self.e * b + self.f * d),
        })
    }
}

// -- Page rendering -------------------------------------------------------------

fn render_page(
    document: &Document,
    page_id: ObjectId,
    scale_for: &dyn Fn(PageBox) -> f32,
) -> std::result::Result<RgbImage, String> {
    let page = document
        .get_dictionary(page_id)
        .map_err(|err| format!("page object {page_id:?} unreadable: {err}"))?;

    let [x0, y0, x1, y1] = media_box(document, page);
    let page_box = PageBox::new((x1 - x0).abs(), (y1 - y0).abs());
    let scale = scale_for(page_box);
    if !(scale.is_finite() && scale > 0.0) {
        return Err(format!("invalid render scale {scale}"));
    }

    let (width, height) = page_box.pixel_size(scale);
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

    // User space (origin bottom-left) to raster pixels (origin top-left).
    let device = Affine {
        a: scale,
        b: 0.0,
        c: 0.0,
        d: -scale,
        e: -x0.min(x1) * scale,
        f: y0.max(y1) * scale,
    };

    let content = document
        .get_page_content(page_id)
        .map_err(|err| format!("content stream unreadable: {err}"))?;
    let resources = inherited(document, page, b"Resources").and_then(|obj| as_dict(document, obj));

    let mut painter = Painter {
        document,
        canvas: &mut canvas,
        device,
        images_drawn: 0,
        vector_ops: 0,
        text_mode: 0,
    };
    painter.run(&content, resources, Affine::IDENTITY, 0)?;

    debug!(
        width,
        height,
        scale,
        images = painter.images_drawn,
        vector_ops = painter.vector_ops,
        "Page rasterized"
    );
    if painter.vector_ops > 0 {
        return Err(format!(
            "{} text or vector painting operations cannot be drawn without the pdfium feature",
            painter.vector_ops
        ));
    }

    Ok(match rotation(document, page) {
        90 => imageops::rotate90(&canvas),
        180 => imageops::rotate180(&canvas),
        270 => imageops::rotate270(&canvas),
        _ => canvas,
    })
}

struct Painter<'a> {
    document: &'a Document,
    canvas: &'a mut RgbImage,
    device: Affine,
    images_drawn: usize,
    /// Visible text, path painting, shading and inline image operators seen.
    vector_ops: usize,
    /// Current text rendering mode (`Tr`).
    text_mode: i64,
}

impl Painter<'_> {
    fn run(
        &mut self,
        content: &[u8],
        resources: Option<&Dictionary>,
        base: Affine,
        depth: usize,
    ) -> std::result::Result<(), String> {
        let content =
            Content::decode(content).map_err(|err| format!("content stream malformed: {err}"))?;

        let base_mode = self.text_mode;
        let mut ctm = base;
        let mut stack: Vec<(Affine, i64)> = Vec::new();

        for operation in &content.operations {
            match operation.operator.as_str() {
                "q" => stack.push((ctm, self.text_mode)),
                "Q" => {
                    let (saved_ctm, saved_mode) = stack.pop().unwrap_or((base, base_mode));
                    ctm = saved_ctm;
                    self.text_mode = saved_mode;
                }
                "Tr" => {
                    if let Some(mode) = operation.operands.first().and_then(|o| o.as_i64().ok()) {
                        self.text_mode = mode;
                    }
                }
                "cm" => {
                    if let Some(matrix) = Affine::from_operands(&operation.operands) {
                        ctm = matrix.then(&ctm);
                    }
                }
                "Do" => {
                    let Some(name) = operation.operands.first().and_then(|o| o.as_name().ok())
                    else {
                        continue;
                    };
                    self.draw_xobject(name, resources, ctm, depth)?;
                }
                "Tj" | "TJ" | "'" | "\"" => {
                    if !matches!(self.text_mode, 3 | 7) {
                        self.vector_ops += 1;
                    }
                }
                "f" | "F" | "f*" | "S" | "s" | "B" | "B*" | "b" | "b*" | "sh" | "BI" => {
                    self.vector_ops += 1;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn draw_xobject(
        &mut self,
        name: &[u8],
        resources: Option<&Dictionary>,
        ctm: Affine,
        depth: usize,
    ) -> std::result::Result<(), String> {
        let xobject = resources
            .and_then(|res| res.get(b"XObject").ok())
            .and_then(|obj| as_dict(self.document, obj))
            .and_then(|xobjects| xobjects.get(name).ok())
            .map(|obj| resolve(self.document, obj));

        let Some(Object::Stream(stream)) = xobject else {
            warn!(name = %String::from_utf8_lossy(name), "XObject not found, skipping");
            return Ok(());
        };

        let subtype = stream
            .dict
            .get(b"Subtype")
            .ok()
            .and_then(|obj| obj.as_name().ok());

        match subtype {
            Some(b"Image") => {
                let image = decode_image(self.document, stream)?;
                self.paint_image(&image, ctm);
                self.images_drawn += 1;
                Ok(())
            }
            Some(b"Form") if depth < MAX_FORM_DEPTH => {
                let matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|obj| match resolve(self.document, obj) {
                        Object::Array(values) => Affine::from_operands(values),
                        _ => None,
                    })
                    .unwrap_or(Affine::IDENTITY);
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|obj| as_dict(self.document, obj))
                    .or(resources);
                let content = stream_bytes(stream)?;
                let saved_mode = self.text_mode;
                let drawn = self.run(&content, form_resources, matrix.then(&ctm), depth + 1);
                self.text_mode = saved_mode;
                drawn
            }
            _ => Ok(()),
        }
    }

    /// Map the image's unit square through `ctm` onto the canvas by inverse
    /// sampling every covered device pixel.
    fn paint_image(&mut self, image: &RgbImage, ctm: Affine) {
        let mut source = std::borrow::Cow::Borrowed(image);
        let mut full = self.image_to_device(source.width(), source.height(), ctm);

        // Pre-shrink heavily downscaled images so nearest sampling does not alias.
        let scale_u = full.a.hypot(full.b);
        let scale_v = full.c.hypot(full.d);
        if scale_u < 0.75 || scale_v < 0.75 {
            let w = ((source.width() as f32 * scale_u.min(1.0)).round() as u32).max(1);
            let h = ((source.height() as f32 * scale_v.min(1.0)).round() as u32).max(1);
            source = std::borrow::Cow::Owned(imageops::resize(image, w, h, FilterType::Triangle));
            full = self.image_to_device(w, h, ctm);
        }

        let Some(inverse) = full.invert() else {
            return;
        };

        let (src_w, src_h) = (source.width() as f32, source.height() as f32);
        let corners = [(0.0, 0.0), (src_w, 0.0), (0.0, src_h), (src_w, src_h)]
            .map(|(u, v)| full.apply(u, v));
        let min_x = corners.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
        let min_y = corners.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
        let max_y = corners.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);

        let (canvas_w, canvas_h) = self.canvas.dimensions();
        let x_start = min_x.floor().max(0.0) as u32;
        let y_start = min_y.floor().max(0.0) as u32;
        let x_end = (max_x.ceil().max(0.0) as u32).min(canvas_w);
        let y_end = (max_y.ceil().max(0.0) as u32).min(canvas_h);

        for y in y_start..y_end {
            for x in x_start..x_end {
                let (u, v) = inverse.apply(x as f32 + 0.5, y as f32 + 0.5);
                if u < 0.0 || v < 0.0 || u >= src_w || v >= src_h {
                    continue;
                }
                let pixel = *source.get_pixel(u as u32, v as u32);
                self.canvas.put_pixel(x, y, pixel);
            }
        }
    }

    /// Image pixel (u, v), v growing downwards, to device pixel.
    fn image_to_device(&self, width: u32, height: u32, ctm: Affine) -> Affine {
        let to_unit = Affine {
            a: 1.0 / width as f32,
            b: 0.0,
            c: 0.0,
            d: -1.0 / height as f32,
            e: 0.0,
            f: 1.0,
        };
        to_unit.then(&ctm).then(&self.device)
    }
}

// -- Image XObject decoding -----------------------------------------------------

fn decode_image(document: &Document, stream: &Stream) -> std::result::Result<RgbImage, String> {
    let filters = filter_names(document, &stream.dict);

    if filters.last().map(Vec::as_slice) == Some(b"DCTDecode".as_slice()) {
        if filters.len() > 1 {
            return Err("chained filters before DCTDecode are not supported".into());
        }
        return image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
            .map(|img| img.to_rgb8())
            .map_err(|err| format!("embedded JPEG undecodable: {err}"));
    }
    if let Some(unsupported) = filters.iter().find(|f| {
        matches!(
            f.as_slice(),
            b"JPXDecode" | b"JBIG2Decode" | b"CCITTFaxDecode" | b"RunLengthDecode"
        )
    }) {
        return Err(format!(
            "image filter {} is not supported",
            String::from_utf8_lossy(unsupported)
        ));
    }

    let width = dict_u32(document, &stream.dict, b"Width").ok_or("image has no /Width")?;
    let height = dict_u32(document, &stream.dict, b"Height").ok_or("image has no /Height")?;
    let bits = dict_u32(document, &stream.dict, b"BitsPerComponent").unwrap_or(8);
    if width == 0 || height == 0 {
        return Err(format!("image has empty size {width}x{height}"));
    }

    let data = stream_bytes(stream)?;
    let color_space = stream
        .dict
        .get(b"ColorSpace")
        .ok()
        .map(|obj| ColorSpace::parse(document, obj))
        .unwrap_or(ColorSpace::Gray);

    unpack_samples(&data, width, height, bits, &color_space)
}

#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette: base components per entry and the lookup table.
    Indexed { base: Box<ColorSpace>, lookup: Vec<u8> },
}

impl ColorSpace {
    fn parse(document: &Document, object: &Object) -> Self {
        match resolve(document, object) {
            Object::Name(name) => Self::from_name(name),
            Object::Array(items) => {
                let family = items.first().and_then(|o| resolve(document, o).as_name().ok());
                match family {
                    Some(b"ICCBased") => {
                        let components = items
                            .get(1)
                            .and_then(|o| match resolve(document, o) {
                                Object::Stream(s) => dict_u32(document, &s.dict, b"N"),
                                _ => None,
                            })
                            .unwrap_or(3);
                        match components {
                            1 => Self::Gray,
                            4 => Self::Cmyk,
                            _ => Self::Rgb,
                        }
                    }
                    Some(b"Indexed") => {
                        let base = items
                            .get(1)
                            .map(|o| Self::parse(document, o))
                            .unwrap_or(Self::Rgb);
                        let lookup = items
                            .get(3)
                            .map(|o| match resolve(document, o) {
                                Object::String(bytes, _) => bytes.clone(),
                                Object::Stream(s) => stream_bytes(s).unwrap_or_default(),
                                _ => Vec::new(),
                            })
                            .unwrap_or_default();
                        Self::Indexed {
                            base: Box::new(base),
                            lookup,
                        }
                    }
                    Some(name) => Self::from_name(name),
                    None => Self::Rgb,
                }
            }
            _ => Self::Rgb,
        }
    }

    fn from_name(name: &[u8]) -> Self {
        match name {
            b"DeviceGray" | b"CalGray" | b"G" => Self::Gray,
            b"DeviceCMYK" | b"CMYK" => Self::Cmyk,
            _ => Self::Rgb,
        }
    }

    fn components(&self) -> usize {
        match self {
            Self::Gray | Self::Indexed { .. } => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
        }
    }

    fn to_rgb(&self, samples: &[u8]) -> Rgb<u8> {
        match self {
            Self::Gray => Rgb([samples[0]; 3]),
            Self::Rgb => Rgb([samples[0], samples[1], samples[2]]),
            Self::Cmyk => {
                let k = 255 - u16::from(samples[3]);
                let channel = |c: u8| ((255 - u16::from(c)) * k / 255) as u8;
                Rgb([channel(samples[0]), channel(samples[1]), channel(samples[2])])
            }
            Self::Indexed { base, lookup } => {
                let n = base.components();
                let start = usize::from(samples[0]) * n;
                match lookup.get(start..start + n) {
                    Some(entry) => base.to_rgb(entry),
                    None => Rgb([0, 0, 0]),
                }
            }
        }
    }
}

fn unpack_samples(
    data: &[u8],
    width: u32,
    height: u32,
    bits: u32,
    color_space: &ColorSpace,
) -> std::result::Result<RgbImage, String> {
    let components = color_space.components();
    let (w, h) = (width as usize, height as usize);

    match bits {
        8 => {
            let row_len = w * components;
            if data.len() < row_len * h {
                return Err(format!(
                    "image data truncated: {} bytes for {w}x{h}x{components}",
                    data.len()
                ));
            }
            Ok(RgbImage::from_fn(width, height, |x, y| {
                let start = y as usize * row_len + x as usize * components;
                color_space.to_rgb(&data[start..start + components])
            }))
        }
        1 if components == 1 => {
            let row_len = w.div_ceil(8);
            if data.len() < row_len * h {
                return Err(format!("bilevel image data truncated: {} bytes", data.len()));
            }
            Ok(RgbImage::from_fn(width, height, |x, y| {
                let byte = data[y as usize * row_len + x as usize / 8];
                let bit = (byte >> (7 - (x % 8))) & 1;
                match color_space {
                    ColorSpace::Indexed { .. } => color_space.to_rgb(&[bit]),
                    _ => Rgb([bit * 255; 3]),
                }
            }))
        }
        other => Err(format!(
            "{other} bits per component with {components} components is not supported"
        )),
    }
}

// -- lopdf helpers ----------------------------------------------------------------

/// Follow references until a direct object is reached.
fn resolve<'a>(document: &'a Document, mut object: &'a Object) -> &'a Object {
    for _ in 0..32 {
        match object {
            Object::Reference(id) => match document.get_object(*id) {
                Ok(target) => object = target,
                Err(_) => return &NULL_OBJECT,
            },
            _ => return object,
        }
    }
    &NULL_OBJECT
}

fn as_dict<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(document, object) {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

fn dict_u32(document: &Document, dict: &Dictionary, key: &[u8]) -> Option<u32> {
    dict.get(key)
        .ok()
        .and_then(|obj| number(resolve(document, obj)))
        .filter(|value| *value >= 0.0)
        .map(|value| value as u32)
}

/// Look up a page attribute, walking up /Parent for inheritable keys.
fn inherited<'a>(document: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut node = page;
    for _ in 0..32 {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        node = node
            .get(b"Parent")
            .ok()
            .and_then(|parent| as_dict(document, parent))?;
    }
    None
}

fn media_box(document: &Document, page: &Dictionary) -> [f32; 4] {
    let parsed = inherited(document, page, b"MediaBox").and_then(|obj| match resolve(document, obj) {
        Object::Array(values) if values.len() == 4 => {
            let mut out = [0.0f32; 4];
            for (slot, value) in out.iter_mut().zip(values) {
                *slot = number(resolve(document, value))?;
            }
            Some(out)
        }
        _ => None,
    });

    match parsed {
        Some(mb) if (mb[2] - mb[0]).abs() > 0.0 && (mb[3] - mb[1]).abs() > 0.0 => mb,
        _ => {
            warn!("Page has no usable /MediaBox, assuming A4");
            DEFAULT_MEDIA_BOX
        }
    }
}

fn rotation(document: &Document, page: &Dictionary) -> i64 {
    inherited(document, page, b"Rotate")
        .and_then(|obj| number(resolve(document, obj)))
        .map(|deg| (deg as i64).rem_euclid(360))
        .unwrap_or(0)
}

fn filter_names(document: &Document, dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter").map(|obj| resolve(document, obj)) {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| resolve(document, item).as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

/// Stream payload with Flate/LZW filters undone.
fn stream_bytes(stream: &Stream) -> std::result::Result<Vec<u8>, String> {
    if stream.dict.get(b"Filter").is_err() {
        return Ok(stream.content.clone());
    }
    stream
        .decompressed_content()
        .map_err(|err| format!("stream could not be decompressed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Object, Stream, dictionary};

    /// Build a one-object-per-page PDF whose pages each draw a single
    /// full-colour JPEG at the given `cm` placement.
    fn pdf_with_images(pages: &[(Vec<u8>, u32, u32, [f32; 6])]) -> Vec<u8> {
        let pages: Vec<(String, Vec<u8>, u32, u32)> = pages
            .iter()
            .map(|(jpeg, w, h, cm)| {
                let content = format!(
                    "q {} {} {} {} {} {} cm /Im0 Do Q",
                    cm[0], cm[1], cm[2], cm[3], cm[4], cm[5]
                );
                (content, jpeg.clone(), *w, *h)
            })
            .collect();
        pdf_with_contents(&pages)
    }

    /// Build an A4 PDF from raw content streams. Every page gets its JPEG as
    /// `/Im0` and Helvetica as `/F1`.
    fn pdf_with_contents(pages: &[(String, Vec<u8>, u32, u32)]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let mut kids = Vec::new();

        for (content, jpeg, w, h) in pages {
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => i64::from(*w),
                    "Height" => i64::from(*h),
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => Object::Integer(8),
                    "Filter" => "DCTDecode",
                },
                jpeg.clone(),
            ));
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.clone().into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im0" => image_id },
                    "Font" => dictionary! { "F1" => font_id },
                },
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(595),
                    Object::Integer(842),
                ],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn red_jpeg(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb([220, 0, 0]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Jpeg)
            .unwrap();
        out
    }

    #[test]
    fn affine_inverse_round_trips_a_point() {
        let m = Affine {
            a: 2.0,
            b: 0.5,
            c: -0.3,
            d: 1.5,
            e: 10.0,
            f: -4.0,
        };
        let inv = m.invert().unwrap();
        let (x, y) = m.apply(3.0, 7.0);
        let (u, v) = inv.apply(x, y);
        assert!((u - 3.0).abs() < 1e-4 && (v - 7.0).abs() < 1e-4);
    }

    #[test]
    fn image_is_painted_inside_its_margin() {
        // 10pt margin all round on an A4 page.
        let cm = [575.0, 0.0, 0.0, 822.0, 10.0, 10.0];
        let pdf = pdf_with_images(&[(red_jpeg(40, 60), 40, 60, cm)]);

        let pages = EmbeddedImageRasterizer.rasterize(&pdf, &|_| 1.0).unwrap();
        assert_eq!(pages.len(), 1);
        let page = pages.into_iter().next().unwrap().unwrap();
        assert_eq!(page.dimensions(), (595, 842));

        // Margin stays white, interior is red-ish (JPEG is lossy).
        assert_eq!(page.get_pixel(3, 3).0, [255, 255, 255]);
        assert_eq!(page.get_pixel(590, 838).0, [255, 255, 255]);
        let centre = page.get_pixel(297, 421).0;
        assert!(centre[0] > 180 && centre[1] < 60 && centre[2] < 60, "{centre:?}");
    }

    #[test]
    fn scale_callback_controls_raster_size() {
        let cm = [595.0, 0.0, 0.0, 842.0, 0.0, 0.0];
        let pdf = pdf_with_images(&[(red_jpeg(8, 8), 8, 8, cm)]);
        let pages = EmbeddedImageRasterizer.rasterize(&pdf, &|_| 0.5).unwrap();
        let page = pages.into_iter().next().unwrap().unwrap();
        assert_eq!(page.dimensions(), (298, 421));
    }

    #[test]
    fn corrupt_jpeg_fails_only_its_page() {
        let cm = [595.0, 0.0, 0.0, 842.0, 0.0, 0.0];
        let pdf = pdf_with_images(&[
            (b"not a jpeg at all".to_vec(), 8, 8, cm),
            (red_jpeg(8, 8), 8, 8, cm),
        ]);
        let pages = EmbeddedImageRasterizer.rasterize(&pdf, &|_| 0.25).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(matches!(
            pages[0],
            Err(PagemarkError::PdfRender { page: 1, .. })
        ));
        assert!(pages[1].is_ok());
    }

    const TEXT_PAGE: &str =
        "BT /F1 72 Tf 100 500 Td (PAYSLIP 2400 EUR) Tj ET 50 50 200 100 re f";

    #[test]
    fn text_and_vector_page_is_rejected_not_blank() {
        let pdf = pdf_with_contents(&[
            (TEXT_PAGE.to_string(), red_jpeg(8, 8), 8, 8),
            ("q 595 0 0 842 0 0 cm /Im0 Do Q".to_string(), red_jpeg(8, 8), 8, 8),
        ]);
        let pages = EmbeddedImageRasterizer.rasterize(&pdf, &|_| 0.25).unwrap();
        assert_eq!(pages.len(), 2);
        match &pages[0] {
            Err(PagemarkError::PdfRender { page: 1, detail }) => {
                assert!(detail.contains("2 text or vector"), "{detail}");
            }
            other => panic!("expected a render failure, got {other:?}"),
        }
        assert!(pages[1].is_ok());
    }

    #[test]
    fn scan_with_vector_stamp_is_rejected() {
        let content = "q 595 0 0 842 0 0 cm /Im0 Do Q 0 0 1 rg 20 20 80 40 re f".to_string();
        let pdf = pdf_with_contents(&[(content, red_jpeg(8, 8), 8, 8)]);
        let pages = EmbeddedImageRasterizer.rasterize(&pdf, &|_| 0.25).unwrap();
        assert!(matches!(pages[0], Err(PagemarkError::PdfRender { page: 1, .. })));
    }

    #[test]
    fn invisible_ocr_text_over_a_scan_is_accepted() {
        let content = "q 595 0 0 842 0 0 cm /Im0 Do Q \
                       q BT 3 Tr /F1 12 Tf 72 700 Td (PAYSLIP 2400 EUR) Tj ET Q"
            .to_string();
        let pdf = pdf_with_contents(&[(content, red_jpeg(8, 8), 8, 8)]);
        let pages = EmbeddedImageRasterizer.rasterize(&pdf, &|_| 0.25).unwrap();
        let page = pages.into_iter().next().unwrap().unwrap();
        let centre = page.get_pixel(74, 105).0;
        assert!(centre[0] > 180 && centre[1] < 60, "{centre:?}");
    }

    #[test]
    fn text_mode_is_restored_by_q() {
        let content = "q 3 Tr Q BT /F1 12 Tf (VISIBLE) Tj ET".to_string();
        let pdf = pdf_with_contents(&[(content, red_jpeg(8, 8), 8, 8)]);
        let pages = EmbeddedImageRasterizer.rasterize(&pdf, &|_| 0.25).unwrap();
        assert!(pages[0].is_err());
    }

    #[test]
    fn garbage_document_is_a_load_error() {
        let err = EmbeddedImageRasterizer
            .rasterize(b"%PDF-1.4 garbage", &|_| 1.0)
            .unwrap_err();
        assert!(matches!(err, PagemarkError::PdfLoad(_)));
    }

    #[test]
    fn indexed_palette_expands_to_rgb() {
        let space = ColorSpace::Indexed {
            base: Box::new(ColorSpace::Rgb),
            lookup: vec![0, 0, 0, 10, 20, 30],
        };
        let img = unpack_samples(&[1, 0], 2, 1, 8, &space).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30]);
        assert_eq!(img.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn bilevel_rows_are_byte_padded() {
        // 10 px wide: two bytes per row, MSB first.
        let data = [0b1000_0000, 0b0100_0000, 0, 0];
        let img = unpack_samples(&data, 10, 2, 1, &ColorSpace::Gray).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(9, 0).0, [255, 255, 255]);
        assert_eq!(img.get_pixel(0, 1).0, [0, 0, 0]);
    }

    #[test]
    fn cmyk_black_is_black() {
        assert_eq!(ColorSpace::Cmyk.to_rgb(&[0, 0, 0, 255]).0, [0, 0, 0]);
        assert_eq!(ColorSpace::Cmyk.to_rgb(&[0, 0, 0, 0]).0, [255, 255, 255]);
    }

    #[test]
    fn truncated_samples_are_rejected() {
        assert!(unpack_samples(&[1, 2, 3], 2, 2, 8, &ColorSpace::Rgb).is_err());
    }
}
