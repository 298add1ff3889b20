// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Source normaliser — every input document becomes zero or more raster
// images: PDF pages are rendered, raster uploads are decoded and turned
// upright according to their EXIF orientation.

pub mod embedded;
pub mod orientation;
#[cfg(feature = "pdfium")]
pub mod pdfium;
pub mod rasterizer;

use image::{DynamicImage, ImageFormat};
use pagemark_core::error::{PagemarkError, Result};
use pagemark_core::{InputDocument, MediaType, PageDimension, RasterFormat};
use tracing::{debug, error, info, instrument, warn};

use crate::fit::FitGeometry;

pub use embedded::EmbeddedImageRasterizer;
#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRasterizer;
pub use rasterizer::{PageBox, PageRasterizer};

/// Rasterizer picked by `DocumentRenderer::with_defaults`: pdfium when the
/// `pdfium` feature is enabled, the embedded-image painter otherwise.
#[cfg(feature = "pdfium")]
pub type DefaultRasterizer = PdfiumRasterizer;
#[cfg(not(feature = "pdfium"))]
pub type DefaultRasterizer = EmbeddedImageRasterizer;

/// Build the [`DefaultRasterizer`]. Fails only when pdfium cannot be bound.
pub fn default_rasterizer() -> Result<DefaultRasterizer> {
    #[cfg(feature = "pdfium")]
    {
        PdfiumRasterizer::new()
    }
    #[cfg(not(feature = "pdfium"))]
    {
        Ok(EmbeddedImageRasterizer)
    }
}

/// PDF pages are rendered at twice the fitted scale so later cropping does
/// not cost resolution.
pub const PDF_OVERSAMPLING: f32 = 2.0;

/// Converts input documents into raster images.
pub struct SourceNormalizer<R> {
    rasterizer: R,
    page: PageDimension,
    max_page_width: u32,
}

impl<R: PageRasterizer> SourceNormalizer<R> {
    pub fn new(rasterizer: R, page: PageDimension, max_page_width: u32) -> Self {
        Self {
            rasterizer,
            page,
            max_page_width,
        }
    }

    /// Render scale (pixels per point) for a PDF page box.
    pub fn render_scale(&self, page_box: PageBox) -> f32 {
        let geometry = FitGeometry::compute(
            page_box.width,
            page_box.height,
            &self.page,
            self.max_page_width,
        );
        geometry.scale * PDF_OVERSAMPLING
    }

    /// Normalise one document.
    ///
    /// A PDF that cannot be rendered contributes no pages, and a page that
    /// fails to render is dropped; both are logged. An undecodable raster
    /// image is an error.
    #[instrument(skip_all, fields(media = document.media_type.mime_type(), bytes_len = document.content.len()))]
    pub fn normalize(&self, document: &InputDocument) -> Result<Vec<DynamicImage>> {
        match document.media_type {
            MediaType::Pdf => Ok(self.render_pdf(&document.content)),
            MediaType::Image(hint) => Ok(vec![decode_oriented(&document.content, hint)?]),
        }
    }

    fn render_pdf(&self, pdf: &[u8]) -> Vec<DynamicImage> {
        let scale_for = |page_box: PageBox| self.render_scale(page_box);

        let pages = match self.rasterizer.rasterize(pdf, &scale_for) {
            Ok(pages) => pages,
            Err(err) => {
                error!(%err, "Unable to render PDF, it contributes no pages");
                return Vec::new();
            }
        };

        let total = pages.len();
        let images: Vec<DynamicImage> = pages
            .into_iter()
            .filter_map(|page| match page {
                Ok(raster) => Some(DynamicImage::ImageRgb8(raster)),
                Err(err) => {
                    warn!(%err, "Skipping PDF page");
                    None
                }
            })
            .collect();

        info!(total, rendered = images.len(), "PDF rendered to images");
        images
    }
}

/// Decode raster bytes and apply their EXIF orientation.
///
/// Unreadable orientation metadata is logged and the image is returned as
/// decoded.
pub fn decode_oriented(bytes: &[u8], hint: Option<RasterFormat>) -> Result<DynamicImage> {
    let image = decode(bytes, hint)?;

    match orientation::read_orientation(bytes) {
        Ok(Some(value)) => Ok(orientation::apply_orientation(image, value)),
        Ok(None) => Ok(image),
        Err(err) => {
            debug!(%err, "No usable orientation metadata, keeping image as decoded");
            Ok(image)
        }
    }
}

fn decode(bytes: &[u8], hint: Option<RasterFormat>) -> Result<DynamicImage> {
    let sniffed = image::load_from_memory(bytes);
    let image = match (sniffed, hint) {
        (Ok(image), _) => image,
        (Err(first), Some(format)) => image::load_from_memory_with_format(bytes, image_format(format))
            .map_err(|err| {
                PagemarkError::Decode(format!("failed to decode image: {first}; as {format:?}: {err}"))
            })?,
        (Err(err), None) => {
            return Err(PagemarkError::Decode(format!("failed to decode image: {err}")));
        }
    };

    debug!(width = image.width(), height = image.height(), "Image decoded from bytes");
    Ok(image)
}

fn image_format(format: RasterFormat) -> ImageFormat {
    match format {
        RasterFormat::Jpeg => ImageFormat::Jpeg,
        RasterFormat::Png => ImageFormat::Png,
        RasterFormat::Tiff => ImageFormat::Tiff,
        RasterFormat::Bmp => ImageFormat::Bmp,
        RasterFormat::Gif => ImageFormat::Gif,
        RasterFormat::WebP => ImageFormat::WebP,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    /// Rasterizer stub that reports a fixed list of page outcomes.
    struct Scripted(Vec<bool>);

    impl PageRasterizer for Scripted {
        fn rasterize(
            &self,
            _pdf: &[u8],
            scale_for: &dyn Fn(PageBox) -> f32,
        ) -> Result<Vec<Result<RgbImage>>> {
            let (w, h) = PageBox::new(595.0, 842.0).pixel_size(scale_for(PageBox::new(595.0, 842.0)));
            Ok(self
                .0
                .iter()
                .enumerate()
                .map(|(i, ok)| {
                    if *ok {
                        Ok(RgbImage::new(w, h))
                    } else {
                        Err(PagemarkError::PdfRender {
                            page: i + 1,
                            detail: "scripted".into(),
                        })
                    }
                })
                .collect())
        }
    }

    struct Unopenable;

    impl PageRasterizer for Unopenable {
        fn rasterize(&self, _: &[u8], _: &dyn Fn(PageBox) -> f32) -> Result<Vec<Result<RgbImage>>> {
            Err(PagemarkError::PdfLoad("scripted".into()))
        }
    }

    fn normalizer<R: PageRasterizer>(rasterizer: R) -> SourceNormalizer<R> {
        SourceNormalizer::new(rasterizer, PageDimension::a4_points(), 1240)
    }

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([1, 2, 3])))
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn a4_pages_render_at_double_scale() {
        let n = normalizer(Scripted(vec![true]));
        assert_eq!(n.render_scale(PageBox::new(595.0, 842.0)), 2.0);
        let pages = n.normalize(&InputDocument::pdf(b"%PDF".to_vec())).unwrap();
        assert_eq!(pages[0].width(), 1190);
        assert_eq!(pages[0].height(), 1684);
    }

    #[test]
    fn oversized_pages_are_scaled_down_before_oversampling() {
        let n = normalizer(Scripted(vec![]));
        let scale = n.render_scale(PageBox::new(2480.0, 3508.0));
        assert!((scale - 2.0 * 1240.0 / 2480.0).abs() < 1e-4);
    }

    #[test]
    fn failed_pages_are_skipped() {
        let n = normalizer(Scripted(vec![false, true, true]));
        let pages = n.normalize(&InputDocument::pdf(Vec::new())).unwrap();
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn unopenable_pdf_contributes_nothing() {
        let n = normalizer(Unopenable);
        let pages = n.normalize(&InputDocument::pdf(Vec::new())).unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn raster_without_exif_passes_through() {
        let n = normalizer(Unopenable);
        let pages = n
            .normalize(&InputDocument::from_mime(png_bytes(5, 3), "image/png"))
            .unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!((pages[0].width(), pages[0].height()), (5, 3));
    }

    /// 40x20 JPEG, left half red and right half blue, carrying an APP1 Exif
    /// segment whose only IFD0 entry is Orientation = `orientation`.
    fn jpeg_with_orientation(orientation: u8) -> Vec<u8> {
        let image = RgbImage::from_fn(40, 20, |x, _| {
            if x < 20 { Rgb([230, 10, 10]) } else { Rgb([10, 10, 230]) }
        });
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();
        assert_eq!(&jpeg[..2], b"\xFF\xD8");

        let mut payload = b"Exif\0\0".to_vec();
        // Big-endian TIFF header, IFD0 at offset 8.
        payload.extend_from_slice(b"MM\0\x2A\0\0\0\x08");
        payload.extend_from_slice(b"\0\x01");
        // Tag 0x0112, SHORT, count 1, value left-justified.
        payload.extend_from_slice(b"\x01\x12\0\x03\0\0\0\x01");
        payload.extend_from_slice(&[0, orientation, 0, 0]);
        payload.extend_from_slice(b"\0\0\0\0");

        let length = u16::try_from(payload.len() + 2).unwrap();
        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(b"\xFF\xE1");
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    fn is_red(image: &DynamicImage, x: u32, y: u32) -> bool {
        let Rgb([r, _, b]) = image.to_rgb8().get_pixel(x, y).to_owned();
        r > 150 && b < 100
    }

    fn is_blue(image: &DynamicImage, x: u32, y: u32) -> bool {
        let Rgb([r, _, b]) = image.to_rgb8().get_pixel(x, y).to_owned();
        b > 150 && r < 100
    }

    #[test]
    fn exif_orientation_is_read_from_jpeg() {
        let bytes = jpeg_with_orientation(6);
        assert_eq!(orientation::read_orientation(&bytes).unwrap(), Some(6));
    }

    #[test]
    fn orientation_6_rotates_clockwise() {
        let image = decode_oriented(&jpeg_with_orientation(6), Some(RasterFormat::Jpeg)).unwrap();
        assert_eq!((image.width(), image.height()), (20, 40));
        // The left (red) column becomes the top row.
        assert!(is_red(&image, 2, 2));
        assert!(is_red(&image, 17, 5));
        assert!(is_blue(&image, 2, 37));
        assert!(is_blue(&image, 17, 35));
    }

    #[test]
    fn orientation_3_rotates_half_a_turn() {
        let image = decode_oriented(&jpeg_with_orientation(3), Some(RasterFormat::Jpeg)).unwrap();
        assert_eq!((image.width(), image.height()), (40, 20));
        assert!(is_blue(&image, 2, 2));
        assert!(is_blue(&image, 5, 17));
        assert!(is_red(&image, 37, 2));
        assert!(is_red(&image, 35, 17));
    }

    #[test]
    fn orientation_8_rotates_counter_clockwise() {
        let image = decode_oriented(&jpeg_with_orientation(8), Some(RasterFormat::Jpeg)).unwrap();
        assert_eq!((image.width(), image.height()), (20, 40));
        // The right (blue) column becomes the top row.
        assert!(is_blue(&image, 2, 2));
        assert!(is_blue(&image, 17, 5));
        assert!(is_red(&image, 2, 37));
        assert!(is_red(&image, 17, 35));
    }

    #[test]
    fn oriented_jpeg_is_upright_after_normalisation() {
        let n = normalizer(Unopenable);
        let pages = n
            .normalize(&InputDocument::from_mime(jpeg_with_orientation(6), "image/jpeg"))
            .unwrap();
        assert_eq!((pages[0].width(), pages[0].height()), (20, 40));
    }

    #[test]
    fn corrupt_jpeg_is_a_decode_error() {
        let n = normalizer(Unopenable);
        let err = n
            .normalize(&InputDocument::from_mime(b"\xFF\xD8garbage".to_vec(), "image/jpeg"))
            .unwrap_err();
        assert!(matches!(err, PagemarkError::Decode(_)));
    }
}
