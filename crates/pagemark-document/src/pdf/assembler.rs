// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page assembler — one JPEG image per page, written into a fresh `lopdf`
// document that is handed to a signer.

use chrono::Utc;
use image::RgbImage;
use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use pagemark_core::error::{PagemarkError, Result};
use pagemark_core::{PageDimension, RenderParameters};
use tracing::{debug, info, instrument};

/// Value of the `/Producer` entry in the document information dictionary.
pub const PRODUCER: &str = concat!("pagemark ", env!("CARGO_PKG_VERSION"));

/// Name under which each page's image is registered in its resources.
const IMAGE_NAME: &str = "Im0";

/// Builds the output document from finished page images.
#[derive(Debug, Clone)]
pub struct PageAssembler {
    media_box: PageDimension,
    quality: u8,
    dpi: u32,
}

impl PageAssembler {
    pub fn new(media_box: PageDimension, quality: u8, dpi: u32) -> Self {
        Self {
            media_box,
            quality: quality.clamp(1, 100),
            dpi,
        }
    }

    pub fn from_parameters(params: &RenderParameters) -> Self {
        Self::new(params.media_box, params.compression_quality, params.output_dpi())
    }

    /// Create one page per image, in order.
    ///
    /// Each page has the configured media box. The image is drawn from the
    /// bottom-left corner at the page width, its height scaled to keep the
    /// aspect ratio.
    #[instrument(skip_all, fields(pages = images.len(), quality = self.quality))]
    pub fn assemble(&self, images: &[RgbImage]) -> Result<Document> {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();

        let mut kids = Vec::with_capacity(images.len());
        for (index, image) in images.iter().enumerate() {
            let page_id = self.add_page(&mut document, pages_id, image).map_err(|err| {
                PagemarkError::PageWrite(format!("page {}: {err}", index + 1))
            })?;
            kids.push(Object::Reference(page_id));
        }

        let page_count = kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        };
        document.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        let info_id = document.add_object(info_dictionary());
        document.trailer.set("Info", info_id);

        info!(pages = page_count, "Document assembled");
        Ok(document)
    }

    fn add_page(&self, document: &mut Document, pages_id: ObjectId, image: &RgbImage) -> Result<ObjectId> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PagemarkError::PageWrite("image has no pixels".into()));
        }

        let jpeg = self.encode_jpeg(image)?;
        let jpeg_len = jpeg.len();
        let image_id = document.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(width),
                "Height" => i64::from(height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => Object::Integer(8),
                "Filter" => "DCTDecode",
            },
            jpeg,
        ));

        let (draw_width, draw_height) = self.drawn_size(width, height);
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(draw_width),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(draw_height),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|err| PagemarkError::PageWrite(format!("content stream: {err}")))?;
        let content_id = document.add_object(Stream::new(Dictionary::new(), encoded));

        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(i64::from(self.media_box.width)),
                Object::Integer(i64::from(self.media_box.height)),
            ],
            "Resources" => dictionary! {
                "XObject" => dictionary! { IMAGE_NAME => image_id },
            },
            "Contents" => content_id,
        });

        debug!(width, height, jpeg_len, draw_width, draw_height, "Page written");
        Ok(page_id)
    }

    /// Size of the drawn image in points: full page width, height in
    /// proportion.
    pub fn drawn_size(&self, image_width: u32, image_height: u32) -> (f32, f32) {
        let page_width = self.media_box.width as f32;
        (page_width, image_height as f32 * page_width / image_width as f32)
    }

    /// Encode `image` as a baseline JPEG at the configured quality, tagged
    /// with the output DPI.
    pub fn encode_jpeg(&self, image: &RgbImage) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, self.quality);
        if let Ok(dpi) = u16::try_from(self.dpi) {
            encoder.set_pixel_density(PixelDensity::dpi(dpi));
        }
        encoder
            .encode_image(image)
            .map_err(|err| PagemarkError::PageWrite(format!("JPEG encoding failed: {err}")))?;
        Ok(out)
    }
}

fn info_dictionary() -> Dictionary {
    let created = Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
    dictionary! {
        "Producer" => Object::string_literal(PRODUCER),
        "CreationDate" => Object::string_literal(created),
    }
}
